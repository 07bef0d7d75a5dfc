// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::LevelFilter;

use crate::Append;
use crate::Diagnostic;
use crate::Filter;
use crate::Logger;
use crate::Trap;
use crate::logger::log_impl::Dispatch;
use crate::trap::DefaultTrap;

/// Create a new empty [`LoggerBuilder`] instance for configuring log dispatching.
///
/// # Examples
///
/// ```no_run
/// use logforth_append_riemann::append::Riemann;
/// use logforth_append_riemann::config::RiemannConfig;
///
/// let mut riemann = Riemann::new(RiemannConfig::builder().build().unwrap());
/// riemann.start().unwrap();
///
/// logforth_append_riemann::builder()
///     .dispatch(|d| d.append(riemann))
///     .apply();
/// ```
pub fn builder() -> LoggerBuilder {
    LoggerBuilder {
        dispatches: vec![],
        max_level: LevelFilter::Trace,
        trap: Box::new(DefaultTrap::default()),
    }
}

/// A builder for configuring log dispatching and setting up the global logger.
#[must_use = "call `apply` to set the global logger or `build` to construct a logger instance"]
#[derive(Debug)]
pub struct LoggerBuilder {
    // stashed dispatches
    dispatches: Vec<Dispatch>,
    max_level: LevelFilter,
    trap: Box<dyn Trap>,
}

impl LoggerBuilder {
    /// Register a new dispatch with the [`LoggerBuilder`].
    pub fn dispatch<F>(mut self, f: F) -> Self
    where
        F: FnOnce(DispatchBuilder<false>) -> DispatchBuilder<true>,
    {
        self.dispatches.push(f(DispatchBuilder::new()).build());
        self
    }

    /// Set the global maximum log level.
    ///
    /// This will be passed to [`log::set_max_level`] on [`LoggerBuilder::apply`].
    pub fn max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    /// Set the trap that receives errors returned by appenders.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Build the [`Logger`].
    pub fn build(self) -> Logger {
        Logger::new(self.dispatches, self.trap)
    }

    /// Set up the global logger with all the configured dispatches.
    ///
    /// This should be called early in the execution of a Rust program. Any log events that occur
    /// before initialization will be ignored.
    ///
    /// # Errors
    ///
    /// Return an error if a global logger has already been set.
    pub fn try_apply(self) -> Result<(), log::SetLoggerError> {
        let max_level = self.max_level;
        log::set_boxed_logger(Box::new(self.build()))?;
        log::set_max_level(max_level);
        Ok(())
    }

    /// Set up the global logger with all the configured dispatches.
    ///
    /// # Panics
    ///
    /// Panic if the global logger has already been set.
    pub fn apply(self) {
        self.try_apply()
            .expect("LoggerBuilder::apply must be called before the global logger initialized");
    }
}

/// A builder for configuring a log dispatch, including filters, diagnostics and appenders.
///
/// # Examples
///
/// ```no_run
/// use logforth_append_riemann::append::Riemann;
/// use logforth_append_riemann::config::RiemannConfig;
/// use logforth_append_riemann::diagnostic::ThreadLocalDiagnostic;
/// use logforth_append_riemann::filter::MinimumLevel;
/// use logforth_append_riemann::record::Level;
///
/// let mut riemann = Riemann::new(RiemannConfig::builder().build().unwrap());
/// riemann.start().unwrap();
///
/// logforth_append_riemann::builder()
///     .dispatch(|d| {
///         d.filter(MinimumLevel::new(Level::Warn))
///             .diagnostic(ThreadLocalDiagnostic::default())
///             .append(riemann)
///     })
///     .apply();
/// ```
#[derive(Debug)]
pub struct DispatchBuilder<const APPEND: bool> {
    filters: Vec<Box<dyn Filter>>,
    diagnostics: Vec<Box<dyn Diagnostic>>,
    appends: Vec<Box<dyn Append>>,
}

impl DispatchBuilder<false> {
    fn new() -> Self {
        DispatchBuilder {
            filters: vec![],
            diagnostics: vec![],
            appends: vec![],
        }
    }

    /// Add a filter to this dispatch.
    pub fn filter(mut self, filter: impl Into<Box<dyn Filter>>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Add a diagnostic to this dispatch.
    pub fn diagnostic(mut self, diagnostic: impl Into<Box<dyn Diagnostic>>) -> Self {
        self.diagnostics.push(diagnostic.into());
        self
    }
}

impl DispatchBuilder<true> {
    fn build(self) -> Dispatch {
        Dispatch::new(self.filters, self.diagnostics, self.appends)
    }
}

impl<const APPEND: bool> DispatchBuilder<APPEND> {
    /// Add an appender to this dispatch.
    pub fn append(mut self, append: impl Into<Box<dyn Append>>) -> DispatchBuilder<true> {
        self.appends.push(append.into());
        DispatchBuilder {
            filters: self.filters,
            diagnostics: self.diagnostics,
            appends: self.appends,
        }
    }
}
