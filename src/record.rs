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

//! Log record, level and attached error information.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// An enum representing the available severity levels of a record.
///
/// Levels are ordered by severity: `Trace < Debug < Info < Warn < Error`.
#[repr(usize)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Level {
    /// The "trace" level.
    ///
    /// Designates very low priority, often extremely verbose, information.
    Trace = 5000,
    /// The "debug" level.
    ///
    /// Designates lower priority information.
    Debug = 10000,
    /// The "info" level.
    ///
    /// Designates useful information.
    Info = 20000,
    /// The "warn" level.
    ///
    /// Designates hazardous situations.
    Warn = 30000,
    /// The "error" level.
    ///
    /// Designates very serious errors.
    Error = 40000,
}

impl Level {
    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Whether this level is at least as severe as `threshold`.
    pub fn is_greater_or_equal(&self, threshold: Level) -> bool {
        *self >= threshold
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The type returned by `from_str` when the string doesn't match any of the log levels.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseLevelError {}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("malformed log level")
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;
    fn from_str(s: &str) -> Result<Level, Self::Err> {
        let s = s.trim();
        for (name, level) in [
            ("trace", Level::Trace),
            ("debug", Level::Debug),
            ("info", Level::Info),
            ("warn", Level::Warn),
            ("warning", Level::Warn),
            ("error", Level::Error),
        ] {
            if s.eq_ignore_ascii_case(name) {
                return Ok(level);
            }
        }

        Err(ParseLevelError {})
    }
}

/// Error information attached to a log record.
///
/// Stack frames are kept in their rendered string form, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    message: String,
    frames: Vec<String>,
    cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    /// Create error information with the given message and no frames or cause.
    pub fn new(message: impl Into<String>) -> Self {
        ErrorInfo {
            message: message.into(),
            frames: vec![],
            cause: None,
        }
    }

    /// Capture an error and its whole `source()` chain as the cause chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        ErrorInfo {
            message: err.to_string(),
            frames: vec![],
            cause: err.source().map(|cause| Box::new(ErrorInfo::from_error(cause))),
        }
    }

    /// Append several stack frames.
    pub fn with_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frames.extend(frames.into_iter().map(Into::into));
        self
    }

    /// Set the cause.
    pub fn with_cause(mut self, cause: ErrorInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The rendered stack frames.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// The error that caused this one, if any.
    pub fn cause(&self) -> Option<&ErrorInfo> {
        self.cause.as_deref()
    }
}

/// A single log record as seen by appenders.
#[derive(Clone, Debug)]
pub struct LogRecord {
    level: Level,
    message: String,
    logger: String,
    thread: String,
    timestamp_millis: i64,
    error: Option<ErrorInfo>,
    marker: Option<String>,
    context: Vec<(String, String)>,
}

impl LogRecord {
    /// Returns a new builder.
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// The severity level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The rendered message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The name of the logger (the `log` target).
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// The name of the thread that produced the record.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// The attached error, if any.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// The marker name, if any.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Contextual key-value pairs, in insertion order.
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Create a builder initialized with the current record's values.
    pub fn to_builder(&self) -> LogRecordBuilder {
        LogRecordBuilder {
            record: self.clone(),
        }
    }
}

/// Builder for [`LogRecord`].
#[derive(Debug)]
pub struct LogRecordBuilder {
    record: LogRecord,
}

impl Default for LogRecordBuilder {
    fn default() -> Self {
        LogRecordBuilder {
            record: LogRecord {
                level: Level::Info,
                message: String::new(),
                logger: String::new(),
                thread: current_thread_name(),
                timestamp_millis: now_millis(),
                error: None,
                marker: None,
                context: vec![],
            },
        }
    }
}

impl LogRecordBuilder {
    /// Set [`level`](LogRecord::level).
    pub fn level(mut self, level: Level) -> Self {
        self.record.level = level;
        self
    }

    /// Set [`message`](LogRecord::message).
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.record.message = message.into();
        self
    }

    /// Set [`logger`](LogRecord::logger).
    pub fn logger(mut self, logger: impl Into<String>) -> Self {
        self.record.logger = logger.into();
        self
    }

    /// Set [`thread`](LogRecord::thread).
    pub fn thread(mut self, thread: impl Into<String>) -> Self {
        self.record.thread = thread.into();
        self
    }

    /// Set [`timestamp_millis`](LogRecord::timestamp_millis).
    pub fn timestamp_millis(mut self, millis: i64) -> Self {
        self.record.timestamp_millis = millis;
        self
    }

    /// Set [`timestamp_millis`](LogRecord::timestamp_millis) from a [`SystemTime`].
    pub fn time(mut self, time: SystemTime) -> Self {
        self.record.timestamp_millis = system_time_to_millis(time);
        self
    }

    /// Set [`error`](LogRecord::error).
    pub fn error(mut self, error: ErrorInfo) -> Self {
        self.record.error = Some(error);
        self
    }

    /// Set [`marker`](LogRecord::marker).
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.record.marker = Some(marker.into());
        self
    }

    /// Append one contextual key-value pair.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.record.context.push((key.into(), value.into()));
        self
    }

    /// Invoke the builder and return a `LogRecord`.
    pub fn build(self) -> LogRecord {
        self.record
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

fn now_millis() -> i64 {
    system_time_to_millis(SystemTime::now())
}

fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}
