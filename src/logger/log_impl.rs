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

use log::kv::Key;
use log::kv::Value;
use log::kv::VisitSource;

use crate::Append;
use crate::Diagnostic;
use crate::Error;
use crate::ErrorKind;
use crate::Filter;
use crate::Trap;
use crate::filter::FilterResult;
use crate::record::ErrorInfo;
use crate::record::Level;
use crate::record::LogRecord;

/// Key-value key naming the marker of a record, e.g. `log::error!(marker = "audit"; "...")`.
pub const MARKER_KEY: &str = "marker";

/// Key-value keys carrying the error of a record, e.g. `log::error!(err:err = e; "...")`.
pub const ERROR_KEYS: [&str; 2] = ["err", "error"];

/// A logger facade that dispatches log records to one or more dispatcher.
///
/// This struct implements [`log::Log`] to bridge the [`log`] crate with the appenders: each
/// `log::Record` becomes a [`LogRecord`] carrying the thread name, the timestamp, the marker,
/// the error chain and the diagnostic context.
#[derive(Debug)]
pub struct Logger {
    dispatches: Vec<Dispatch>,
    trap: Box<dyn Trap>,
}

impl Logger {
    pub(super) fn new(dispatches: Vec<Dispatch>, trap: Box<dyn Trap>) -> Self {
        Self { dispatches, trap }
    }

    /// Whether any dispatch could accept a record of this level and target.
    pub fn enabled(&self, level: Level, target: &str) -> bool {
        self.dispatches
            .iter()
            .any(|dispatch| dispatch.enabled(level, target))
    }

    /// Flush every appender; errors are sent to the trap.
    pub fn flush(&self) {
        for dispatch in &self.dispatches {
            if let Err(err) = dispatch.flush() {
                self.trap.trap(&err);
            }
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Logger::enabled(self, metadata.level().into(), metadata.target())
    }

    fn log(&self, record: &log::Record) {
        let captured = match CapturedRecord::from_log(record) {
            Ok(captured) => captured,
            Err(err) => {
                self.trap.trap(&err);
                return;
            }
        };

        for dispatch in &self.dispatches {
            if let Err(err) = dispatch.log(&captured) {
                self.trap.trap(&err);
            }
        }
    }

    fn flush(&self) {
        Logger::flush(self);
    }
}

// a `log::Record` captured before per-dispatch diagnostics are applied
#[derive(Debug)]
struct CapturedRecord {
    record: LogRecord,
    key_values: Vec<(String, String)>,
}

impl CapturedRecord {
    fn from_log(record: &log::Record) -> Result<Self, Error> {
        let mut visitor = KeyValueVisitor::default();
        record
            .key_values()
            .visit(&mut visitor)
            .map_err(|err| Error::new(ErrorKind::Unexpected, "failed to visit record key-values").with_source(err))?;

        let mut builder = LogRecord::builder()
            .level(record.level().into())
            .message(record.args().to_string())
            .logger(record.target());
        if let Some(marker) = visitor.marker {
            builder = builder.marker(marker);
        }
        if let Some(error) = visitor.error {
            builder = builder.error(error);
        }

        Ok(CapturedRecord {
            record: builder.build(),
            key_values: visitor.key_values,
        })
    }

    // diagnostics first, so the record's own key-values win on collision
    fn to_record(&self, diagnostics: &[Box<dyn Diagnostic>]) -> Result<LogRecord, Error> {
        let mut context = vec![];
        let mut collect = |key: &str, value: &str| -> Result<(), Error> {
            context.push((key.to_string(), value.to_string()));
            Ok(())
        };
        for diagnostic in diagnostics {
            diagnostic.visit(&mut collect)?;
        }

        let mut builder = self.record.to_builder();
        for (key, value) in context.into_iter().chain(self.key_values.iter().cloned()) {
            builder = builder.context(key, value);
        }
        Ok(builder.build())
    }
}

#[derive(Default)]
struct KeyValueVisitor {
    marker: Option<String>,
    error: Option<ErrorInfo>,
    key_values: Vec<(String, String)>,
}

impl<'kvs> VisitSource<'kvs> for KeyValueVisitor {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), log::kv::Error> {
        let key = key.as_str();
        if key == MARKER_KEY {
            self.marker = Some(value.to_string());
        } else if ERROR_KEYS.contains(&key) {
            self.error = Some(match value.to_borrowed_error() {
                Some(err) => ErrorInfo::from_error(err),
                None => ErrorInfo::new(value.to_string()),
            });
        } else {
            self.key_values.push((key.to_string(), value.to_string()));
        }
        Ok(())
    }
}

/// A grouped set of filters, diagnostics and appenders.
///
/// `filters` are used to determine whether a log record should be passed to the appenders.
/// `appends` are used to write log records to a destination.
#[derive(Debug)]
pub(super) struct Dispatch {
    filters: Vec<Box<dyn Filter>>,
    diagnostics: Vec<Box<dyn Diagnostic>>,
    appends: Vec<Box<dyn Append>>,
}

impl Dispatch {
    pub(super) fn new(
        filters: Vec<Box<dyn Filter>>,
        diagnostics: Vec<Box<dyn Diagnostic>>,
        appends: Vec<Box<dyn Append>>,
    ) -> Self {
        debug_assert!(
            !appends.is_empty(),
            "A Dispatch must have at least one appender"
        );

        Self {
            filters,
            diagnostics,
            appends,
        }
    }

    fn enabled(&self, level: Level, target: &str) -> bool {
        for filter in &self.filters {
            match filter.enabled(level, target) {
                FilterResult::Reject => return false,
                FilterResult::Accept => return true,
                FilterResult::Neutral => {}
            }
        }

        true
    }

    fn log(&self, captured: &CapturedRecord) -> Result<(), Error> {
        let record = captured.to_record(&self.diagnostics)?;

        for filter in &self.filters {
            match filter.matches(&record) {
                FilterResult::Reject => return Ok(()),
                FilterResult::Accept => break,
                FilterResult::Neutral => {}
            }
        }

        for append in &self.appends {
            append.append(&record)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        for append in &self.appends {
            append.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use log::Log;

    use super::*;
    use crate::diagnostic::ThreadLocalDiagnostic;
    use crate::filter::MinimumLevel;

    #[derive(Debug, Clone, Default)]
    struct Collect(Arc<Mutex<Vec<LogRecord>>>);

    impl Append for Collect {
        fn append(&self, record: &LogRecord) -> Result<(), Error> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Append for Failing {
        fn append(&self, _: &LogRecord) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Unexpected, "disk full"))
        }
    }

    #[derive(Debug, Clone, Default)]
    struct CountingTrap(Arc<Mutex<Vec<String>>>);

    impl Trap for CountingTrap {
        fn trap(&self, err: &Error) {
            self.0.lock().unwrap().push(err.message().to_string());
        }

        fn notice(&self, _: &str) {}
    }

    #[test]
    fn test_bridge_log_record() {
        let collect = Collect::default();
        let logger = crate::builder()
            .dispatch(|d| d.diagnostic(ThreadLocalDiagnostic::default()).append(collect.clone()))
            .build();

        ThreadLocalDiagnostic::insert("request_id", "r-1");
        ThreadLocalDiagnostic::insert("user", "bob");
        let io_err = std::io::Error::other("connection reset");
        let kvs: Vec<(&str, Value)> = vec![
            ("marker", Value::from("audit")),
            ("user", Value::from("alice")),
            ("err", Value::from_dyn_error(&io_err)),
        ];
        logger.log(
            &log::Record::builder()
                .args(format_args!("payment declined"))
                .level(log::Level::Warn)
                .target("checkout::payments")
                .key_values(&kvs)
                .build(),
        );
        ThreadLocalDiagnostic::clear();

        let records = collect.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level(), Level::Warn);
        assert_eq!(record.message(), "payment declined");
        assert_eq!(record.logger(), "checkout::payments");
        assert_eq!(record.marker(), Some("audit"));
        assert_eq!(
            record.error().map(ErrorInfo::message),
            Some("connection reset")
        );
        assert!(!record.thread().is_empty());
        assert_eq!(
            record.context(),
            &[
                ("request_id".to_string(), "r-1".to_string()),
                ("user".to_string(), "bob".to_string()),
                ("user".to_string(), "alice".to_string()),
            ]
        );
    }

    #[test]
    fn test_filters_and_errors() {
        let collect = Collect::default();
        let trap = CountingTrap::default();
        let logger = crate::builder()
            .dispatch(|d| {
                d.filter(MinimumLevel::new(Level::Error))
                    .append(collect.clone())
            })
            .dispatch(|d| d.append(Failing))
            .trap(trap.clone())
            .build();

        assert!(Logger::enabled(&logger, Level::Info, "any"));
        logger.log(
            &log::Record::builder()
                .args(format_args!("cache miss"))
                .level(log::Level::Info)
                .build(),
        );

        assert!(collect.0.lock().unwrap().is_empty());
        assert_eq!(*trap.0.lock().unwrap(), vec!["disk full".to_string()]);
    }
}
