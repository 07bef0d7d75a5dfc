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

//! Translation of log records into Riemann monitoring events.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::config::RiemannConfig;
use crate::proto;
use crate::record::ErrorInfo;
use crate::record::Level;
use crate::record::LogRecord;

/// Namespace for every log-derived attribute and tag, keeping them clear of Riemann's own keys.
pub const LOG_NAMESPACE: &str = "log/";

/// A monitoring event, built for one send and discarded afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitoringEvent {
    host: String,
    service: String,
    time: i64,
    description: String,
    tags: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
}

impl MonitoringEvent {
    /// The reporting host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Seconds since the Unix epoch.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The event tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// The event attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Look up one attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    fn copy_attributes<'a, I>(&mut self, source: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in source {
            self.set_attribute(format!("{LOG_NAMESPACE}{key}"), value.as_str());
        }
    }

    /// Convert into the wire representation.
    pub fn to_proto(&self) -> proto::Event {
        proto::Event {
            time: Some(self.time),
            service: Some(self.service.clone()),
            host: Some(self.host.clone()),
            description: Some(self.description.clone()),
            tags: self.tags.iter().cloned().collect(),
            attributes: self
                .attributes
                .iter()
                .map(|(key, value)| proto::Attribute {
                    key: key.clone(),
                    value: Some(value.clone()),
                })
                .collect(),
            ..Default::default()
        }
    }
}

/// Translate a log record into a monitoring event.
///
/// Reads the configuration, never mutates it.
pub fn translate(record: &LogRecord, config: &RiemannConfig) -> MonitoringEvent {
    let mut event = MonitoringEvent {
        host: config.host_name().to_string(),
        service: config.service_name().to_string(),
        // timestamps are in millis, `time` is in seconds
        time: record.timestamp_millis() / 1000,
        description: record.message().to_string(),
        tags: BTreeSet::new(),
        attributes: BTreeMap::new(),
    };

    event.set_attribute("log/level", record.level().as_str());
    event.set_attribute("log/logger", record.logger());
    event.set_attribute("log/thread", record.thread());
    event.set_attribute("log/message", record.message());
    event.set_attribute("service", config.service_name());

    if let Some(error) = record.error() {
        add_error_attributes(&mut event, record.level(), error);
    }

    if let Some(marker) = record.marker() {
        event.tags.insert(format!("{LOG_NAMESPACE}{marker}"));
    }

    // custom attributes go last so the copy order decides collisions
    event.copy_attributes(record.context().iter().map(|(k, v)| (k, v)));
    event.copy_attributes(config.custom_attributes());

    event
}

fn add_error_attributes(event: &mut MonitoringEvent, level: Level, error: &ErrorInfo) {
    let mut trace = String::with_capacity(error.message().len() + 1);
    trace.push_str(error.message());
    trace.push('\n');
    for frame in error.frames() {
        trace.push('\t');
        trace.push_str(frame);
        trace.push('\n');
    }

    if let Some(cause) = error.cause() {
        event.set_attribute("log/cause", cause.message());
    }
    event.set_attribute("log/stacktrace", trace);

    match level {
        Level::Error => event.set_attribute("state", "error"),
        Level::Warn => event.set_attribute("state", "warning"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn config() -> RiemannConfig {
        RiemannConfig::builder()
            .service_name("checkout")
            .host_name("web-1")
            .build()
            .unwrap()
    }

    fn record(level: Level) -> LogRecord {
        LogRecord::builder()
            .level(level)
            .message("payment declined")
            .logger("checkout::payments")
            .thread("worker-3")
            .timestamp_millis(1_700_000_000_123)
            .build()
    }

    #[test]
    fn test_base_fields_and_standard_attributes() {
        let event = translate(&record(Level::Error), &config());

        assert_eq!(event.host(), "web-1");
        assert_eq!(event.service(), "checkout");
        assert_eq!(event.time(), 1_700_000_000);
        assert_eq!(event.description(), "payment declined");
        assert!(event.tags().is_empty());

        let attributes: Vec<_> = event
            .attributes()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        insta::assert_snapshot!(
            attributes.join(", "),
            @"log/level=ERROR, log/logger=checkout::payments, log/message=payment declined, log/thread=worker-3, service=checkout"
        );
    }

    #[test]
    fn test_time_truncates_toward_zero() {
        let config = config();
        let at = |millis| {
            let record = LogRecord::builder().timestamp_millis(millis).build();
            translate(&record, &config).time()
        };
        assert_eq!(at(1500), 1);
        assert_eq!(at(1999), 1);
        assert_eq!(at(999), 0);
        assert_eq!(at(-1500), -1);

        let mut rng = rand::rng();
        for _ in 0..100 {
            let millis = rng.random_range(0..i64::MAX / 2);
            let time = at(millis);
            assert!(time * 1000 <= millis && millis < (time + 1) * 1000);
        }
    }

    #[test]
    fn test_error_attributes() {
        let error = ErrorInfo::new("timeout talking to bank")
            .with_frames(["payments::charge", "payments::retry"])
            .with_cause(ErrorInfo::new("connection reset"));
        let record = record(Level::Error).to_builder().error(error).build();
        let event = translate(&record, &config());

        assert_eq!(event.attribute("log/cause"), Some("connection reset"));
        assert_eq!(
            event.attribute("log/stacktrace"),
            Some("timeout talking to bank\n\tpayments::charge\n\tpayments::retry\n")
        );
        assert_eq!(event.attribute("state"), Some("error"));
    }

    #[test]
    fn test_error_without_cause_omits_cause() {
        let record = record(Level::Warn)
            .to_builder()
            .error(ErrorInfo::new("disk almost full"))
            .build();
        let event = translate(&record, &config());

        assert_eq!(event.attribute("log/cause"), None);
        assert_eq!(event.attribute("log/stacktrace"), Some("disk almost full\n"));
        assert_eq!(event.attribute("state"), Some("warning"));
    }

    #[test]
    fn test_state_only_for_warn_and_error() {
        for level in [Level::Info, Level::Debug, Level::Trace] {
            let record = record(level)
                .to_builder()
                .error(ErrorInfo::new("ignored"))
                .build();
            let event = translate(&record, &config());
            assert_eq!(event.attribute("state"), None, "level {level}");
            assert!(event.attribute("log/stacktrace").is_some());
        }

        // no error attached, no state either
        let event = translate(&record(Level::Error), &config());
        assert_eq!(event.attribute("state"), None);
    }

    #[test]
    fn test_marker_becomes_tag() {
        let record = record(Level::Error).to_builder().marker("audit").build();
        let event = translate(&record, &config());
        assert_eq!(
            event.tags().iter().collect::<Vec<_>>(),
            vec!["log/audit"]
        );
    }

    #[test]
    fn test_context_is_namespaced() {
        let record = record(Level::Error)
            .to_builder()
            .context("user", "alice")
            .build();
        let event = translate(&record, &config());
        assert_eq!(event.attribute("log/user"), Some("alice"));
        assert_eq!(event.attribute("user"), None);
    }

    #[test]
    fn test_copy_order_between_context_and_custom_attributes() {
        let config = RiemannConfig::builder()
            .host_name("web-1")
            .custom_attributes("env:prod,team:payments")
            .build()
            .unwrap();
        let record = record(Level::Error)
            .to_builder()
            .context("env", "staging")
            .context("service", "spoofed")
            .build();
        let event = translate(&record, &config);

        assert_eq!(event.attribute("log/env"), Some("prod"));
        assert_eq!(event.attribute("log/team"), Some("payments"));
        assert_eq!(event.attribute("log/service"), Some("spoofed"));
        assert_eq!(event.attribute("service"), Some("*no-service-name*"));
    }

    #[test]
    fn test_to_proto() {
        let record = record(Level::Error).to_builder().marker("audit").build();
        let event = translate(&record, &config()).to_proto();

        assert_eq!(event.host.as_deref(), Some("web-1"));
        assert_eq!(event.service.as_deref(), Some("checkout"));
        assert_eq!(event.time, Some(1_700_000_000));
        assert_eq!(event.description.as_deref(), Some("payment declined"));
        assert_eq!(event.tags, vec!["log/audit".to_string()]);
        assert_eq!(event.attributes.len(), 5);
        assert!(event.state.is_none());
    }
}
