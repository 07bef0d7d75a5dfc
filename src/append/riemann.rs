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

use std::fmt;

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::config::RiemannConfig;
use crate::event::MonitoringEvent;
use crate::event::translate;
use crate::filter::MinimumLevel;
use crate::record::LogRecord;
use crate::transport;
use crate::transport::Acknowledgement;
use crate::transport::Transport;

/// The result of one send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// The collector accepted the event.
    Delivered,
    /// The collector answered with a negative acknowledgement.
    Rejected(String),
    /// The exchange failed before any acknowledgement arrived.
    Failed(Error),
}

impl SendOutcome {
    /// Whether the event reached the collector and was accepted.
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }

    /// A description of the failure, or `None` when delivered.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            SendOutcome::Delivered => None,
            SendOutcome::Rejected(reason) => Some(reason.clone()),
            SendOutcome::Failed(err) => Some(err.to_string()),
        }
    }
}

impl From<Result<Acknowledgement, Error>> for SendOutcome {
    fn from(result: Result<Acknowledgement, Error>) -> Self {
        match result {
            Ok(Acknowledgement::Accepted) => SendOutcome::Delivered,
            Ok(Acknowledgement::Rejected(reason)) => SendOutcome::Rejected(reason),
            Err(err) => SendOutcome::Failed(err),
        }
    }
}

/// An appender that forwards log records to a Riemann collector.
///
/// Records below the configured minimum level are dropped up front. Every other record is
/// translated into an event and sent on the calling thread, waiting for the acknowledgement. If
/// the send fails, the transport reconnects once and the same event is sent again; if that also
/// fails, the failure goes to the configured [`Trap`](crate::Trap) and the record is dropped.
/// [`append`](Append::append) therefore never returns an error for a delivery failure.
///
/// The appender must be [started](Riemann::start) before it forwards anything. Records appended
/// before `start` or after [`stop`](Riemann::stop) are dropped.
///
/// # Examples
///
/// ```no_run
/// use logforth_append_riemann::append::Riemann;
/// use logforth_append_riemann::config::RiemannConfig;
///
/// let config = RiemannConfig::builder()
///     .service_name("billing")
///     .tcp(true)
///     .build()
///     .unwrap();
/// let mut riemann = Riemann::new(config);
/// riemann.start().unwrap();
/// ```
#[derive(Debug)]
pub struct Riemann {
    config: RiemannConfig,
    filter: MinimumLevel,
    transport: Box<dyn Transport>,
    started: bool,
}

impl Riemann {
    /// Create an appender using the bundled transport selected by `config`.
    ///
    /// No connection is made until [`start`](Riemann::start).
    pub fn new(config: RiemannConfig) -> Self {
        let transport = transport::from_config(&config);
        Self::with_transport(config, transport)
    }

    /// Create an appender over a custom, not yet connected, transport.
    pub fn with_transport(config: RiemannConfig, transport: impl Into<Box<dyn Transport>>) -> Self {
        let filter = MinimumLevel::new(config.min_level());
        Riemann {
            config,
            filter,
            transport: transport.into(),
            started: false,
        }
    }

    /// The configuration of this appender.
    pub fn config(&self) -> &RiemannConfig {
        &self.config
    }

    /// Whether [`start`](Riemann::start) has completed and [`stop`](Riemann::stop) has not been
    /// called since.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Connect to the collector.
    ///
    /// Starting a started appender is a no-op.
    ///
    /// # Errors
    ///
    /// Return an error if the connection cannot be established; the appender stays stopped.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.started {
            return Ok(());
        }

        self.transport.connect().map_err(|err| {
            Error::new(err.kind(), "failed to start riemann appender")
                .with_context("appender", &*self)
                .with_source(err)
        })?;
        self.started = true;

        self.config.trap().notice(&format!(
            "Riemann.start: connected to {}:{} over {}, using hostname of {}",
            self.config.collector_host(),
            self.config.collector_port(),
            self.config.transport(),
            self.config.host_name(),
        ));
        Ok(())
    }

    /// Close the connection. Stopping a stopped appender is a no-op.
    pub fn stop(&mut self) {
        if self.started {
            self.started = false;
            self.transport.close();
        }
    }

    /// Whether `record` is at least as severe as the configured minimum level.
    pub fn is_minimum_level(&self, record: &LogRecord) -> bool {
        self.filter.is_minimum_level(record.level())
    }

    /// Send `event`, reconnecting and resending once if the first attempt fails.
    ///
    /// Return the outcome of the last attempt.
    pub fn forward(&self, event: &MonitoringEvent) -> SendOutcome {
        let outcome = self.send(event);
        if outcome.is_delivered() {
            return outcome;
        }

        if let Err(err) = self.transport.reconnect() {
            return SendOutcome::Failed(err);
        }
        self.send(event)
    }

    fn send(&self, event: &MonitoringEvent) -> SendOutcome {
        SendOutcome::from(self.transport.send(event))
    }
}

impl Append for Riemann {
    fn append(&self, record: &LogRecord) -> Result<(), Error> {
        if !self.started || !self.is_minimum_level(record) {
            return Ok(());
        }

        let event = translate(record, &self.config);
        let err = match self.forward(&event) {
            SendOutcome::Delivered => return Ok(()),
            SendOutcome::Rejected(reason) => {
                Error::new(ErrorKind::Rejected, "Riemann.append: collector rejected event")
                    .with_context("reason", reason)
            }
            SendOutcome::Failed(err) => {
                Error::new(err.kind(), "Riemann.append: failed to send event").with_source(err)
            }
        };
        self.config.trap().trap(&err);
        Ok(())
    }
}

impl Drop for Riemann {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Display for Riemann {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RiemannAppender{{serviceName={};transport={};riemannHostname={};riemannPort={};hostname={}}}",
            self.config.service_name(),
            self.config.transport(),
            self.config.collector_host(),
            self.config.collector_port(),
            self.config.host_name(),
        )
    }
}
