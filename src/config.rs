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

//! Configuration of the Riemann appender.
//!
//! A [`RiemannConfig`] is built once through [`RiemannConfigBuilder`] and is immutable afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::ErrorKind;
use crate::hostname::resolve_hostname;
use crate::record::Level;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "*no-service-name*";
/// Collector host used when none is configured.
pub const DEFAULT_COLLECTOR_HOST: &str = "localhost";
/// Riemann's default port for both TCP and UDP.
pub const DEFAULT_COLLECTOR_PORT: u16 = 5555;
/// Connect, read and write timeout of the bundled transports.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variables read by [`RiemannConfigBuilder::from_env`].
pub mod env {
    /// Service name.
    pub const SERVICE_NAME: &str = "RIEMANN_SERVICE_NAME";
    /// Collector host.
    pub const COLLECTOR_HOST: &str = "RIEMANN_HOSTNAME";
    /// Collector port.
    pub const COLLECTOR_PORT: &str = "RIEMANN_PORT";
    /// Override of the reporting host name.
    pub const REPORTING_HOST: &str = "RIEMANN_REPORTING_HOST";
    /// Minimum level, e.g. `warn`.
    pub const LOG_LEVEL: &str = "RIEMANN_LOG_LEVEL";
    /// Custom attributes, e.g. `env:prod,team:payments`.
    pub const CUSTOM_ATTRIBUTES: &str = "RIEMANN_CUSTOM_ATTRIBUTES";
    /// `true` to use TCP instead of UDP.
    pub const TCP: &str = "RIEMANN_TCP";
}

/// The transport used to reach the collector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// One datagram per event, acknowledged as soon as it is written.
    #[default]
    Udp,
    /// A persistent connection; every event waits for the collector's acknowledgement.
    Tcp,
}

impl TransportKind {
    /// Return the string representation of the `TransportKind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Immutable configuration of a [`Riemann`](crate::append::Riemann) appender.
#[derive(Clone, Debug)]
pub struct RiemannConfig {
    service_name: String,
    host_name: String,
    collector_host: String,
    collector_port: u16,
    min_level: Level,
    transport: TransportKind,
    timeout: Duration,
    custom_attributes: BTreeMap<String, String>,
    trap: Arc<dyn Trap>,
}

impl RiemannConfig {
    /// Create a builder with the default settings.
    pub fn builder() -> RiemannConfigBuilder {
        RiemannConfigBuilder::default()
    }

    /// The service name reported on every event.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The host name reported on every event.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// The collector host.
    pub fn collector_host(&self) -> &str {
        &self.collector_host
    }

    /// The collector port.
    pub fn collector_port(&self) -> u16 {
        self.collector_port
    }

    /// Records less severe than this level are dropped.
    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// The transport used to reach the collector.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// The timeout of the bundled transports.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Static attributes added to every event, before namespacing.
    pub fn custom_attributes(&self) -> &BTreeMap<String, String> {
        &self.custom_attributes
    }

    /// The sink of local diagnostics.
    pub fn trap(&self) -> &dyn Trap {
        self.trap.as_ref()
    }
}

/// A builder to configure and create a [`RiemannConfig`].
#[derive(Debug)]
pub struct RiemannConfigBuilder {
    service_name: String,
    host_name: Option<String>,
    collector_host: String,
    collector_port: u16,
    min_level: Level,
    min_level_str: Option<String>,
    transport: TransportKind,
    timeout: Duration,
    custom_attributes: Vec<String>,
    trap: Arc<dyn Trap>,
}

impl Default for RiemannConfigBuilder {
    fn default() -> Self {
        RiemannConfigBuilder {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            host_name: None,
            collector_host: DEFAULT_COLLECTOR_HOST.to_string(),
            collector_port: DEFAULT_COLLECTOR_PORT,
            min_level: Level::Error,
            min_level_str: None,
            transport: TransportKind::Udp,
            timeout: DEFAULT_TIMEOUT,
            custom_attributes: vec![],
            trap: Arc::new(DefaultTrap::default()),
        }
    }
}

impl RiemannConfigBuilder {
    /// Create a builder seeded from the `RIEMANN_*` environment variables.
    ///
    /// See [`env`] for the variable names. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Return an error if the port or the TCP switch cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = RiemannConfigBuilder::default();

        if let Some(service_name) = lookup(env::SERVICE_NAME) {
            builder = builder.service_name(service_name);
        }
        if let Some(collector_host) = lookup(env::COLLECTOR_HOST) {
            builder = builder.collector_host(collector_host);
        }
        if let Some(port) = lookup(env::COLLECTOR_PORT) {
            let port = u16::from_str(port.trim()).map_err(|err| {
                Error::new(ErrorKind::Config, "malformed collector port")
                    .with_context("variable", env::COLLECTOR_PORT)
                    .with_context("value", &port)
                    .with_source(err)
            })?;
            builder = builder.collector_port(port);
        }
        if let Some(host_name) = lookup(env::REPORTING_HOST) {
            builder = builder.host_name(host_name);
        }
        if let Some(level) = lookup(env::LOG_LEVEL) {
            builder = builder.min_level_str(level);
        }
        if let Some(attributes) = lookup(env::CUSTOM_ATTRIBUTES) {
            builder = builder.custom_attributes(attributes);
        }
        if let Some(tcp) = lookup(env::TCP) {
            let tcp = parse_bool(&tcp).ok_or_else(|| {
                Error::new(ErrorKind::Config, "malformed transport switch")
                    .with_context("variable", env::TCP)
                    .with_context("value", &tcp)
            })?;
            builder = builder.tcp(tcp);
        }

        Ok(builder)
    }

    /// Set the service name reported on every event.
    ///
    /// Default to `*no-service-name*`.
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Override the host name reported on every event.
    ///
    /// Default to the host name resolved from the operating system.
    pub fn host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    /// Set the collector host.
    ///
    /// Default to `localhost`.
    pub fn collector_host(mut self, collector_host: impl Into<String>) -> Self {
        self.collector_host = collector_host.into();
        self
    }

    /// Set the collector port.
    ///
    /// Default to `5555`.
    pub fn collector_port(mut self, collector_port: u16) -> Self {
        self.collector_port = collector_port;
        self
    }

    /// Set the minimum level of forwarded records.
    ///
    /// Default to [`Level::Error`].
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self.min_level_str = None;
        self
    }

    /// Set the minimum level from its name, e.g. `"warn"`.
    ///
    /// The name is parsed by [`build`](Self::build). An unknown name falls back to
    /// [`Level::Debug`] and is reported to the trap.
    pub fn min_level_str(mut self, level: impl Into<String>) -> Self {
        self.min_level_str = Some(level.into());
        self
    }

    /// Select the transport.
    ///
    /// Default to [`TransportKind::Udp`].
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Use TCP when `true`, UDP otherwise.
    pub fn tcp(self, tcp: bool) -> Self {
        self.transport(if tcp {
            TransportKind::Tcp
        } else {
            TransportKind::Udp
        })
    }

    /// Set the connect, read and write timeout of the bundled transports.
    ///
    /// Default to 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add static attributes from a `key:value,key:value` string.
    ///
    /// Parsing happens in [`build`](Self::build). A malformed pair stops the parse of that string;
    /// the pairs before it are kept and the failure is reported to the trap.
    pub fn custom_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.custom_attributes.push(attributes.into());
        self
    }

    /// Set the sink of local diagnostics.
    ///
    /// Default to [`DefaultTrap`], which writes to standard error.
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Arc::new(trap);
        self
    }

    /// Build the [`RiemannConfig`].
    ///
    /// # Errors
    ///
    /// Return an error if no host name override is set and the OS host name cannot be resolved.
    pub fn build(self) -> Result<RiemannConfig, Error> {
        let RiemannConfigBuilder {
            service_name,
            host_name,
            collector_host,
            collector_port,
            min_level,
            min_level_str,
            transport,
            timeout,
            custom_attributes,
            trap,
        } = self;

        let host_name = match host_name {
            Some(host_name) => host_name,
            None => resolve_hostname()?,
        };

        let min_level = match min_level_str {
            Some(name) => parse_level(&name, trap.as_ref()),
            None => min_level,
        };

        let mut attributes = BTreeMap::new();
        for input in custom_attributes.iter() {
            attributes.extend(parse_custom_attributes(input, trap.as_ref()));
        }

        Ok(RiemannConfig {
            service_name,
            host_name,
            collector_host,
            collector_port,
            min_level,
            transport,
            timeout,
            custom_attributes: attributes,
            trap,
        })
    }
}

// unknown names fall back to DEBUG
fn parse_level(name: &str, trap: &dyn Trap) -> Level {
    Level::from_str(name).unwrap_or_else(|err| {
        let err = Error::new(ErrorKind::Config, "unknown minimum level, falling back to DEBUG")
            .with_context("level", name)
            .with_source(err);
        trap.trap(&err);
        Level::Debug
    })
}

/// Parse a `key:value,key:value` string into attributes.
///
/// Empty segments are skipped and a value keeps any further `:`. A segment without a `:`, or
/// with an empty key or value, aborts the parse: the failure goes to `trap` and the pairs parsed
/// so far are returned.
pub fn parse_custom_attributes(input: &str, trap: &dyn Trap) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for pair in input.split(',') {
        if pair.trim().is_empty() {
            continue;
        }
        match pair.split_once(':') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                result.insert(key.to_string(), value.to_string());
            }
            _ => {
                let err = Error::new(
                    ErrorKind::Config,
                    "encountered error while parsing attribute string",
                )
                .with_context("attributes", input)
                .with_context("pair", pair);
                trap.trap(&err);
                break;
            }
        }
    }
    result
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
