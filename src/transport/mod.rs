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

//! Blocking transports to a Riemann collector.
//!
//! A [`Transport`] owns one connection and exposes the four primitives the appender needs:
//! connect, send-and-wait-for-acknowledgement, reconnect and close. Implementations are
//! internally synchronized so they can be shared by every thread that logs.

use std::fmt;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::Error;
use crate::ErrorKind;
use crate::config::RiemannConfig;
use crate::config::TransportKind;
use crate::event::MonitoringEvent;
use crate::proto;

mod tcp;
mod udp;

pub use self::tcp::TcpTransport;
pub use self::udp::UdpTransport;

/// The collector's answer to one send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The collector accepted the event.
    Accepted,
    /// The collector refused the event, with its error message.
    Rejected(String),
}

/// A connection to a Riemann collector.
pub trait Transport: fmt::Debug + Send + Sync + 'static {
    /// Establish the underlying connection. Blocks until connected or failed.
    fn connect(&self) -> Result<(), Error>;

    /// Send one event and wait for the collector's acknowledgement.
    ///
    /// An `Err` means the exchange itself failed, e.g. the connection dropped.
    fn send(&self, event: &MonitoringEvent) -> Result<Acknowledgement, Error>;

    /// Tear down and reestablish the underlying connection.
    ///
    /// Default to [`close`](Transport::close) followed by [`connect`](Transport::connect).
    fn reconnect(&self) -> Result<(), Error> {
        self.close();
        self.connect()
    }

    /// Release the underlying connection. Closing a closed transport is a no-op.
    fn close(&self);
}

impl<T: Transport> From<T> for Box<dyn Transport> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Create the bundled transport selected by `config`, not yet connected.
pub fn from_config(config: &RiemannConfig) -> Box<dyn Transport> {
    let host = config.collector_host();
    let port = config.collector_port();
    match config.transport() {
        TransportKind::Tcp => {
            Box::new(TcpTransport::new(host, port).with_timeout(config.timeout()))
        }
        TransportKind::Udp => Box::new(UdpTransport::new(host, port)),
    }
}

fn encode(event: &MonitoringEvent) -> Vec<u8> {
    use prost::Message;

    let msg = proto::Msg {
        events: vec![event.to_proto()],
        ..Default::default()
    };
    msg.encode_to_vec()
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, Error> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|err| {
            Error::new(ErrorKind::Transport, "failed to resolve collector address")
                .with_context("endpoint", endpoint(host, port))
                .with_source(err)
        })?
        .collect::<Vec<_>>();

    if addrs.is_empty() {
        return Err(Error::new(ErrorKind::Transport, "collector address resolved to nothing")
            .with_context("endpoint", endpoint(host, port)));
    }
    Ok(addrs)
}

fn endpoint(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

// a panic while holding the socket leaves it usable, the next send simply reports its own error
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_connected(host: &str, port: u16) -> Error {
    Error::new(ErrorKind::Transport, "transport is not connected").with_context("endpoint", endpoint(host, port))
}
