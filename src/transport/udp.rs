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

use std::net::SocketAddr;
use std::net::UdpSocket;
use std::sync::Mutex;

use crate::Error;
use crate::ErrorKind;
use crate::event::MonitoringEvent;
use crate::transport::Acknowledgement;
use crate::transport::Transport;
use crate::transport::encode;
use crate::transport::endpoint;
use crate::transport::lock;
use crate::transport::not_connected;
use crate::transport::resolve;

/// A transport that sends every event as one datagram.
///
/// The collector never answers over UDP, so an event counts as accepted once the datagram is
/// written to the socket.
#[derive(Debug)]
pub struct UdpTransport {
    host: String,
    port: u16,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpTransport {
    /// Create a transport to `host:port`. Nothing is bound until [`Transport::connect`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        UdpTransport {
            host: host.into(),
            port,
            socket: Mutex::new(None),
        }
    }

    fn open(&self) -> Result<UdpSocket, Error> {
        let mut last_err = None;
        for addr in resolve(&self.host, self.port)? {
            let local: SocketAddr = if addr.is_ipv4() {
                ([0u8; 4], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            let socket = match UdpSocket::bind(local) {
                Ok(socket) => socket,
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            };
            match socket.connect(addr) {
                Ok(()) => return Ok(socket),
                Err(err) => last_err = Some(err),
            }
        }

        let mut err = Error::new(ErrorKind::Transport, "failed to connect to collector")
            .with_context("transport", "udp")
            .with_context("endpoint", endpoint(&self.host, self.port));
        if let Some(source) = last_err {
            err = err.with_source(source);
        }
        Err(err)
    }
}

impl Transport for UdpTransport {
    fn connect(&self) -> Result<(), Error> {
        let socket = self.open()?;
        *lock(&self.socket) = Some(socket);
        Ok(())
    }

    fn send(&self, event: &MonitoringEvent) -> Result<Acknowledgement, Error> {
        let guard = lock(&self.socket);
        let Some(socket) = guard.as_ref() else {
            return Err(not_connected(&self.host, self.port));
        };

        let payload = encode(event);
        let written = socket.send(&payload).map_err(|err| {
            Error::from_io_error(err).with_context("endpoint", endpoint(&self.host, self.port))
        })?;
        if written != payload.len() {
            return Err(Error::new(ErrorKind::Transport, "datagram truncated")
                .with_context("len", payload.len())
                .with_context("written", written));
        }
        Ok(Acknowledgement::Accepted)
    }

    fn close(&self) {
        lock(&self.socket).take();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prost::Message;

    use super::*;
    use crate::proto;

    #[test]
    fn test_send_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = server.local_addr().unwrap().port();

        let transport = UdpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();
        let ack = transport.send(&MonitoringEvent::default()).unwrap();
        assert_eq!(ack, Acknowledgement::Accepted);

        let mut buf = [0u8; 65536];
        let n = server.recv(&mut buf).unwrap();
        let msg = proto::Msg::decode(&buf[..n]).unwrap();
        assert_eq!(msg.events.len(), 1);

        transport.reconnect().unwrap();
        assert_eq!(
            transport.send(&MonitoringEvent::default()).unwrap(),
            Acknowledgement::Accepted
        );
    }

    #[test]
    fn test_send_after_close() {
        let transport = UdpTransport::new("127.0.0.1", 5555);
        transport.connect().unwrap();
        transport.close();
        let err = transport.send(&MonitoringEvent::default()).unwrap_err();
        assert_eq!(err.message(), "transport is not connected");
    }
}
