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

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;

use prost::Message;

use crate::Error;
use crate::ErrorKind;
use crate::config::DEFAULT_TIMEOUT;
use crate::event::MonitoringEvent;
use crate::proto;
use crate::transport::Acknowledgement;
use crate::transport::Transport;
use crate::transport::encode;
use crate::transport::endpoint;
use crate::transport::lock;
use crate::transport::not_connected;
use crate::transport::resolve;

// acknowledgements are a few bytes; anything larger means the stream is out of sync
const MAX_RESPONSE_LEN: usize = 16 * 1024 * 1024;

/// A transport that keeps one TCP connection open and waits for every acknowledgement.
///
/// Messages are framed with a 4-byte big-endian length prefix, in both directions.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    /// Create a transport to `host:port`. Nothing is opened until [`Transport::connect`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpTransport {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            stream: Mutex::new(None),
        }
    }

    /// Set the connect, read and write timeout.
    ///
    /// Default to 5 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn open(&self) -> Result<TcpStream, Error> {
        let mut last_err = None;
        for addr in resolve(&self.host, self.port)? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.timeout))
                        .map_err(Error::from_io_error)?;
                    stream
                        .set_write_timeout(Some(self.timeout))
                        .map_err(Error::from_io_error)?;
                    stream.set_nodelay(true).map_err(Error::from_io_error)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        let mut err = Error::new(ErrorKind::Transport, "failed to connect to collector")
            .with_context("transport", "tcp")
            .with_context("endpoint", endpoint(&self.host, self.port));
        if let Some(source) = last_err {
            err = err.with_source(source);
        }
        Err(err)
    }
}

impl Transport for TcpTransport {
    fn connect(&self) -> Result<(), Error> {
        let stream = self.open()?;
        *lock(&self.stream) = Some(stream);
        Ok(())
    }

    fn send(&self, event: &MonitoringEvent) -> Result<Acknowledgement, Error> {
        let mut guard = lock(&self.stream);
        let Some(stream) = guard.as_mut() else {
            return Err(not_connected(&self.host, self.port));
        };

        match exchange(stream, &encode(event)) {
            Ok(ack) => Ok(ack),
            Err(err) => {
                // the framing may be out of sync now; only a reconnect can recover
                *guard = None;
                Err(err.with_context("endpoint", endpoint(&self.host, self.port)))
            }
        }
    }

    fn close(&self) {
        if let Some(stream) = lock(&self.stream).take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

fn exchange(stream: &mut TcpStream, payload: &[u8]) -> Result<Acknowledgement, Error> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        Error::new(ErrorKind::Protocol, "message too large for a tcp frame")
            .with_context("len", payload.len())
    })?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).map_err(Error::from_io_error)?;
    stream.flush().map_err(Error::from_io_error)?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).map_err(Error::from_io_error)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_RESPONSE_LEN {
        return Err(
            Error::new(ErrorKind::Protocol, "acknowledgement frame too large")
                .with_context("len", len),
        );
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).map_err(Error::from_io_error)?;
    let msg = proto::Msg::decode(body.as_slice()).map_err(Error::from_decode_error)?;
    Ok(acknowledgement(msg))
}

fn acknowledgement(msg: proto::Msg) -> Acknowledgement {
    if msg.ok == Some(true) {
        Acknowledgement::Accepted
    } else {
        Acknowledgement::Rejected(
            msg.error
                .unwrap_or_else(|| "collector did not acknowledge the event".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    fn serve_once(reply: proto::Msg) -> (u16, std::thread::JoinHandle<proto::Msg>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
            stream.read_exact(&mut body).unwrap();
            let received = proto::Msg::decode(body.as_slice()).unwrap();

            let reply = reply.encode_to_vec();
            stream
                .write_all(&(reply.len() as u32).to_be_bytes())
                .unwrap();
            stream.write_all(&reply).unwrap();
            received
        });
        (port, handle)
    }

    #[test]
    fn test_send_accepted() {
        let (port, server) = serve_once(proto::Msg {
            ok: Some(true),
            ..Default::default()
        });
        let transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();

        let ack = transport.send(&MonitoringEvent::default()).unwrap();
        assert_eq!(ack, Acknowledgement::Accepted);

        let received = server.join().unwrap();
        assert_eq!(received.events.len(), 1);
        transport.close();
        transport.close();
    }

    #[test]
    fn test_send_rejected() {
        let (port, server) = serve_once(proto::Msg {
            ok: Some(false),
            error: Some("index full".to_string()),
            ..Default::default()
        });
        let transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();

        let ack = transport.send(&MonitoringEvent::default()).unwrap();
        assert_eq!(ack, Acknowledgement::Rejected("index full".to_string()));
        server.join().unwrap();
    }

    #[test]
    fn test_send_before_connect() {
        let transport = TcpTransport::new("127.0.0.1", 5555);
        let err = transport.send(&MonitoringEvent::default()).unwrap_err();
        assert_eq!(err.message(), "transport is not connected");
    }

    #[test]
    fn test_connect_refused() {
        // grab a free port, then release it so nothing listens there
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport =
            TcpTransport::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
        let err = transport.connect().unwrap_err();
        assert_eq!(err.message(), "failed to connect to collector");
    }

    #[test]
    fn test_missing_ok_is_rejection() {
        let ack = acknowledgement(proto::Msg::default());
        assert_eq!(
            ack,
            Acknowledgement::Rejected("collector did not acknowledge the event".to_string())
        );
    }
}
