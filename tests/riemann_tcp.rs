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
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use log::Log;
use logforth_append_riemann::Error;
use logforth_append_riemann::Trap;
use logforth_append_riemann::append::Riemann;
use logforth_append_riemann::config::RiemannConfig;
use logforth_append_riemann::diagnostic::ThreadLocalDiagnostic;
use logforth_append_riemann::proto;
use logforth_append_riemann::record::Level;
use prost::Message;

#[derive(Debug, Clone, Default)]
struct RecordingTrap {
    errors: Arc<Mutex<Vec<String>>>,
    notices: Arc<Mutex<Vec<String>>>,
}

impl Trap for RecordingTrap {
    fn trap(&self, err: &Error) {
        self.errors.lock().unwrap().push(err.message().to_string());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

/// What the collector does with one incoming message.
#[derive(Debug, Clone, Copy)]
enum Reply {
    Ok,
    Error(&'static str),
    Hangup,
}

fn read_msg(stream: &mut TcpStream) -> Option<proto::Msg> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut body).ok()?;
    proto::Msg::decode(body.as_slice()).ok()
}

fn write_msg(stream: &mut TcpStream, msg: &proto::Msg) {
    let body = msg.encode_to_vec();
    stream.write_all(&(body.len() as u32).to_be_bytes()).unwrap();
    stream.write_all(&body).unwrap();
}

/// Spawn a collector; each inner vector scripts one accepted connection.
fn collector(connections: Vec<Vec<Reply>>) -> (u16, JoinHandle<Vec<proto::Event>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let mut received = vec![];
        for replies in connections {
            let (mut stream, _) = listener.accept().unwrap();
            for reply in replies {
                let Some(msg) = read_msg(&mut stream) else {
                    break;
                };
                match reply {
                    Reply::Ok => {
                        received.extend(msg.events);
                        write_msg(&mut stream, &proto::Msg {
                            ok: Some(true),
                            ..Default::default()
                        });
                    }
                    Reply::Error(reason) => write_msg(&mut stream, &proto::Msg {
                        ok: Some(false),
                        error: Some(reason.to_string()),
                        ..Default::default()
                    }),
                    Reply::Hangup => break,
                }
            }
        }
        received
    });
    (port, handle)
}

fn config(port: u16, trap: &RecordingTrap) -> RiemannConfig {
    RiemannConfig::builder()
        .service_name("billing")
        .host_name("web-1")
        .collector_host("127.0.0.1")
        .collector_port(port)
        .min_level(Level::Warn)
        .custom_attributes("env:prod,region:eu")
        .tcp(true)
        .trap(trap.clone())
        .build()
        .unwrap()
}

fn attribute<'a>(event: &'a proto::Event, key: &str) -> Option<&'a str> {
    event
        .attributes
        .iter()
        .find(|attr| attr.key == key)
        .and_then(|attr| attr.value.as_deref())
}

#[test]
fn test_log_records_reach_collector() {
    let (port, server) = collector(vec![vec![Reply::Ok, Reply::Ok]]);
    let trap = RecordingTrap::default();
    let mut riemann = Riemann::new(config(port, &trap));
    riemann.start().unwrap();

    let logger = logforth_append_riemann::builder()
        .dispatch(|d| d.diagnostic(ThreadLocalDiagnostic::default()).append(riemann))
        .build();

    ThreadLocalDiagnostic::insert("request_id", "r-42");
    let io_err = std::io::Error::other("card expired");
    let kvs: Vec<(&str, log::kv::Value)> = vec![
        ("marker", log::kv::Value::from("audit")),
        ("err", log::kv::Value::from_dyn_error(&io_err)),
    ];
    logger.log(
        &log::Record::builder()
            .args(format_args!("payment declined"))
            .level(log::Level::Error)
            .target("checkout")
            .key_values(&kvs)
            .build(),
    );
    // below the minimum level, never leaves the process
    logger.log(
        &log::Record::builder()
            .args(format_args!("cart viewed"))
            .level(log::Level::Info)
            .target("checkout")
            .build(),
    );
    logger.log(
        &log::Record::builder()
            .args(format_args!("slow response"))
            .level(log::Level::Warn)
            .target("checkout")
            .build(),
    );
    ThreadLocalDiagnostic::clear();
    drop(logger);

    let events = server.join().unwrap();
    assert_eq!(events.len(), 2);

    let error = &events[0];
    assert_eq!(error.host.as_deref(), Some("web-1"));
    assert_eq!(error.service.as_deref(), Some("billing"));
    assert_eq!(error.description.as_deref(), Some("payment declined"));
    assert_eq!(error.tags, vec!["log/audit".to_string()]);
    assert_eq!(attribute(error, "log/level"), Some("ERROR"));
    assert_eq!(attribute(error, "log/logger"), Some("checkout"));
    assert_eq!(attribute(error, "state"), Some("error"));
    assert_eq!(attribute(error, "log/request_id"), Some("r-42"));
    assert_eq!(attribute(error, "log/env"), Some("prod"));
    assert_eq!(attribute(error, "log/region"), Some("eu"));
    assert_eq!(attribute(error, "log/stacktrace"), Some("card expired\n"));

    let warn = &events[1];
    assert_eq!(warn.description.as_deref(), Some("slow response"));
    assert!(warn.tags.is_empty());
    assert_eq!(attribute(warn, "log/level"), Some("WARN"));
    assert_eq!(attribute(warn, "state"), None);

    assert!(trap.errors.lock().unwrap().is_empty());
    assert_eq!(trap.notices.lock().unwrap().len(), 1);
}

#[test]
fn test_reconnect_after_collector_hangs_up() {
    let (port, server) = collector(vec![vec![Reply::Hangup], vec![Reply::Ok]]);
    let trap = RecordingTrap::default();
    let mut riemann = Riemann::new(config(port, &trap));
    riemann.start().unwrap();

    let event = logforth_append_riemann::event::translate(
        &logforth_append_riemann::record::LogRecord::builder()
            .level(Level::Error)
            .message("disk almost full")
            .build(),
        riemann.config(),
    );
    assert!(riemann.forward(&event).is_delivered());
    riemann.stop();

    let events = server.join().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].description.as_deref(), Some("disk almost full"));
    assert!(trap.errors.lock().unwrap().is_empty());
}

#[test]
fn test_second_rejection_is_trapped() {
    let (port, server) = collector(vec![
        vec![Reply::Error("index full")],
        vec![Reply::Error("index still full")],
    ]);
    let trap = RecordingTrap::default();
    let mut riemann = Riemann::new(config(port, &trap));
    riemann.start().unwrap();

    let logger = logforth_append_riemann::builder()
        .dispatch(|d| d.append(riemann))
        .build();
    logger.log(
        &log::Record::builder()
            .args(format_args!("payment declined"))
            .level(log::Level::Error)
            .build(),
    );
    drop(logger);

    assert!(server.join().unwrap().is_empty());
    assert_eq!(
        *trap.errors.lock().unwrap(),
        vec!["Riemann.append: collector rejected event".to_string()]
    );
}

#[test]
fn test_start_fails_without_collector() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let trap = RecordingTrap::default();
    let mut riemann = Riemann::new(config(port, &trap));

    let err = riemann.start().unwrap_err();
    assert_eq!(err.message(), "failed to start riemann appender");
    assert!(!riemann.is_started());
    assert!(trap.notices.lock().unwrap().is_empty());
}
