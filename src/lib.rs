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

//! A Logforth-style appender that forwards log records to a [Riemann] collector.
//!
//! # Overview
//!
//! Every accepted record is translated into a Riemann event (host, service, time, description,
//! tags and attributes) and sent synchronously over UDP or TCP. A failed send triggers exactly one
//! reconnect and resend; if that also fails, the failure is reported through the local
//! [`Trap`](trap::Trap) and the record is dropped. Nothing from the forwarding path is ever
//! propagated back into the application.
//!
//! # Examples
//!
//! ```no_run
//! use logforth_append_riemann::append::Riemann;
//! use logforth_append_riemann::config::RiemannConfig;
//! use logforth_append_riemann::record::Level;
//!
//! let config = RiemannConfig::builder()
//!     .service_name("billing")
//!     .collector_host("riemann.internal")
//!     .min_level(Level::Warn)
//!     .custom_attributes("env:prod,region:eu")
//!     .tcp(true)
//!     .build()
//!     .unwrap();
//!
//! let mut riemann = Riemann::new(config);
//! riemann.start().unwrap();
//!
//! logforth_append_riemann::builder()
//!     .dispatch(|d| d.append(riemann))
//!     .apply();
//!
//! log::error!(marker = "audit"; "payment declined");
//! ```
//!
//! [Riemann]: https://riemann.io

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod append;
pub mod config;
pub mod diagnostic;
pub mod event;
pub mod filter;
pub mod hostname;
pub mod proto;
pub mod record;
pub mod transport;
pub mod trap;

mod error;
mod logger;

pub use append::Append;
pub use diagnostic::Diagnostic;
pub use error::Error;
pub use error::ErrorKind;
pub use filter::Filter;
pub use logger::*;
pub use trap::Trap;
