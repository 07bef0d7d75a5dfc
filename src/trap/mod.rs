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

//! Local diagnostics for the appender itself.
//!
//! Traps receive what the appender needs to tell the operator: connection confirmations and
//! forwarding failures. They must never route back into the logging pipeline, otherwise a broken
//! collector would feed its own failures back into the forwarder.

use std::fmt;

use crate::Error;

mod default;

pub use self::default::DefaultTrap;

/// A sink for the appender's own diagnostics.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Report an error that was absorbed instead of propagated.
    fn trap(&self, err: &Error);

    /// Report an informational notice, such as a successful connection.
    fn notice(&self, message: &str);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
