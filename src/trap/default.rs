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
use std::io;
use std::io::Write;

use crate::Error;
use crate::trap::Trap;

const PREFIX: &str = "riemann-appender";

/// A trap that writes one line per diagnostic to standard error.
///
/// Errors are rendered as `riemann-appender ERROR [kind] message (...)`, notices as
/// `riemann-appender INFO message`. Write failures are ignored.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct DefaultTrap {}

impl Trap for DefaultTrap {
    fn trap(&self, err: &Error) {
        write_line(&mut io::stderr().lock(), "ERROR", err);
    }

    fn notice(&self, message: &str) {
        write_line(&mut io::stderr().lock(), "INFO", message);
    }
}

fn write_line(w: &mut impl Write, severity: &str, line: impl fmt::Display) {
    let _ = writeln!(w, "{PREFIX} {severity} {line}");
}
