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

//! Mapped Diagnostic Context (MDC) that stamps records with per-thread key-values.

use std::fmt;

use crate::Error;

mod thread_local;

pub use self::thread_local::ThreadLocalDiagnostic;

/// A visitor to walk through diagnostic key-value pairs.
pub trait Visitor {
    /// Visit a key-value pair.
    fn visit(&mut self, key: &str, value: &str) -> Result<(), Error>;
}

impl<F> Visitor for F
where
    F: FnMut(&str, &str) -> Result<(), Error>,
{
    fn visit(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self(key, value)
    }
}

/// A Mapped Diagnostic Context (MDC) that provides diagnostic key-values.
pub trait Diagnostic: fmt::Debug + Send + Sync + 'static {
    /// Visit the diagnostic key-value pairs.
    fn visit(&self, visitor: &mut dyn Visitor) -> Result<(), Error>;
}

impl<T: Diagnostic> From<T> for Box<dyn Diagnostic> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
