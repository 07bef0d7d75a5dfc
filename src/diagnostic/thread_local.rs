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

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::Diagnostic;
use crate::Error;
use crate::diagnostic::Visitor;

thread_local! {
    static CONTEXT: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// A diagnostic that stores key-value pairs in a thread-local map.
///
/// Entries are copied into every record logged from the same thread and end up as
/// `log/<key>` attributes on the forwarded event.
///
/// ## Example
///
/// ```rust
/// use logforth_append_riemann::diagnostic::ThreadLocalDiagnostic;
///
/// ThreadLocalDiagnostic::insert("request_id", "42");
/// ```
#[derive(Default, Debug, Clone, Copy)]
#[non_exhaustive]
pub struct ThreadLocalDiagnostic {}

impl ThreadLocalDiagnostic {
    /// Insert a key-value pair into the thread local diagnostic.
    pub fn insert<K, V>(key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        CONTEXT.with(|map| {
            map.borrow_mut().insert(key.into(), value.into());
        });
    }

    /// Remove a key-value pair from the thread local diagnostic.
    pub fn remove(key: &str) {
        CONTEXT.with(|map| {
            map.borrow_mut().remove(key);
        });
    }

    /// Remove every key-value pair of the current thread.
    pub fn clear() {
        CONTEXT.with(|map| map.borrow_mut().clear());
    }
}

impl Diagnostic for ThreadLocalDiagnostic {
    fn visit(&self, visitor: &mut dyn Visitor) -> Result<(), Error> {
        CONTEXT.with(|map| {
            let map = map.borrow();
            for (key, value) in map.iter() {
                visitor.visit(key, value)?;
            }
            Ok(())
        })
    }
}
