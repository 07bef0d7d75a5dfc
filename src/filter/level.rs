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

use crate::filter::Filter;
use crate::filter::FilterResult;
use crate::record::Level;

/// A filter that rejects records less severe than the specified level.
///
/// From least to most severe, the levels are:
///
/// - `Trace`
/// - `Debug`
/// - `Info`
/// - `Warn`
/// - `Error`
///
/// If the minimum level is `Warn`, it will allow `Warn` and `Error` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimumLevel(Level);

impl MinimumLevel {
    /// Create a filter with the given threshold.
    pub fn new(level: Level) -> Self {
        MinimumLevel(level)
    }

    /// The configured threshold.
    pub fn level(&self) -> Level {
        self.0
    }

    /// Whether `level` is greater than or equal to the threshold.
    pub fn is_minimum_level(&self, level: Level) -> bool {
        level.is_greater_or_equal(self.0)
    }
}

impl From<Level> for MinimumLevel {
    fn from(level: Level) -> Self {
        MinimumLevel(level)
    }
}

impl Filter for MinimumLevel {
    fn enabled(&self, level: Level, _: &str) -> FilterResult {
        if self.is_minimum_level(level) {
            FilterResult::Neutral
        } else {
            FilterResult::Reject
        }
    }
}
