// Copyright 2025 Stoolap Contributors
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

//! Query compilation and execution configuration

/// Default number of join steps between cancellation polls
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 1024;

/// Configuration options for resolving and executing a query specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Fail resolution when a visible column has no inferable type instead
    /// of defaulting it to TEXT
    /// Default: false
    pub strict_typing: bool,

    /// Flatten a query over a mergeable derived table into its base query
    /// Default: true
    pub merge_derived_tables: bool,

    /// Answer `SELECT COUNT(*) FROM t` from the source's cached row count
    /// Default: true
    pub count_star_fast_path: bool,

    /// Evaluate a lone MIN/MAX as ORDER BY ... LIMIT 1
    /// Default: true
    pub min_max_fast_path: bool,

    /// Skip DISTINCT deduplication when a unique index covers the select list
    /// Default: true
    pub distinct_via_index: bool,

    /// Join iterations between cancellation flag polls
    /// Default: 1024
    pub cancel_check_interval: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            strict_typing: false,
            merge_derived_tables: true,
            count_star_fast_path: true,
            min_max_fast_path: true,
            distinct_via_index: true,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl QueryConfig {
    /// Config with every optional optimization disabled
    pub fn without_optimizations() -> Self {
        Self {
            merge_derived_tables: false,
            count_star_fast_path: false,
            min_max_fast_path: false,
            distinct_via_index: false,
            ..Self::default()
        }
    }

    /// Set strict typing
    pub fn with_strict_typing(mut self, strict: bool) -> Self {
        self.strict_typing = strict;
        self
    }

    /// Enable or disable derived table merging
    pub fn with_merge_derived_tables(mut self, enabled: bool) -> Self {
        self.merge_derived_tables = enabled;
        self
    }

    /// Enable or disable the COUNT(*) fast path
    pub fn with_count_star_fast_path(mut self, enabled: bool) -> Self {
        self.count_star_fast_path = enabled;
        self
    }

    /// Enable or disable the MIN/MAX rewrite
    pub fn with_min_max_fast_path(mut self, enabled: bool) -> Self {
        self.min_max_fast_path = enabled;
        self
    }

    /// Enable or disable DISTINCT via unique index
    pub fn with_distinct_via_index(mut self, enabled: bool) -> Self {
        self.distinct_via_index = enabled;
        self
    }

    /// Set the cancellation poll interval (clamped to at least 1)
    pub fn with_cancel_check_interval(mut self, interval: usize) -> Self {
        self.cancel_check_interval = interval.max(1);
        self
    }
}
