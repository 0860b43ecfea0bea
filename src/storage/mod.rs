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

//! Storage module
//!
//! This module contains the range sources a query can scan:
//! - Storage traits (RangeSource, Scanner)
//! - In-memory base tables
//! - Derived tables wrapping another query

pub mod derived;
pub mod memory;
pub mod traits;

pub use derived::DerivedTable;
pub use memory::{MemoryTable, ScanStats};
pub use traits::{RangeSource, Scanner, VecScanner};
