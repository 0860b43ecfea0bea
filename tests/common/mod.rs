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

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use stoolap_select::{
    row, DataType, ExecutionContext, MaterializedResult, MemoryTable, QuerySpecification, Row,
    SchemaBuilder, Value,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `sales(id INTEGER PRIMARY KEY, cat TEXT, amt INTEGER)` with three rows
pub fn sales() -> Arc<MemoryTable> {
    let schema = SchemaBuilder::new("sales")
        .add_primary_key("id", DataType::Integer)
        .add_nullable("cat", DataType::Text)
        .add_nullable("amt", DataType::Integer)
        .build();
    Arc::new(
        MemoryTable::with_rows(
            schema,
            vec![row![1, "A", 10], row![2, "B", 5], row![3, "A", 20]],
        )
        .expect("Failed to load sales"),
    )
}

/// `T(id INTEGER, cat TEXT, amt INTEGER)` holding
/// `(1,'A',10), (2,'A',20), (3,'B',5)`
pub fn table_t() -> Arc<MemoryTable> {
    let schema = SchemaBuilder::new("T")
        .add_nullable("id", DataType::Integer)
        .add_nullable("cat", DataType::Text)
        .add_nullable("amt", DataType::Integer)
        .build();
    Arc::new(
        MemoryTable::with_rows(
            schema,
            vec![row![1, "A", 10], row![2, "A", 20], row![3, "B", 5]],
        )
        .expect("Failed to load T"),
    )
}

/// Single nullable INTEGER column `id` holding `ids`; `None` is NULL
pub fn ids(name: &str, ids: &[Option<i64>]) -> Arc<MemoryTable> {
    let schema = SchemaBuilder::new(name)
        .add_nullable("id", DataType::Integer)
        .build();
    let rows = ids
        .iter()
        .map(|id| Row::from_values(vec![Value::from(*id)]));
    Arc::new(MemoryTable::with_rows(schema, rows).expect("Failed to load table"))
}

/// `dept(id INTEGER PRIMARY KEY, name TEXT NOT NULL)`
pub fn departments() -> Arc<MemoryTable> {
    let schema = SchemaBuilder::new("dept")
        .add_primary_key("id", DataType::Integer)
        .add("name", DataType::Text)
        .build();
    Arc::new(
        MemoryTable::with_rows(
            schema,
            vec![row![1, "Sales"], row![2, "Ops"], row![3, "Legal"]],
        )
        .expect("Failed to load dept"),
    )
}

/// `emp(id INTEGER PRIMARY KEY, name TEXT NOT NULL, dept_id INTEGER, salary INTEGER)`
pub fn employees() -> Arc<MemoryTable> {
    let schema = SchemaBuilder::new("emp")
        .add_primary_key("id", DataType::Integer)
        .add("name", DataType::Text)
        .add_nullable("dept_id", DataType::Integer)
        .add_nullable("salary", DataType::Integer)
        .build();
    Arc::new(
        MemoryTable::with_rows(
            schema,
            vec![
                row![1, "ann", 1, 100],
                row![2, "bob", 1, 80],
                row![3, "cid", 2, 120],
                Row::from_values(vec![
                    Value::from(4),
                    Value::from("dee"),
                    Value::null(DataType::Integer),
                    Value::from(50),
                ]),
            ],
        )
        .expect("Failed to load emp"),
    )
}

/// Resolves and executes without a row cap
pub fn run(query: &mut QuerySpecification) -> MaterializedResult {
    query.resolve().expect("Failed to resolve query");
    query
        .execute(&ExecutionContext::new(), 0)
        .expect("Failed to execute query")
}

/// Result rows as plain value vectors
pub fn values(result: &MaterializedResult) -> Vec<Vec<Value>> {
    result
        .rows()
        .iter()
        .map(|r| r.as_slice().to_vec())
        .collect()
}

/// Single INTEGER column of a result, NULL as `None`
pub fn ints(result: &MaterializedResult, column: usize) -> Vec<Option<i64>> {
    result.rows().iter().map(|r| r[column].as_int64()).collect()
}
