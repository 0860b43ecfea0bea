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

//! Fast Path Tests
//!
//! COUNT(*) from the row count, the MIN/MAX rewrite and DISTINCT via a
//! unique index

mod common;

use common::*;
use stoolap_select::{
    DataType, Expression, MemoryTable, QueryConfig, QuerySpecification, SchemaBuilder, Value,
};
use std::sync::Arc;

#[test]
fn test_count_star_reads_row_count() {
    init_logger();
    let table = table_t();
    let mut q = QuerySpecification::new();
    q.from_source(table.clone()).add_column(Expression::count_star());
    let result = run(&mut q);
    assert!(q.uses_count_fast_path());
    assert_eq!(ints(&result, 0), vec![Some(3)]);
    assert_eq!(table.scan_stats().next_calls(), 0);
    assert_eq!(table.scan_stats().count_lookups(), 1);
}

#[test]
fn test_count_star_without_optimizations() {
    let table = sales();
    let mut q = QuerySpecification::new();
    q.set_config(QueryConfig::without_optimizations())
        .from_source(table.clone())
        .add_column(Expression::count_star());
    let result = run(&mut q);
    assert!(!q.uses_count_fast_path());
    assert_eq!(ints(&result, 0), vec![Some(3)]);
    assert!(table.scan_stats().next_calls() > 0);
    assert_eq!(table.scan_stats().count_lookups(), 0);
}

#[test]
fn test_count_star_needs_plain_shape() {
    // a WHERE clause forces the scan
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .set_where(Expression::gt(Expression::col("amt"), Expression::lit(5)));
    let result = run(&mut q);
    assert!(!q.uses_count_fast_path());
    assert_eq!(ints(&result, 0), vec![Some(2)]);

    // so does COUNT of a column
    let mut q = QuerySpecification::new();
    q.from_source(ids("t", &[Some(1), None]))
        .add_column(Expression::count(Expression::col("id")));
    let result = run(&mut q);
    assert!(!q.uses_count_fast_path());
    assert_eq!(ints(&result, 0), vec![Some(1)]);

    // and an expression around the aggregate
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::plus(Expression::count_star(), Expression::lit(1)));
    let result = run(&mut q);
    assert!(!q.uses_count_fast_path());
    assert_eq!(ints(&result, 0), vec![Some(4)]);
}

#[test]
fn test_count_star_with_limits() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .set_limit(Expression::lit(0));
    assert!(run(&mut q).is_empty());

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .set_offset(Expression::lit(1));
    assert!(run(&mut q).is_empty());
}

#[test]
fn test_min_max_rewrite() {
    let table = ids("t", &[Some(2), None, Some(7), Some(1)]);

    let mut q = QuerySpecification::new();
    q.from_source(table.clone())
        .add_column(Expression::max(Expression::col("id")));
    let result = run(&mut q);
    assert!(q.uses_min_max_rewrite());
    assert_eq!(ints(&result, 0), vec![Some(7)]);

    let mut q = QuerySpecification::new();
    q.from_source(table)
        .add_column(Expression::min(Expression::col("id")));
    let result = run(&mut q);
    assert!(q.uses_min_max_rewrite());
    assert_eq!(ints(&result, 0), vec![Some(1)]);
    assert_eq!(result.column_types(), &[DataType::Integer]);
}

#[test]
fn test_min_max_rewrite_keeps_where() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::min(Expression::col("amt")))
        .set_where(Expression::equal(Expression::col("cat"), Expression::lit("A")));
    let result = run(&mut q);
    assert!(q.uses_min_max_rewrite());
    assert_eq!(ints(&result, 0), vec![Some(10)]);
}

#[test]
fn test_min_max_over_no_values() {
    let mut q = QuerySpecification::new();
    q.from_source(ids("t", &[None, None]))
        .add_column(Expression::max(Expression::col("id")));
    let result = run(&mut q);
    assert_eq!(result.row_count(), 1);
    assert!(result.rows()[0][0].is_null());

    let schema = SchemaBuilder::new("empty")
        .add_nullable("v", DataType::Integer)
        .build();
    let mut q = QuerySpecification::new();
    q.from_source(Arc::new(MemoryTable::new(schema)))
        .add_column(Expression::min(Expression::col("v")));
    let result = run(&mut q);
    assert_eq!(result.row_count(), 1);
    assert!(result.rows()[0][0].is_null());
}

#[test]
fn test_empty_min_max_null_is_typed() {
    for rewrite in [true, false] {
        let schema = SchemaBuilder::new("names")
            .add_nullable("name", DataType::Text)
            .build();
        let mut q = QuerySpecification::new();
        q.set_config(QueryConfig::default().with_min_max_fast_path(rewrite))
            .from_source(Arc::new(MemoryTable::new(schema)))
            .add_column(Expression::max(Expression::col("name")));
        let result = run(&mut q);
        assert_eq!(q.uses_min_max_rewrite(), rewrite);
        assert_eq!(result.rows()[0][0], Value::null(DataType::Text));
        assert_eq!(result.rows()[0][0].data_type(), DataType::Text);
    }
}

#[test]
fn test_min_max_disabled_gives_same_answer() {
    let mut q = QuerySpecification::new();
    q.set_config(QueryConfig::default().with_min_max_fast_path(false))
        .from_source(ids("t", &[Some(2), None, Some(7)]))
        .add_column(Expression::max(Expression::col("id")));
    let result = run(&mut q);
    assert!(!q.uses_min_max_rewrite());
    assert_eq!(values(&result), vec![vec![Value::from(7)]]);
}

#[test]
fn test_distinct_via_unique_index() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("id"))
        .set_distinct(true);
    let result = run(&mut q);
    assert!(q.uses_distinct_index());
    assert_eq!(ints(&result, 0), vec![Some(1), Some(2), Some(3)]);

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("cat"))
        .set_distinct(true);
    let result = run(&mut q);
    assert!(!q.uses_distinct_index());
    assert_eq!(result.row_count(), 2);
}
