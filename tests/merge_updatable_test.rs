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

//! Derived Table Tests
//!
//! Merging derived tables into the enclosing query and updatability
//! through views

mod common;

use std::sync::Arc;

use common::*;
use stoolap_select::{
    DerivedTable, Expression, QueryConfig, QuerySpecification, RangeSource, Value,
};

/// `v = SELECT id, amt FROM sales WHERE amt > 5`
fn filtered_view() -> Arc<dyn RangeSource> {
    let mut inner = QuerySpecification::new();
    inner
        .from_source(sales())
        .add_column(Expression::col("id"))
        .add_column(Expression::col("amt"))
        .set_where(Expression::gt(Expression::col("amt"), Expression::lit(5)));
    Arc::new(DerivedTable::new("v", inner).expect("Failed to create view"))
}

fn over_view(config: QueryConfig) -> QuerySpecification {
    let mut q = QuerySpecification::new();
    q.set_config(config)
        .from_source(filtered_view())
        .add_column(Expression::col("amt"))
        .set_where(Expression::lt(Expression::col("id"), Expression::lit(3)));
    q
}

#[test]
fn test_merged_view() {
    init_logger();
    let mut q = over_view(QueryConfig::default());
    let result = run(&mut q);
    assert!(q.is_merged());
    assert!(q.is_updatable());
    assert_eq!(q.ranges()[0].source().name(), "sales");
    assert_eq!(q.ranges()[0].name(), "v");
    assert_eq!(q.base_table_column_map(), &[Some(2)]);
    assert_eq!(ints(&result, 0), vec![Some(10)]);
    assert_eq!(result.row_ids(), Some(&[0usize][..]));
}

#[test]
fn test_unmerged_view_gives_same_rows() {
    let mut q = over_view(QueryConfig::default().with_merge_derived_tables(false));
    let result = run(&mut q);
    assert!(!q.is_merged());
    assert!(!q.is_updatable());
    assert_eq!(q.ranges()[0].source().name(), "v");
    assert_eq!(ints(&result, 0), vec![Some(10)]);
    assert_eq!(result.row_ids(), None);
}

#[test]
fn test_grouped_view_is_not_mergeable() {
    let mut inner = QuerySpecification::new();
    inner
        .from_source(sales())
        .add_column(Expression::col("cat"))
        .add_select(Expression::sum(Expression::col("amt")), Some("total"))
        .add_group_by(Expression::col("cat"));
    let view = DerivedTable::new("totals", inner).expect("Failed to create view");
    assert!(!view.query().is_mergeable());

    let mut q = QuerySpecification::new();
    q.from_source(Arc::new(view))
        .add_column(Expression::col("cat"))
        .set_where(Expression::gt(Expression::col("total"), Expression::lit(10)));
    let result = run(&mut q);
    assert!(!q.is_merged());
    assert!(!q.is_updatable());
    assert_eq!(values(&result), vec![vec![Value::from("A")]]);
}

#[test]
fn test_view_with_explicit_names() {
    let mut inner = QuerySpecification::new();
    inner
        .from_source(sales())
        .add_column(Expression::col("id"))
        .add_column(Expression::col("cat"))
        .set_column_names(vec!["k".to_string(), "label".to_string()]);
    let view = DerivedTable::new("named", inner).expect("Failed to create view");
    assert_eq!(
        view.query().column_names(),
        vec!["k".to_string(), "label".to_string()]
    );

    let mut q = QuerySpecification::new();
    q.from_source(Arc::new(view))
        .add_column(Expression::col("label"))
        .set_where(Expression::equal(Expression::col("k"), Expression::lit(2)));
    let result = run(&mut q);
    assert!(q.is_merged());
    assert_eq!(values(&result), vec![vec![Value::from("B")]]);
    assert_eq!(result.column_names(), &["label".to_string()]);
}

#[test]
fn test_subquery_on_base_table_is_read_only() {
    let mut min_amt = QuerySpecification::new();
    min_amt
        .from_source(sales())
        .add_column(Expression::min(Expression::col("amt")));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("id"))
        .set_where(Expression::gt(
            Expression::col("amt"),
            Expression::scalar_subquery(min_amt),
        ));
    let result = run(&mut q);
    assert!(!q.is_updatable());
    assert!(!q.is_insertable());
    assert_eq!(ints(&result, 0), vec![Some(1), Some(3)]);
}

#[test]
fn test_duplicate_column_is_not_updatable() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("amt"))
        .add_column(Expression::col("amt"));
    q.resolve().expect("Failed to resolve");
    assert!(!q.is_updatable());
    assert_eq!(q.base_table_column_map(), &[None, None]);
}
