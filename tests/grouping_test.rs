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

//! Grouping Tests
//!
//! GROUP BY, HAVING, aggregate hoisting and grouped expression validation

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use stoolap_select::functions::{FunctionInfo, FunctionSignature};
use stoolap_select::{
    global_registry, AggregateKind, BinaryOp, DataType, Error, Expression, JoinType, MemoryTable,
    OrderItem, QuerySpecification, RangeVariable, Result, ScalarFunction, SchemaBuilder, Value,
};

static COUNTED_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Identity function counting its invocations
struct CountedIdentity;

impl ScalarFunction for CountedIdentity {
    fn name(&self) -> &str {
        "COUNTED_IDENTITY"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "COUNTED_IDENTITY",
            "Returns its argument and counts calls",
            FunctionSignature::new(1, 1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        Ok(args[0])
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(args[0].clone())
    }
}

fn sum_amt() -> Expression {
    Expression::sum(Expression::col("amt"))
}

#[test]
fn test_group_by_sums() {
    init_logger();
    let mut q = QuerySpecification::new();
    q.from_source(table_t())
        .add_column(Expression::col("cat"))
        .add_column(sum_amt())
        .add_group_by(Expression::col("cat"))
        .add_order_by(OrderItem::asc(Expression::col("cat")));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![
            vec![Value::from("A"), Value::from(30)],
            vec![Value::from("B"), Value::from(5)],
        ]
    );
    assert!(q.is_grouped() && q.is_aggregated());
    assert!(!q.is_updatable());
}

#[test]
fn test_shared_aggregate_evaluated_once_per_row() {
    global_registry().register(Arc::new(CountedIdentity));
    let counted_sum = || {
        Expression::sum(Expression::func(
            "counted_identity",
            vec![Expression::col("amt")],
        ))
    };

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("cat"))
        .add_column(counted_sum())
        .add_group_by(Expression::col("cat"))
        .set_having(Expression::gt(counted_sum(), Expression::lit(0)))
        .add_order_by(OrderItem::desc(counted_sum()));
    q.resolve().expect("Failed to resolve");
    assert_eq!(q.zones().len(stoolap_select::Zone::Aggregate), 1);

    COUNTED_CALLS.store(0, Ordering::SeqCst);
    let result = q
        .execute(&stoolap_select::ExecutionContext::new(), 0)
        .expect("Failed to execute");
    assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 3);
    assert_eq!(ints(&result, 1), vec![Some(30), Some(5)]);
}

#[test]
fn test_accepted_grouped_expressions() {
    // expression over a grouped column
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::binary(
            BinaryOp::Concat,
            Expression::col("cat"),
            Expression::lit("!"),
        ))
        .add_column(Expression::count_star())
        .add_group_by(Expression::col("cat"))
        .add_order_by(OrderItem::asc(Expression::lit(1)));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![
            vec![Value::from("A!"), Value::from(2)],
            vec![Value::from("B!"), Value::from(1)],
        ]
    );

    // function of a grouped column combined with an aggregate
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::plus(
            Expression::func("LENGTH", vec![Expression::col("cat")]),
            sum_amt(),
        ))
        .add_group_by(Expression::col("cat"))
        .add_order_by(OrderItem::asc(Expression::col("cat")));
    let result = run(&mut q);
    assert_eq!(ints(&result, 0), vec![Some(31), Some(6)]);

    // grouping by an expression
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::binary(
            BinaryOp::Div,
            Expression::col("amt"),
            Expression::lit(10),
        ))
        .add_column(Expression::count_star())
        .add_group_by(Expression::binary(
            BinaryOp::Div,
            Expression::col("amt"),
            Expression::lit(10),
        ))
        .add_order_by(OrderItem::asc(Expression::lit(1)));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![
            vec![Value::from(0), Value::from(1)],
            vec![Value::from(1), Value::from(1)],
            vec![Value::from(2), Value::from(1)],
        ]
    );
}

#[test]
fn test_rejected_grouped_expressions() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("cat"))
        .add_column(Expression::col("amt"))
        .add_group_by(Expression::col("cat"));
    assert!(matches!(q.resolve(), Err(Error::NotInGroupBy(_))));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("cat"))
        .add_group_by(Expression::col("cat"))
        .set_having(Expression::gt(Expression::col("amt"), Expression::lit(1)));
    assert!(matches!(q.resolve(), Err(Error::InvalidHaving(_))));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("cat"))
        .add_group_by(Expression::col("cat"))
        .add_order_by(OrderItem::asc(Expression::col("amt")));
    assert!(matches!(q.resolve(), Err(Error::InvalidOrderBy(_))));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::col("amt"))
        .add_column(Expression::count_star());
    assert!(matches!(q.resolve(), Err(Error::NotInGroupBy(_))));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .add_group_by(sum_amt());
    assert!(matches!(q.resolve(), Err(Error::AggregateInGroupBy(_))));

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::sum(sum_amt()));
    assert!(matches!(q.resolve(), Err(Error::MisplacedAggregate(_))));
}

#[test]
fn test_group_by_alias() {
    let upper = || Expression::func("UPPER", vec![Expression::col("cat")]);
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_select(upper(), Some("k"))
        .add_select(Expression::count_star(), Some("n"))
        .add_group_by(Expression::col("k"))
        .add_group_by(Expression::col("k"))
        .add_group_by(Expression::col("k"))
        .add_order_by(OrderItem::desc(Expression::col("k")));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![
            vec![Value::from("B"), Value::from(1)],
            vec![Value::from("A"), Value::from(2)],
        ]
    );

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_select(Expression::col("cat"), Some("x"))
        .add_select(Expression::col("amt"), Some("x"))
        .add_group_by(Expression::col("x"));
    assert!(matches!(q.resolve(), Err(Error::AmbiguousGroupByAlias(_))));
}

#[test]
fn test_having_without_group_by() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .set_having(Expression::gt(Expression::count_star(), Expression::lit(1)));
    let result = run(&mut q);
    assert_eq!(ints(&result, 0), vec![Some(3)]);

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::count_star())
        .set_having(Expression::gt(Expression::count_star(), Expression::lit(5)));
    let result = run(&mut q);
    assert_eq!(result.row_count(), 0);
}

#[test]
fn test_empty_input() {
    let schema = SchemaBuilder::new("empty")
        .add_nullable("v", DataType::Integer)
        .build();
    let empty = Arc::new(MemoryTable::new(schema));

    let mut q = QuerySpecification::new();
    q.from_source(empty.clone())
        .add_column(Expression::count(Expression::col("v")))
        .add_column(Expression::sum(Expression::col("v")));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![vec![Value::from(0), Value::null(DataType::Integer)]]
    );

    let mut q = QuerySpecification::new();
    q.from_source(empty)
        .add_column(Expression::col("v"))
        .add_column(Expression::count_star())
        .add_group_by(Expression::col("v"));
    let result = run(&mut q);
    assert!(result.is_empty());

    // non-aggregate columns of the implicit group are still computed
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::lit("x"))
        .add_column(Expression::count_star())
        .set_where(Expression::gt(Expression::col("id"), Expression::lit(100)));
    let result = run(&mut q);
    assert_eq!(values(&result), vec![vec![Value::from("x"), Value::from(0)]]);

    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::param(1))
        .add_column(Expression::count_star())
        .set_where(Expression::gt(Expression::col("id"), Expression::lit(100)));
    q.resolve().expect("Failed to resolve");
    let ctx = stoolap_select::ExecutionContext::with_params(vec![Value::from(7)]);
    let result = q.execute(&ctx, 0).expect("Failed to execute");
    assert_eq!(values(&result), vec![vec![Value::from(7), Value::from(0)]]);
}

#[test]
fn test_distinct_and_boolean_aggregates() {
    let mut q = QuerySpecification::new();
    q.from_source(sales())
        .add_column(Expression::aggregate_distinct(
            AggregateKind::Count,
            Expression::col("cat"),
        ))
        .add_column(Expression::aggregate(
            AggregateKind::Every,
            Expression::gt(Expression::col("amt"), Expression::lit(1)),
        ))
        .add_column(Expression::aggregate(
            AggregateKind::Some,
            Expression::gt(Expression::col("amt"), Expression::lit(15)),
        ))
        .add_column(Expression::avg(Expression::col("amt")));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![vec![
            Value::from(2),
            Value::from(true),
            Value::from(true),
            Value::from(35.0 / 3.0),
        ]]
    );
}

#[test]
fn test_functional_dependency_on_primary_key() {
    let mut q = QuerySpecification::new();
    q.add_range(RangeVariable::new(departments()).with_alias("d"))
        .add_range(RangeVariable::new(employees()).with_alias("e").join(
            JoinType::Left,
            Expression::equal(Expression::qcol("e", "dept_id"), Expression::qcol("d", "id")),
        ))
        .add_column(Expression::qcol("d", "id"))
        .add_column(Expression::qcol("d", "name"))
        .add_column(Expression::count(Expression::qcol("e", "id")))
        .add_group_by(Expression::qcol("d", "id"))
        .add_order_by(OrderItem::asc(Expression::qcol("d", "id")));
    let result = run(&mut q);
    assert_eq!(
        values(&result),
        vec![
            vec![Value::from(1), Value::from("Sales"), Value::from(2)],
            vec![Value::from(2), Value::from("Ops"), Value::from(1)],
            vec![Value::from(3), Value::from("Legal"), Value::from(0)],
        ]
    );
}
