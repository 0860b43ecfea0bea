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

//! Expression trees for query specifications
//!
//! An [`Expression`] is built unresolved (column references carry only
//! names), bound to range variables during reference resolution, typed
//! during the type passes and finally evaluated per candidate row.
//!
//! After aggregate hoisting, every aggregate outside the aggregate zone is
//! replaced by an [`Expression::SimpleColumn`] pointing at its slot.

pub mod display;
pub mod eval;
pub mod typing;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{DataType, Error, Operator, Result, Value};
use crate::executor::QuerySpecification;
use crate::functions::{AggregateKind, ScalarFunction};

pub use eval::RowContext;

/// Where a resolved column reference points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Number of enclosing queries to walk out (0 = this query)
    pub depth: usize,
    /// Range variable index within that query
    pub range: usize,
    /// Column index within the range source
    pub column: usize,
    /// Declared type of the source column
    pub data_type: DataType,
    /// Declared nullability of the source column
    pub nullable: bool,
}

/// A (possibly qualified) column reference
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
    pub binding: Option<ColumnBinding>,
}

impl ColumnRef {
    /// Create an unresolved reference
    pub fn new(qualifier: Option<&str>, name: &str) -> Self {
        Self {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
            binding: None,
        }
    }

    /// True once bound to a range variable
    pub fn is_resolved(&self) -> bool {
        self.binding.is_some()
    }

    /// True if bound to a range of an enclosing query
    pub fn is_outer(&self) -> bool {
        matches!(self.binding, Some(b) if b.depth > 0)
    }
}

impl PartialEq for ColumnRef {
    fn eq(&self, other: &Self) -> bool {
        match (&self.binding, &other.binding) {
            (Some(a), Some(b)) => a.depth == b.depth && a.range == b.range && a.column == b.column,
            _ => {
                self.name.eq_ignore_ascii_case(&other.name)
                    && match (&self.qualifier, &other.qualifier) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        (None, None) => true,
                        _ => false,
                    }
            }
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    And,
    Or,
    Compare(Operator),
}

impl BinaryOp {
    /// True for the arithmetic operators
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    /// True for AND and OR
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Concat => write!(f, "||"),
            BinaryOp::And => write!(f, "AND"),
            BinaryOp::Or => write!(f, "OR"),
            BinaryOp::Compare(op) => write!(f, "{}", op),
        }
    }
}

/// A scalar function call
///
/// `func` is bound from the function registry during reference resolution.
#[derive(Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub func: Option<Arc<dyn ScalarFunction>>,
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.args == other.args
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("bound", &self.func.is_some())
            .finish()
    }
}

static NEXT_SUBQUERY_ID: AtomicUsize = AtomicUsize::new(1);

/// A nested query used as an expression
///
/// Clones share the id, so a hoisted copy still equals its original.
#[derive(Debug, Clone)]
pub struct Subquery {
    pub id: usize,
    pub query: Box<QuerySpecification>,
}

impl Subquery {
    pub fn new(query: QuerySpecification) -> Self {
        Self {
            id: NEXT_SUBQUERY_ID.fetch_add(1, Ordering::Relaxed),
            query: Box::new(query),
        }
    }
}

impl PartialEq for Subquery {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant value
    Literal(Value),
    /// Positional parameter, 1-based
    Parameter(usize),
    /// Column of a range variable
    Column(ColumnRef),
    /// Position in the current row buffer (aggregate slot or visible column)
    SimpleColumn(usize),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    IsNull {
        operand: Box<Expression>,
        negated: bool,
    },
    InList {
        operand: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    Function(FunctionCall),
    /// Set function; `arg` is `None` for COUNT(*)
    Aggregate {
        kind: AggregateKind,
        arg: Option<Box<Expression>>,
        distinct: bool,
    },
    /// Row value constructor, only legal as a comparison operand
    Row(Vec<Expression>),
    Array(Vec<Expression>),
    ScalarSubquery(Subquery),
    Exists(Subquery),
}

impl Expression {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn lit(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn null() -> Self {
        Expression::Literal(Value::null_unknown())
    }

    pub fn param(index: usize) -> Self {
        Expression::Parameter(index)
    }

    /// Unqualified column reference
    pub fn col(name: &str) -> Self {
        Expression::Column(ColumnRef::new(None, name))
    }

    /// Qualified column reference
    pub fn qcol(qualifier: &str, name: &str) -> Self {
        Expression::Column(ColumnRef::new(Some(qualifier), name))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: Operator, left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Compare(op), left, right)
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::compare(Operator::Eq, left, right)
    }

    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::compare(Operator::Gt, left, right)
    }

    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::compare(Operator::Lt, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    pub fn plus(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn times(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn negate(operand: Expression) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    pub fn is_null(operand: Expression, negated: bool) -> Self {
        Expression::IsNull {
            operand: Box::new(operand),
            negated,
        }
    }

    pub fn in_list(operand: Expression, list: Vec<Expression>, negated: bool) -> Self {
        Expression::InList {
            operand: Box::new(operand),
            list,
            negated,
        }
    }

    /// Scalar function call, bound to the registry at resolution
    pub fn func(name: &str, args: Vec<Expression>) -> Self {
        Expression::Function(FunctionCall {
            name: name.to_string(),
            args,
            func: None,
        })
    }

    pub fn aggregate(kind: AggregateKind, arg: Expression) -> Self {
        Expression::Aggregate {
            kind,
            arg: Some(Box::new(arg)),
            distinct: false,
        }
    }

    pub fn aggregate_distinct(kind: AggregateKind, arg: Expression) -> Self {
        Expression::Aggregate {
            kind,
            arg: Some(Box::new(arg)),
            distinct: true,
        }
    }

    pub fn count_star() -> Self {
        Expression::Aggregate {
            kind: AggregateKind::Count,
            arg: None,
            distinct: false,
        }
    }

    pub fn count(arg: Expression) -> Self {
        Self::aggregate(AggregateKind::Count, arg)
    }

    pub fn sum(arg: Expression) -> Self {
        Self::aggregate(AggregateKind::Sum, arg)
    }

    pub fn avg(arg: Expression) -> Self {
        Self::aggregate(AggregateKind::Avg, arg)
    }

    pub fn min(arg: Expression) -> Self {
        Self::aggregate(AggregateKind::Min, arg)
    }

    pub fn max(arg: Expression) -> Self {
        Self::aggregate(AggregateKind::Max, arg)
    }

    pub fn row(items: Vec<Expression>) -> Self {
        Expression::Row(items)
    }

    pub fn array(items: Vec<Expression>) -> Self {
        Expression::Array(items)
    }

    /// Scalar subquery; the query is resolved as part of the enclosing one
    pub fn scalar_subquery(query: QuerySpecification) -> Self {
        Expression::ScalarSubquery(Subquery::new(query))
    }

    pub fn exists(query: QuerySpecification) -> Self {
        Expression::Exists(Subquery::new(query))
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Direct children, not descending into subqueries
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_)
            | Expression::Parameter(_)
            | Expression::Column(_)
            | Expression::SimpleColumn(_)
            | Expression::ScalarSubquery(_)
            | Expression::Exists(_) => Vec::new(),
            Expression::Unary { operand, .. } | Expression::IsNull { operand, .. } => {
                vec![operand.as_ref()]
            }
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::InList { operand, list, .. } => {
                let mut out = vec![operand.as_ref()];
                out.extend(list.iter());
                out
            }
            Expression::Function(call) => call.args.iter().collect(),
            Expression::Aggregate { arg, .. } => arg.iter().map(|a| a.as_ref()).collect(),
            Expression::Row(items) | Expression::Array(items) => items.iter().collect(),
        }
    }

    /// Mutable direct children, not descending into subqueries
    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Literal(_)
            | Expression::Parameter(_)
            | Expression::Column(_)
            | Expression::SimpleColumn(_)
            | Expression::ScalarSubquery(_)
            | Expression::Exists(_) => Vec::new(),
            Expression::Unary { operand, .. } | Expression::IsNull { operand, .. } => {
                vec![operand.as_mut()]
            }
            Expression::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Expression::InList { operand, list, .. } => {
                let mut out = vec![operand.as_mut()];
                out.extend(list.iter_mut());
                out
            }
            Expression::Function(call) => call.args.iter_mut().collect(),
            Expression::Aggregate { arg, .. } => arg.iter_mut().map(|a| a.as_mut()).collect(),
            Expression::Row(items) | Expression::Array(items) => items.iter_mut().collect(),
        }
    }

    /// Pre-order walk, not descending into subqueries
    pub fn for_each(&self, f: &mut dyn FnMut(&Expression)) {
        f(self);
        for child in self.children() {
            child.for_each(f);
        }
    }

    /// Returns a copy with every node for which `f` returns a replacement
    /// substituted; replaced nodes are not visited further
    pub fn rewrite(&self, f: &mut dyn FnMut(&Expression) -> Option<Expression>) -> Expression {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        let mut out = self.clone();
        for child in out.children_mut() {
            let rewritten = child.rewrite(f);
            *child = rewritten;
        }
        out
    }

    /// True if an aggregate occurs outside nested subqueries
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.for_each(&mut |e| {
            if matches!(e, Expression::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// True if the tree contains a scalar or EXISTS subquery
    pub fn contains_subquery(&self) -> bool {
        let mut found = false;
        self.for_each(&mut |e| {
            if e.is_subquery() {
                found = true;
            }
        });
        found
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, Expression::ScalarSubquery(_) | Expression::Exists(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate { .. })
    }

    /// Nested subqueries directly reachable from this tree
    pub fn subqueries(&self) -> Vec<&Subquery> {
        let mut out = Vec::new();
        collect_subqueries(self, &mut out);
        out
    }

    /// Column references outside nested subqueries
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        collect_columns(self, &mut out);
        out
    }

    /// Appends each distinct aggregate to `out`, in first-seen order
    ///
    /// Fails if an aggregate argument itself contains an aggregate.
    pub fn collect_aggregates(&self, out: &mut Vec<Expression>) -> Result<()> {
        match self {
            Expression::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    if arg.contains_aggregate() {
                        return Err(Error::MisplacedAggregate(self.to_string()));
                    }
                }
                if !out.contains(self) {
                    out.push(self.clone());
                }
                Ok(())
            }
            _ => {
                for child in self.children() {
                    child.collect_aggregates(out)?;
                }
                Ok(())
            }
        }
    }

    /// True if this tree can be computed from `targets`
    ///
    /// Constants, parameters, row buffer positions and outer references
    /// always qualify. Aggregates and subqueries qualify only when
    /// `accept_aggregates` is set.
    pub fn is_composed_of(&self, targets: &[Expression], accept_aggregates: bool) -> bool {
        if targets.contains(self) {
            return true;
        }
        match self {
            Expression::Literal(_) | Expression::Parameter(_) | Expression::SimpleColumn(_) => true,
            Expression::Column(c) => c.is_outer(),
            Expression::Aggregate { .. } | Expression::ScalarSubquery(_) | Expression::Exists(_) => {
                accept_aggregates
            }
            _ => self
                .children()
                .into_iter()
                .all(|c| c.is_composed_of(targets, accept_aggregates)),
        }
    }

    /// True for predicate forms, which are boolean by construction
    pub fn is_predicate(&self) -> bool {
        match self {
            Expression::Binary { op, .. } => op.is_logical() || matches!(op, BinaryOp::Compare(_)),
            Expression::Unary { op, .. } => *op == UnaryOp::Not,
            Expression::IsNull { .. } | Expression::InList { .. } | Expression::Exists(_) => true,
            _ => false,
        }
    }

    /// True if the expression is a constant literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// The referenced column, for a plain column expression
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Expression::Column(c) => Some(c),
            _ => None,
        }
    }
}

fn collect_subqueries<'a>(expr: &'a Expression, out: &mut Vec<&'a Subquery>) {
    match expr {
        Expression::ScalarSubquery(sq) | Expression::Exists(sq) => out.push(sq),
        _ => {
            for child in expr.children() {
                collect_subqueries(child, out);
            }
        }
    }
}

fn collect_columns<'a>(expr: &'a Expression, out: &mut Vec<&'a ColumnRef>) {
    if let Expression::Column(c) = expr {
        out.push(c);
    }
    for child in expr.children() {
        collect_columns(child, out);
    }
}

/// ANDs two optional predicates together
pub fn and_conditions(a: Option<Expression>, b: Option<Expression>) -> Option<Expression> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Expression::and(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}
