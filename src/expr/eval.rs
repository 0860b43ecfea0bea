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

//! Per-row evaluation of resolved expressions

use std::cmp::Ordering;

use super::{BinaryOp, Expression, UnaryOp};
use crate::core::{DataType, Error, Operator, Result, Row, Value};
use crate::executor::ExecutionContext;
use crate::functions::scalar::value_to_string;
use crate::functions::AggregateKind;

/// The rows an expression is evaluated against
///
/// `ranges` holds the current row of each range variable, `slots` the row
/// buffer that `SimpleColumn` nodes index. Correlated references walk out
/// through `outer`, one level per unit of binding depth.
#[derive(Clone, Copy)]
pub struct RowContext<'a> {
    pub ranges: &'a [Row],
    pub slots: &'a [Value],
    pub outer: Option<&'a RowContext<'a>>,
    pub exec: &'a ExecutionContext,
}

impl<'a> RowContext<'a> {
    /// Context over range rows only
    pub fn new(exec: &'a ExecutionContext, ranges: &'a [Row]) -> Self {
        Self {
            ranges,
            slots: &[],
            outer: None,
            exec,
        }
    }

    /// Same ranges, with `slots` as the row buffer
    pub fn with_slots(self, slots: &'a [Value]) -> Self {
        Self { slots, ..self }
    }

    /// Same ranges, nested inside `outer`
    pub fn with_outer(self, outer: Option<&'a RowContext<'a>>) -> Self {
        Self { outer, ..self }
    }

    fn level(&self, depth: usize) -> Result<&RowContext<'a>> {
        let mut ctx = self;
        for _ in 0..depth {
            ctx = ctx
                .outer
                .ok_or_else(|| Error::internal("correlated reference without outer row"))?;
        }
        Ok(ctx)
    }
}

impl Expression {
    /// Evaluates the expression against one candidate row
    pub fn evaluate(&self, ctx: &RowContext<'_>) -> Result<Value> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Parameter(i) => ctx
                .exec
                .get_param(*i)
                .cloned()
                .ok_or(Error::MissingParameter(*i)),
            Expression::Column(c) => {
                let b = c.binding.ok_or(Error::NotResolved("column reference"))?;
                ctx.level(b.depth)?
                    .ranges
                    .get(b.range)
                    .and_then(|row| row.get(b.column))
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("column {} out of range", self)))
            }
            Expression::SimpleColumn(i) => ctx
                .slots
                .get(*i)
                .cloned()
                .ok_or_else(|| Error::internal(format!("no row buffer slot {}", i))),
            Expression::Unary { op, operand } => {
                let v = operand.evaluate(ctx)?;
                match (op, v) {
                    (UnaryOp::Neg, Value::Null(t)) => Ok(Value::Null(t)),
                    (UnaryOp::Neg, Value::Integer(i)) => {
                        i.checked_neg().map(Value::Integer).ok_or(Error::NumericOverflow)
                    }
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Not, Value::Null(_)) => Ok(Value::null(DataType::Boolean)),
                    (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                    (_, v) => Err(Error::type_mismatch(self.to_string(), v.data_type().to_string())),
                }
            }
            Expression::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => logical(*op, left, right, ctx),
                BinaryOp::Compare(cmp) => compare(*cmp, left, right, ctx),
                BinaryOp::Concat => {
                    let l = left.evaluate(ctx)?;
                    let r = right.evaluate(ctx)?;
                    if l.is_null() || r.is_null() {
                        return Ok(Value::null(DataType::Text));
                    }
                    Ok(Value::text(value_to_string(&l) + &value_to_string(&r)))
                }
                _ => arithmetic(*op, &left.evaluate(ctx)?, &right.evaluate(ctx)?),
            },
            Expression::IsNull { operand, negated } => {
                let v = operand.evaluate(ctx)?;
                Ok(Value::Boolean(v.is_null() != *negated))
            }
            Expression::InList {
                operand,
                list,
                negated,
            } => {
                let v = operand.evaluate(ctx)?;
                if v.is_null() {
                    return Ok(Value::null(DataType::Boolean));
                }
                let mut saw_null = false;
                for item in list {
                    let candidate = item.evaluate(ctx)?;
                    if candidate.is_null() {
                        saw_null = true;
                    } else if v.compare(&candidate)? == Ordering::Equal {
                        return Ok(Value::Boolean(!negated));
                    }
                }
                if saw_null {
                    Ok(Value::null(DataType::Boolean))
                } else {
                    Ok(Value::Boolean(*negated))
                }
            }
            Expression::Function(call) => {
                let func = call
                    .func
                    .as_ref()
                    .ok_or_else(|| Error::FunctionNotFound(call.name.clone()))?;
                let args = call
                    .args
                    .iter()
                    .map(|a| a.evaluate(ctx))
                    .collect::<Result<Vec<_>>>()?;
                func.evaluate(&args)
            }
            Expression::Aggregate { .. } => Err(Error::internal(format!(
                "aggregate {} evaluated outside of a group",
                self
            ))),
            Expression::Row(_) => Err(Error::RowValuedColumn(self.to_string())),
            Expression::Array(items) => {
                let values = items
                    .iter()
                    .map(|i| i.evaluate(ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expression::ScalarSubquery(sq) => {
                let result = sq.query.execute_nested(ctx, 2)?;
                let mut rows = result.into_rows();
                match rows.len() {
                    0 => Ok(Value::null(
                        sq.query.column_types().first().copied().unwrap_or_default(),
                    )),
                    1 => Ok(rows
                        .pop()
                        .and_then(|row| row.into_values().into_iter().next())
                        .unwrap_or_else(Value::null_unknown)),
                    _ => Err(Error::SubqueryCardinality),
                }
            }
            Expression::Exists(sq) => {
                let result = sq.query.execute_nested(ctx, 1)?;
                Ok(Value::Boolean(result.row_count() > 0))
            }
        }
    }

    /// True only if the expression evaluates to TRUE
    pub fn evaluate_predicate(&self, ctx: &RowContext<'_>) -> Result<bool> {
        Ok(self.evaluate(ctx)?.is_true())
    }

    /// Whether the expression can produce NULL
    ///
    /// `forced` marks ranges on the null-extended side of an outer join and
    /// `slots` the nullability of row buffer positions.
    pub fn is_nullable(&self, forced: &[bool], slots: &[bool]) -> bool {
        match self {
            Expression::Literal(v) => v.is_null(),
            Expression::Parameter(_) => true,
            Expression::Column(c) => match c.binding {
                Some(b) if b.depth == 0 => {
                    b.nullable || forced.get(b.range).copied().unwrap_or(false)
                }
                Some(b) => b.nullable,
                None => true,
            },
            Expression::SimpleColumn(i) => slots.get(*i).copied().unwrap_or(true),
            Expression::IsNull { .. } | Expression::Exists(_) | Expression::Array(_) => false,
            Expression::Aggregate { kind, .. } => *kind != AggregateKind::Count,
            Expression::ScalarSubquery(_) => true,
            Expression::Function(call) if call.name.eq_ignore_ascii_case("COALESCE") => call
                .args
                .iter()
                .all(|a| a.is_nullable(forced, slots)),
            _ => self
                .children()
                .into_iter()
                .any(|c| c.is_nullable(forced, slots)),
        }
    }
}

fn logical(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    ctx: &RowContext<'_>,
) -> Result<Value> {
    let short = op == BinaryOp::Or;
    let l = left.evaluate(ctx)?;
    if l.as_boolean() == Some(short) {
        return Ok(Value::Boolean(short));
    }
    let r = right.evaluate(ctx)?;
    if r.as_boolean() == Some(short) {
        return Ok(Value::Boolean(short));
    }
    for v in [&l, &r] {
        if !v.is_null() && v.as_boolean().is_none() {
            return Err(Error::NonBooleanPredicate(v.to_string()));
        }
    }
    if l.is_null() || r.is_null() {
        Ok(Value::null(DataType::Boolean))
    } else {
        Ok(Value::Boolean(!short))
    }
}

fn compare(
    op: Operator,
    left: &Expression,
    right: &Expression,
    ctx: &RowContext<'_>,
) -> Result<Value> {
    let (l, r) = match (left, right) {
        (Expression::Row(l), Expression::Row(r)) => {
            let l = l.iter().map(|e| e.evaluate(ctx)).collect::<Result<Vec<_>>>()?;
            let r = r.iter().map(|e| e.evaluate(ctx)).collect::<Result<Vec<_>>>()?;
            return compare_rows(op, &l, &r);
        }
        _ => (left.evaluate(ctx)?, right.evaluate(ctx)?),
    };
    if l.is_null() || r.is_null() {
        return Ok(Value::null(DataType::Boolean));
    }
    Ok(Value::Boolean(op.matches(l.compare(&r)?)))
}

fn compare_rows(op: Operator, left: &[Value], right: &[Value]) -> Result<Value> {
    match op {
        Operator::Eq | Operator::Ne => {
            let mut saw_null = false;
            for (l, r) in left.iter().zip(right) {
                if l.is_null() || r.is_null() {
                    saw_null = true;
                } else if l.compare(r)? != Ordering::Equal {
                    return Ok(Value::Boolean(op == Operator::Ne));
                }
            }
            if saw_null {
                Ok(Value::null(DataType::Boolean))
            } else {
                Ok(Value::Boolean(op == Operator::Eq))
            }
        }
        _ => {
            for (l, r) in left.iter().zip(right) {
                if l.is_null() || r.is_null() {
                    return Ok(Value::null(DataType::Boolean));
                }
                let ord = l.compare(r)?;
                if ord != Ordering::Equal {
                    return Ok(Value::Boolean(op.matches(ord)));
                }
            }
            Ok(Value::Boolean(op.matches(Ordering::Equal)))
        }
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        let t = l.data_type().aggregate_type(r.data_type()).unwrap_or_default();
        return Ok(Value::null(t));
    }
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        let (a, b) = (*a, *b);
        let out = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            _ => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_div(b)
            }
        };
        return out.map(Value::Integer).ok_or(Error::NumericOverflow);
    }
    let (a, b) = match (l.as_float64(), r.as_float64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::type_mismatch(
                op.to_string(),
                format!("{} and {}", l.data_type(), r.data_type()),
            ))
        }
    };
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => {
            if b == 0.0 {
                return Err(Error::DivisionByZero);
            }
            a / b
        }
    };
    Ok(Value::Float(out))
}
