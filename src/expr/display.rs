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

//! SQL rendering of expressions
//!
//! The rendered text is what error messages quote and what
//! `QuerySpecification`'s `Display` prints.

use std::fmt;

use super::{BinaryOp, Expression, UnaryOp};
use crate::core::Value;

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write_literal(f, v),
            Expression::Parameter(i) => write!(f, "${}", i),
            Expression::Column(c) => match &c.qualifier {
                Some(q) => write!(f, "{}.{}", q, c.name),
                None => write!(f, "{}", c.name),
            },
            Expression::SimpleColumn(i) => write!(f, "COLUMN#{}", i),
            Expression::Unary { op, operand } => match op {
                UnaryOp::Neg => {
                    write!(f, "-")?;
                    write_operand(f, operand)
                }
                UnaryOp::Not => {
                    write!(f, "NOT ")?;
                    write_operand(f, operand)
                }
            },
            Expression::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op)?;
                write_operand(f, right)
            }
            Expression::IsNull { operand, negated } => {
                write_operand(f, operand)?;
                if *negated {
                    write!(f, " IS NOT NULL")
                } else {
                    write!(f, " IS NULL")
                }
            }
            Expression::InList {
                operand,
                list,
                negated,
            } => {
                write_operand(f, operand)?;
                write!(f, "{} IN (", if *negated { " NOT" } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expression::Function(call) => {
                write!(f, "{}(", call.name.to_uppercase())?;
                write_list(f, &call.args)?;
                write!(f, ")")
            }
            Expression::Aggregate {
                kind,
                arg,
                distinct,
            } => match arg {
                None => write!(f, "{}(*)", kind),
                Some(arg) if *distinct => write!(f, "{}(DISTINCT {})", kind, arg),
                Some(arg) => write!(f, "{}({})", kind, arg),
            },
            Expression::Row(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Expression::Array(items) => {
                write!(f, "ARRAY[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::ScalarSubquery(sq) => write!(f, "({})", sq.query),
            Expression::Exists(sq) => write!(f, "EXISTS ({})", sq.query),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null(_) => write!(f, "NULL"),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Timestamp(_) => write!(f, "TIMESTAMP '{}'", value),
        other => write!(f, "{}", other),
    }
}

// Nested binary operands are parenthesized so precedence survives rendering
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr {
        Expression::Binary { op, .. } if *op != BinaryOp::Concat => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
