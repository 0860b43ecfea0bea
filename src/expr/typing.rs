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

//! Type inference for expressions
//!
//! Types are derived bottom-up from bound column types, literal types and
//! function signatures. `DataType::Null` stands for "not yet known" (untyped
//! parameters and NULL literals) and combines with any other type.

use super::{BinaryOp, Expression, UnaryOp};
use crate::core::{DataType, Error, Operator, Result};

impl Expression {
    /// Infers the result type
    ///
    /// `slots` holds the types of the row buffer positions that
    /// `SimpleColumn` nodes refer to.
    pub fn data_type(&self, slots: &[DataType]) -> Result<DataType> {
        match self {
            Expression::Literal(v) => Ok(v.data_type()),
            Expression::Parameter(_) => Ok(DataType::Null),
            Expression::Column(c) => c
                .binding
                .map(|b| b.data_type)
                .ok_or(Error::NotResolved("column reference")),
            Expression::SimpleColumn(i) => slots
                .get(*i)
                .copied()
                .ok_or_else(|| Error::internal(format!("no row buffer slot {}", i))),
            Expression::Unary { op, operand } => {
                let t = operand.data_type(slots)?;
                match op {
                    UnaryOp::Neg if t.is_numeric() || t.is_unknown() => Ok(t),
                    UnaryOp::Neg => Err(Error::type_mismatch(self.to_string(), t.to_string())),
                    UnaryOp::Not if matches!(t, DataType::Boolean | DataType::Null) => {
                        Ok(DataType::Boolean)
                    }
                    UnaryOp::Not => Err(Error::NonBooleanPredicate(operand.to_string())),
                }
            }
            Expression::Binary { op, left, right } => self.binary_type(*op, left, right, slots),
            Expression::IsNull { operand, .. } => {
                operand.data_type(slots)?;
                Ok(DataType::Boolean)
            }
            Expression::InList { operand, list, .. } => {
                let mut t = operand.data_type(slots)?;
                for item in list {
                    t = t
                        .aggregate_type(item.data_type(slots)?)
                        .map_err(|_| Error::incompatible_types(operand, item))?;
                }
                Ok(DataType::Boolean)
            }
            Expression::Function(call) => {
                let func = call
                    .func
                    .as_ref()
                    .ok_or_else(|| Error::FunctionNotFound(call.name.clone()))?;
                let args = call
                    .args
                    .iter()
                    .map(|a| a.data_type(slots))
                    .collect::<Result<Vec<_>>>()?;
                func.return_type(&args)
            }
            Expression::Aggregate { kind, arg, .. } => {
                let arg_type = match arg {
                    Some(arg) => Some(arg.data_type(slots)?),
                    None => None,
                };
                kind.result_type(arg_type)
            }
            Expression::Row(_) => Err(Error::RowValuedColumn(self.to_string())),
            Expression::Array(items) => {
                let mut element = DataType::Null;
                for item in items {
                    element = element.aggregate_type(item.data_type(slots)?)?;
                }
                if element.is_unknown() {
                    return Err(Error::UnknownArrayElementType(self.to_string()));
                }
                Ok(DataType::Array)
            }
            Expression::ScalarSubquery(sq) => {
                let types = sq.query.column_types();
                match types.as_slice() {
                    [t] => Ok(*t),
                    _ => Err(Error::SubqueryDegree(types.len())),
                }
            }
            Expression::Exists(_) => Ok(DataType::Boolean),
        }
    }

    /// Fails unless the expression is a boolean predicate
    ///
    /// NULL literals and untyped parameters are accepted.
    pub fn check_predicate(&self, slots: &[DataType]) -> Result<()> {
        match self.data_type(slots)? {
            DataType::Boolean | DataType::Null => Ok(()),
            _ => Err(Error::NonBooleanPredicate(self.to_string())),
        }
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        slots: &[DataType],
    ) -> Result<DataType> {
        if let BinaryOp::Compare(cmp) = op {
            return compare_type(cmp, left, right, slots).map(|_| DataType::Boolean);
        }

        let lt = left.data_type(slots)?;
        let rt = right.data_type(slots)?;
        match op {
            BinaryOp::And | BinaryOp::Or => {
                for (side, t) in [(left, lt), (right, rt)] {
                    if !matches!(t, DataType::Boolean | DataType::Null) {
                        return Err(Error::NonBooleanPredicate(side.to_string()));
                    }
                }
                Ok(DataType::Boolean)
            }
            BinaryOp::Concat => Ok(DataType::Text),
            _ => {
                let numeric = |t: DataType| t.is_numeric() || t.is_unknown();
                if !numeric(lt) || !numeric(rt) {
                    return Err(Error::type_mismatch(
                        self.to_string(),
                        format!("{} {} {}", lt, op, rt),
                    ));
                }
                match lt.aggregate_type(rt)? {
                    // Both operands untyped: arithmetic defaults to integer
                    DataType::Null => Ok(DataType::Integer),
                    t => Ok(t),
                }
            }
        }
    }
}

fn compare_type(
    op: Operator,
    left: &Expression,
    right: &Expression,
    slots: &[DataType],
) -> Result<()> {
    match (left, right) {
        (Expression::Row(l), Expression::Row(r)) => {
            if l.len() != r.len() {
                return Err(Error::type_mismatch(
                    format!("{} {} {}", left, op, right),
                    format!("row degree {} vs {}", l.len(), r.len()),
                ));
            }
            for (a, b) in l.iter().zip(r.iter()) {
                compare_type(op, a, b, slots)?;
            }
            Ok(())
        }
        (Expression::Row(_), _) | (_, Expression::Row(_)) => Err(Error::type_mismatch(
            format!("{} {} {}", left, op, right),
            "row value compared with scalar",
        )),
        _ => {
            let lt = left.data_type(slots)?;
            let rt = right.data_type(slots)?;
            let common = lt.aggregate_type(rt)?;
            if !common.is_orderable() && !matches!(op, Operator::Eq | Operator::Ne) {
                return Err(Error::type_mismatch(
                    format!("{} {} {}", left, op, right),
                    format!("{} values are not ordered", common),
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnBinding, ColumnRef};

    fn col(t: DataType) -> Expression {
        Expression::Column(ColumnRef {
            qualifier: None,
            name: "c".to_string(),
            binding: Some(ColumnBinding {
                depth: 0,
                range: 0,
                column: 0,
                data_type: t,
                nullable: true,
            }),
        })
    }

    #[test]
    fn test_arithmetic_types() {
        let e = Expression::plus(col(DataType::Integer), Expression::lit(1));
        assert_eq!(e.data_type(&[]).unwrap(), DataType::Integer);
        let e = Expression::plus(col(DataType::Integer), Expression::lit(1.5));
        assert_eq!(e.data_type(&[]).unwrap(), DataType::Float);
        let e = Expression::plus(Expression::param(1), Expression::param(2));
        assert_eq!(e.data_type(&[]).unwrap(), DataType::Integer);
        let e = Expression::plus(col(DataType::Text), Expression::lit(1));
        assert!(matches!(e.data_type(&[]), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_comparison_types() {
        let e = Expression::equal(col(DataType::Text), Expression::lit(1));
        assert!(matches!(
            e.data_type(&[]),
            Err(Error::IncompatibleTypes { .. })
        ));
        let e = Expression::equal(
            Expression::row(vec![col(DataType::Integer), Expression::lit("x")]),
            Expression::row(vec![Expression::lit(1), Expression::lit("y")]),
        );
        assert_eq!(e.data_type(&[]).unwrap(), DataType::Boolean);
    }

    #[test]
    fn test_row_value_is_not_a_column() {
        let e = Expression::row(vec![Expression::lit(1), Expression::lit(2)]);
        assert!(matches!(e.data_type(&[]), Err(Error::RowValuedColumn(_))));
    }

    #[test]
    fn test_array_element_type() {
        let e = Expression::array(vec![Expression::null(), Expression::lit(2)]);
        assert_eq!(e.data_type(&[]).unwrap(), DataType::Array);
        let e = Expression::array(vec![Expression::null()]);
        assert!(matches!(
            e.data_type(&[]),
            Err(Error::UnknownArrayElementType(_))
        ));
    }

    #[test]
    fn test_predicate_check() {
        assert!(Expression::lit(true).check_predicate(&[]).is_ok());
        assert!(Expression::null().check_predicate(&[]).is_ok());
        assert!(matches!(
            Expression::lit(1).check_predicate(&[]),
            Err(Error::NonBooleanPredicate(_))
        ));
        let e = Expression::and(Expression::lit(true), col(DataType::Integer));
        assert!(matches!(e.data_type(&[]), Err(Error::NonBooleanPredicate(_))));
    }

    #[test]
    fn test_slot_and_aggregate_types() {
        let slots = [DataType::Float];
        assert_eq!(
            Expression::SimpleColumn(0).data_type(&slots).unwrap(),
            DataType::Float
        );
        assert_eq!(
            Expression::count_star().data_type(&[]).unwrap(),
            DataType::Integer
        );
        assert_eq!(
            Expression::avg(col(DataType::Integer)).data_type(&[]).unwrap(),
            DataType::Float
        );
        assert!(Expression::func("upper", vec![]).data_type(&[]).is_err());
    }
}
