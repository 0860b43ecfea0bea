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

//! Row type - a collection of column values

use std::fmt;
use std::ops::{Deref, Index};

use super::error::{Error, Result};
use super::schema::Schema;
use super::types::DataType;
use super::value::Value;

/// A database row
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create a row from values
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Create a row of `len` untyped NULLs
    pub fn null_row(len: usize) -> Self {
        Self {
            values: vec![Value::null_unknown(); len],
        }
    }

    /// Create a row of typed NULLs matching a schema
    pub fn null_row_for(schema: &Schema) -> Self {
        schema
            .columns
            .iter()
            .map(|c| Value::null(c.data_type))
            .collect()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Replace the value at `index`
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::internal(format!(
                "row index {} out of bounds (len {})",
                index,
                self.values.len()
            ))),
        }
    }

    /// Append a value
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Drop trailing values beyond `len`
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Borrow the values
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Take the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Validate the row against a schema, converting numeric values to the
    /// declared column type
    pub fn validate(self, schema: &Schema) -> Result<Row> {
        if self.values.len() != schema.columns.len() {
            return Err(Error::ColumnCountMismatch {
                expected: schema.columns.len(),
                got: self.values.len(),
            });
        }

        let mut out = Vec::with_capacity(self.values.len());
        for (value, col) in self.values.into_iter().zip(schema.columns.iter()) {
            if value.is_null() {
                if !col.nullable {
                    return Err(Error::not_null_constraint(&col.name));
                }
                out.push(Value::null(col.data_type));
                continue;
            }
            let value_type = value.data_type();
            if value_type == col.data_type {
                out.push(value);
            } else if matches!(
                (value_type, col.data_type),
                (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer)
            ) {
                out.push(value.convert_to(col.data_type)?);
            } else {
                return Err(Error::type_conversion(
                    format!("column {}: {}", col.name, value_type),
                    col.data_type.to_string(),
                ));
            }
        }
        Ok(Row::from_values(out))
    }
}

impl Deref for Row {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Row::from_values(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::from_values(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Macro for creating rows conveniently
#[macro_export]
macro_rules! row {
    () => {
        $crate::core::Row::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::core::Row::from_values(vec![$($crate::core::Value::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;

    fn schema() -> Schema {
        SchemaBuilder::new("t")
            .add_primary_key("id", DataType::Integer)
            .add("amt", DataType::Float)
            .add_nullable("note", DataType::Text)
            .build()
    }

    #[test]
    fn test_row_macro_and_display() {
        let row = crate::row![1, "a", 2.5];
        assert_eq!(row.len(), 3);
        assert_eq!(row.to_string(), "(1, a, 2.5)");
        assert_eq!(row[0], Value::integer(1));
    }

    #[test]
    fn test_validate_converts_numeric() {
        let row = Row::from_values(vec![
            Value::integer(1),
            Value::integer(10),
            Value::null_unknown(),
        ]);
        let row = row.validate(&schema()).unwrap();
        assert_eq!(row[1].data_type(), DataType::Float);
        assert_eq!(row[2].data_type(), DataType::Text);
    }

    #[test]
    fn test_validate_rejects() {
        let short = crate::row![1];
        assert!(matches!(
            short.validate(&schema()),
            Err(Error::ColumnCountMismatch { .. })
        ));

        let null_pk = Row::from_values(vec![
            Value::null_unknown(),
            Value::float(1.0),
            Value::null_unknown(),
        ]);
        assert!(matches!(
            null_pk.validate(&schema()),
            Err(Error::NotNullConstraint { .. })
        ));

        let wrong = crate::row![1, "x", "y"];
        assert!(wrong.validate(&schema()).is_err());
    }

    #[test]
    fn test_null_row() {
        let row = Row::null_row_for(&schema());
        assert!(row.iter().all(Value::is_null));
        assert_eq!(row[1].data_type(), DataType::Float);
        assert_eq!(Row::null_row(2).len(), 2);
    }
}
