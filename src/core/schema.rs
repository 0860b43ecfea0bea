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

//! Schema definitions for range sources

use std::fmt;

use rustc_hash::FxHashMap;

use super::types::DataType;
use super::value::Value;

/// Column definition within a schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    /// Position of the column in the row
    pub id: usize,

    /// Name of the column
    pub name: String,

    /// Declared data type
    pub data_type: DataType,

    /// Whether NULL values are allowed
    pub nullable: bool,

    /// Whether the column is part of the primary key
    pub primary_key: bool,

    /// Default value used when an insert omits the column
    pub default_value: Option<Value>,
}

impl SchemaColumn {
    /// Create a new column definition
    pub fn new(
        id: usize,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        primary_key: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable,
            primary_key,
            default_value: None,
        }
    }

    /// True if an insert may omit this column
    pub fn is_insert_optional(&self) -> bool {
        self.nullable || self.default_value.is_some()
    }
}

impl fmt::Display for SchemaColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if self.primary_key {
            write!(f, " PRIMARY KEY")?;
        } else if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(default) = &self.default_value {
            write!(f, " DEFAULT {}", default)?;
        }
        Ok(())
    }
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct Schema {
    /// Name of the table
    pub table_name: String,

    /// Column definitions
    pub columns: Vec<SchemaColumn>,

    /// Column groups whose combined values are unique (primary key first)
    pub unique_keys: Vec<Vec<usize>>,

    /// Lowercase name -> index
    column_index: FxHashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given table name and columns
    pub fn new(table_name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_lowercase(), i))
            .collect();
        let pk: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let unique_keys = if pk.is_empty() { Vec::new() } else { vec![pk] };
        Self {
            table_name: table_name.into(),
            columns,
            unique_keys,
            column_index,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the column index by name (case-insensitive)
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(&name.to_lowercase()).copied()
    }

    /// Get a column by index
    pub fn get_column(&self, index: usize) -> Option<&SchemaColumn> {
        self.columns.get(index)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key column positions
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect()
    }

    /// Unique keys whose every column is NOT NULL
    pub fn unique_not_null_keys(&self) -> Vec<Vec<usize>> {
        self.unique_keys
            .iter()
            .filter(|key| key.iter().all(|&i| !self.columns[i].nullable))
            .cloned()
            .collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.table_name)?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        write!(f, ")")
    }
}

/// Builder for creating schemas more ergonomically
pub struct SchemaBuilder {
    table_name: String,
    columns: Vec<SchemaColumn>,
    unique: Vec<Vec<String>>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            unique: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        primary_key: bool,
    ) -> Self {
        let id = self.columns.len();
        self.columns
            .push(SchemaColumn::new(id, name, data_type, nullable, primary_key));
        self
    }

    /// Add a simple non-nullable column
    pub fn add(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(name, data_type, false, false)
    }

    /// Add a nullable column
    pub fn add_nullable(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(name, data_type, true, false)
    }

    /// Add a primary key column
    pub fn add_primary_key(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(name, data_type, false, true)
    }

    /// Add a non-nullable column with a default value
    pub fn add_with_default(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        default_value: Value,
    ) -> Self {
        let id = self.columns.len();
        let mut col = SchemaColumn::new(id, name, data_type, false, false);
        col.default_value = Some(default_value);
        self.columns.push(col);
        self
    }

    /// Declare a unique constraint over the named columns
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Build the schema
    ///
    /// Unique constraints naming unknown columns are ignored.
    pub fn build(self) -> Schema {
        let mut schema = Schema::new(self.table_name, self.columns);
        for names in self.unique {
            let key: Option<Vec<usize>> = names
                .iter()
                .map(|n| schema.get_column_index(n))
                .collect();
            if let Some(key) = key {
                if !schema.unique_keys.contains(&key) {
                    schema.unique_keys.push(key);
                }
            }
        }
        schema
    }
}
