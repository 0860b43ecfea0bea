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

//! Range variables: the FROM clause entries of a query specification

use std::fmt;
use std::sync::Arc;

use crate::core::Schema;
use crate::expr::Expression;
use crate::storage::RangeSource;

/// How a range variable joins the ranges before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Cross,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Rows of this range are NULL-extended when nothing matches
    pub fn is_left_outer(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Unmatched rows of this range are replayed against NULL left sides
    pub fn is_right_outer(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        };
        f.write_str(s)
    }
}

/// One entry of the FROM clause
///
/// The join type and condition describe how this range joins the ranges
/// declared before it; they are ignored on the first range.
#[derive(Clone)]
pub struct RangeVariable {
    pub(crate) source: Arc<dyn RangeSource>,
    pub(crate) alias: Option<String>,
    pub(crate) join_type: JoinType,
    pub(crate) condition: Option<Expression>,
    pub(crate) using: Vec<String>,
    /// Columns of this range named in USING, shown once by `*`
    pub(crate) using_columns: Vec<usize>,
    /// Left-hand `(range, column)` joined with each of `using_columns`
    pub(crate) using_left: Vec<(usize, usize)>,
    pub(crate) used_columns: Vec<bool>,
}

impl RangeVariable {
    /// Creates a range over `source`
    pub fn new(source: Arc<dyn RangeSource>) -> Self {
        let width = source.schema().column_count();
        Self {
            source,
            alias: None,
            join_type: JoinType::Inner,
            condition: None,
            using: Vec::new(),
            using_columns: Vec::new(),
            using_left: Vec::new(),
            used_columns: vec![false; width],
        }
    }

    /// Sets the correlation name
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Joins with an ON condition
    pub fn join(mut self, join_type: JoinType, condition: Expression) -> Self {
        self.join_type = join_type;
        self.condition = Some(condition);
        self
    }

    /// Joins on equality of the named columns
    pub fn join_using(mut self, join_type: JoinType, columns: &[&str]) -> Self {
        self.join_type = join_type;
        self.using = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Joins without a condition
    pub fn cross_join(mut self) -> Self {
        self.join_type = JoinType::Cross;
        self
    }

    /// Name used to qualify columns of this range
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.source.name())
    }

    pub fn source(&self) -> &Arc<dyn RangeSource> {
        &self.source
    }

    pub fn schema(&self) -> &Schema {
        self.source.schema()
    }

    pub fn width(&self) -> usize {
        self.source.schema().column_count()
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    /// The join condition, including the equalities synthesized from USING
    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    /// Per-column flags set for every column referenced by the query
    pub fn used_columns(&self) -> &[bool] {
        &self.used_columns
    }

    pub(crate) fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.name().eq_ignore_ascii_case(qualifier)
    }

    pub(crate) fn find_column(&self, name: &str) -> Option<usize> {
        self.source.schema().get_column_index(name)
    }

    /// USING columns on the right-hand side resolve to the left copy
    pub(crate) fn is_using_column(&self, column: usize) -> bool {
        self.using_columns.contains(&column)
    }

    /// This range's USING column joined with the left-hand `(range, column)`
    pub(crate) fn using_partner(&self, range: usize, column: usize) -> Option<usize> {
        self.using_left
            .iter()
            .position(|&l| l == (range, column))
            .map(|k| self.using_columns[k])
    }

    pub(crate) fn mark_used(&mut self, column: usize) {
        if let Some(flag) = self.used_columns.get_mut(column) {
            *flag = true;
        }
    }
}

impl fmt::Debug for RangeVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeVariable")
            .field("source", &self.source.name())
            .field("alias", &self.alias)
            .field("join_type", &self.join_type)
            .field("condition", &self.condition.as_ref().map(|c| c.to_string()))
            .field("using", &self.using)
            .finish()
    }
}

impl fmt::Display for RangeVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source.name())?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, SchemaBuilder};
    use crate::storage::MemoryTable;

    fn table() -> Arc<dyn RangeSource> {
        Arc::new(MemoryTable::new(
            SchemaBuilder::new("t")
                .add_primary_key("id", DataType::Integer)
                .add_nullable("v", DataType::Text)
                .build(),
        ))
    }

    #[test]
    fn test_naming_and_lookup() {
        let rv = RangeVariable::new(table());
        assert_eq!(rv.name(), "t");
        assert!(rv.matches_qualifier("T"));
        assert_eq!(rv.find_column("V"), Some(1));
        assert_eq!(rv.width(), 2);

        let rv = rv.with_alias("x");
        assert_eq!(rv.name(), "x");
        assert!(!rv.matches_qualifier("t"));
        assert_eq!(rv.to_string(), "t AS x");
    }

    #[test]
    fn test_join_flags() {
        assert!(JoinType::Left.is_left_outer());
        assert!(!JoinType::Left.is_right_outer());
        assert!(JoinType::Full.is_left_outer() && JoinType::Full.is_right_outer());
        assert!(!JoinType::Inner.is_left_outer());

        let rv = RangeVariable::new(table()).join_using(JoinType::Right, &["id"]);
        assert_eq!(rv.join_type(), JoinType::Right);
        assert_eq!(rv.using, vec!["id".to_string()]);
    }

    #[test]
    fn test_used_columns() {
        let mut rv = RangeVariable::new(table());
        rv.mark_used(1);
        rv.mark_used(7);
        assert_eq!(rv.used_columns(), &[false, true]);
    }
}
