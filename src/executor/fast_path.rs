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

//! Specialized execution strategies
//!
//! - `SELECT COUNT(*) FROM t` reads the source's cached row count.
//! - A lone `MIN(x)`/`MAX(x)` runs as `SELECT x ... WHERE x IS NOT NULL
//!   ORDER BY x LIMIT 1`.
//! - DISTINCT over columns covered by a unique NOT NULL index skips
//!   deduplication.

use crate::core::{Result, Value};
use crate::expr::{and_conditions, Expression, RowContext};
use crate::functions::AggregateKind;

use super::config::QueryConfig;
use super::context::ExecutionContext;
use super::query_spec::{FastPath, PassState, QueryColumn, QuerySpecification, SortSpec, Zone};

impl QuerySpecification {
    pub(crate) fn select_fast_path(&mut self) {
        self.fast_path = FastPath::None;
        if self.is_count_star_query() {
            log::debug!("COUNT(*) answered from the row count of {}", self.ranges[0].name());
            self.fast_path = FastPath::CountStar;
        } else if let Some(rewrite) = self.min_max_rewrite() {
            log::debug!("MIN/MAX rewritten to {}", rewrite);
            self.fast_path = FastPath::MinMax(Box::new(rewrite));
        }

        self.distinct_via_index = match self.distinct_index() {
            Some(index) => {
                log::debug!("DISTINCT guaranteed by unique index {}", index);
                true
            }
            None => false,
        };
    }

    /// The only aggregate of a single-range, ungrouped query whose one
    /// visible column is that aggregate
    fn lone_aggregate(&self) -> Option<(usize, &Expression)> {
        let z = self.zones;
        if self.ranges.len() != 1 || !self.aggregated || self.grouped {
            return None;
        }
        if z.visible_end != 1
            || z.len(Zone::Aggregate) != 1
            || z.len(Zone::OrderBy) != 0
            || z.len(Zone::Having) != 0
        {
            return None;
        }
        let slot = z.order_by_end;
        if self.columns[0].expr != Expression::SimpleColumn(slot) {
            return None;
        }
        Some((slot, &self.columns[slot].expr))
    }

    fn is_count_star_query(&self) -> bool {
        if !self.config.count_star_fast_path || self.where_clause.is_some() {
            return false;
        }
        matches!(
            self.lone_aggregate(),
            Some((
                _,
                Expression::Aggregate {
                    kind: AggregateKind::Count,
                    arg: None,
                    distinct: false,
                }
            ))
        )
    }

    fn min_max_rewrite(&self) -> Option<QuerySpecification> {
        if !self.config.min_max_fast_path {
            return None;
        }
        let (slot, aggregate) = self.lone_aggregate()?;
        let Expression::Aggregate {
            kind,
            arg: Some(arg),
            ..
        } = aggregate
        else {
            return None;
        };
        if !kind.is_min_max() || arg.contains_subquery() {
            return None;
        }
        if !arg
            .column_refs()
            .iter()
            .all(|c| matches!(c.binding, Some(b) if b.depth == 0))
        {
            return None;
        }
        if self.where_clause.as_ref().is_some_and(|w| w.contains_subquery()) {
            return None;
        }

        let arg = arg.as_ref().clone();
        let mut visible = QueryColumn::new(Zone::Visible, arg.clone());
        visible.data_type = self.columns[slot].data_type;
        visible.name = self.columns[0].name.clone();
        let mut order = QueryColumn::new(Zone::OrderBy, arg.clone());
        order.data_type = visible.data_type;
        order.visible_ref = Some(0);
        order.sort = Some(SortSpec {
            descending: *kind == AggregateKind::Max,
            nulls_first: false,
        });

        let mut rewritten = QuerySpecification::new();
        rewritten.config = QueryConfig::without_optimizations();
        rewritten.top_level = self.top_level;
        rewritten.ranges = self.ranges.clone();
        rewritten.columns = vec![visible, order];
        rewritten.refresh_zones();
        rewritten.where_clause = and_conditions(
            self.where_clause.clone(),
            Some(Expression::is_null(arg, true)),
        );
        rewritten.limit = Some(Expression::lit(1));
        rewritten.order_sensitive = true;
        rewritten.passes = PassState {
            references: true,
            types_one: true,
            types_two: true,
            types_three: true,
        };
        Some(rewritten)
    }

    fn distinct_index(&self) -> Option<String> {
        if !self.config.distinct_via_index
            || !self.distinct
            || self.aggregated
            || self.grouped
            || self.ranges.len() != 1
        {
            return None;
        }
        let columns: Option<Vec<usize>> = self
            .visible_columns()
            .iter()
            .map(|c| {
                c.expr
                    .as_column()
                    .and_then(|r| r.binding)
                    .filter(|b| b.depth == 0 && b.range == 0)
                    .map(|b| b.column)
            })
            .collect();
        self.ranges[0].source.find_unique_index(&columns?)
    }

    /// Value of the lone aggregate when a fast path applies
    ///
    /// `None` means the regular join and aggregation must run.
    pub(crate) fn fast_path_value(
        &self,
        exec: &ExecutionContext,
        outer: Option<&RowContext<'_>>,
    ) -> Result<Option<(usize, Value)>> {
        let slot = self.zones.order_by_end;
        match &self.fast_path {
            FastPath::None => Ok(None),
            FastPath::CountStar => Ok(self.ranges[0]
                .source
                .row_count()
                .map(|n| (slot, Value::Integer(n as i64)))),
            FastPath::MinMax(rewritten) => {
                let result = rewritten.materialize(exec, outer, 0)?;
                let value = result
                    .into_rows()
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_values().into_iter().next())
                    .unwrap_or_else(|| Value::null(self.columns[slot].data_type));
                Ok(Some((slot, value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, SchemaBuilder};
    use crate::storage::{MemoryTable, RangeSource};
    use std::sync::Arc;

    fn table() -> Arc<dyn RangeSource> {
        Arc::new(MemoryTable::new(
            SchemaBuilder::new("t")
                .add_primary_key("id", DataType::Integer)
                .add_nullable("v", DataType::Integer)
                .build(),
        ))
    }

    fn query(column: Expression) -> QuerySpecification {
        let mut q = QuerySpecification::new();
        q.from_source(table()).add_column(column);
        q
    }

    #[test]
    fn test_count_star_selection() {
        let mut q = query(Expression::count_star());
        q.resolve().unwrap();
        assert!(q.uses_count_fast_path());

        let mut q = query(Expression::count(Expression::col("v")));
        q.resolve().unwrap();
        assert!(!q.uses_count_fast_path());

        let mut q = query(Expression::count_star());
        q.set_where(Expression::gt(Expression::col("id"), Expression::lit(1)));
        q.resolve().unwrap();
        assert!(!q.uses_count_fast_path());

        let mut q = query(Expression::count_star());
        q.set_config(QueryConfig::without_optimizations());
        q.resolve().unwrap();
        assert!(!q.uses_count_fast_path());
    }

    #[test]
    fn test_min_max_rewrite_text() {
        let mut q = query(Expression::max(Expression::col("v")));
        q.resolve().unwrap();
        assert!(q.uses_min_max_rewrite());
        let FastPath::MinMax(rewritten) = &q.fast_path else {
            panic!("expected rewrite");
        };
        assert_eq!(
            rewritten.to_string(),
            "SELECT v FROM t WHERE v IS NOT NULL ORDER BY v DESC LIMIT 1"
        );

        let mut q = query(Expression::plus(Expression::min(Expression::col("v")), Expression::lit(1)));
        q.resolve().unwrap();
        assert!(!q.uses_min_max_rewrite());
    }

    #[test]
    fn test_distinct_index_selection() {
        let mut q = query(Expression::col("id"));
        q.set_distinct(true);
        q.resolve().unwrap();
        assert!(q.uses_distinct_index());

        let mut q = query(Expression::col("v"));
        q.set_distinct(true);
        q.resolve().unwrap();
        assert!(!q.uses_distinct_index());
    }
}
