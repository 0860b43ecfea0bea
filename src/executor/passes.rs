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

//! Type resolution passes
//!
//! Pass one types every column and predicate and derives the aggregation
//! flags. Pass two validates grouping, hoists aggregates, finalizes column
//! types and names, and decides updatability and merging. Pass three
//! computes nullability and picks specialized execution strategies.

use crate::core::{DataType, Error, Result};
use crate::expr::Expression;

use super::query_spec::{QuerySpecification, Zone};

impl QuerySpecification {
    // =========================================================================
    // Pass one
    // =========================================================================

    /// Types columns and predicates and derives the aggregation flags
    pub fn resolve_types_part_one(&mut self) -> Result<()> {
        if self.passes.types_one {
            return Ok(());
        }
        if !self.passes.references {
            return Err(Error::NotResolved("column references"));
        }

        for range in &self.ranges {
            if let Some(cond) = &range.condition {
                if cond.contains_aggregate() {
                    return Err(Error::MisplacedAggregate(cond.to_string()));
                }
                cond.check_predicate(&[])?;
            }
        }

        if let Some(cond) = &self.where_clause {
            if cond.contains_aggregate() {
                return Err(self.where_aggregate_error(cond));
            }
            cond.check_predicate(&[])?;
        }

        for column in self.columns.iter_mut() {
            if column.zone == Zone::Having {
                column.expr.check_predicate(&[])?;
            }
            column.data_type = column.expr.data_type(&[])?;
        }

        let agg_zones = [Zone::Visible, Zone::Having, Zone::OrderBy];
        self.aggregated = self
            .columns
            .iter()
            .any(|c| agg_zones.contains(&c.zone) && c.expr.contains_aggregate());
        self.grouped = self.zones.len(Zone::GroupBy) > 0 || self.zones.len(Zone::Having) > 0;
        self.order_sensitive = self.zones.len(Zone::OrderBy) > 0;

        self.fold_constant_where();

        self.passes.types_one = true;
        log::debug!(
            "type pass one: aggregated={} grouped={} order_sensitive={}",
            self.aggregated,
            self.grouped,
            self.order_sensitive
        );
        Ok(())
    }

    fn where_aggregate_error(&self, cond: &Expression) -> Error {
        let mut aggregates = Vec::new();
        if cond.collect_aggregates(&mut aggregates).is_err() {
            return Error::MisplacedAggregate(cond.to_string());
        }
        let refs: Vec<_> = aggregates.iter().flat_map(|a| a.column_refs()).collect();
        if !self.top_level && refs.iter().any(|c| c.is_outer()) {
            Error::UnrelatedAggregate(cond.to_string())
        } else {
            Error::MisplacedAggregate(cond.to_string())
        }
    }

    /// Drops a TRUE WHERE and turns a FALSE or NULL one into LIMIT 0
    fn fold_constant_where(&mut self) {
        let Some(Expression::Literal(value)) = &self.where_clause else {
            return;
        };
        if value.is_true() {
            self.where_clause = None;
        } else if !self.aggregated && !self.grouped {
            log::debug!("constant false WHERE, query returns no rows");
            self.limit = Some(Expression::lit(0));
        }
    }

    // =========================================================================
    // Pass two
    // =========================================================================

    /// Validates grouping, hoists aggregates and finalizes result metadata
    pub fn resolve_types_part_two(&mut self) -> Result<()> {
        if self.passes.types_two {
            return Ok(());
        }
        if !self.passes.types_one {
            return Err(Error::NotResolved("type pass one"));
        }

        self.resolve_groups()?;
        self.finalize_visible_types()?;
        self.assign_column_names()?;
        self.set_updatability();
        self.merge_derived_table();
        self.set_mergeability();

        self.passes.types_two = true;
        log::debug!(
            "type pass two: {} columns, updatable={} mergeable={}",
            self.columns.len(),
            self.updatable,
            self.mergeable
        );
        Ok(())
    }

    fn finalize_visible_types(&mut self) -> Result<()> {
        if let Some(types) = self.union_types.take() {
            for (column, t) in self.columns.iter_mut().zip(types) {
                column.data_type = t;
            }
        }
        let strict = self.config.strict_typing;
        for column in self.columns[..self.zones.visible_end].iter_mut() {
            if column.data_type == DataType::Null {
                if strict {
                    return Err(Error::UntypedColumn(column.expr.to_string()));
                }
                column.data_type = DataType::Text;
            }
        }
        Ok(())
    }

    /// Names visible columns and flags names shared by several of them
    fn assign_column_names(&mut self) -> Result<()> {
        let visible = self.zones.visible_end;
        let aliases: Vec<String> = self.columns[..visible]
            .iter()
            .filter_map(|c| c.alias.clone())
            .collect();

        for (i, column) in self.columns[..visible].iter_mut().enumerate() {
            column.name = match (&column.alias, column.expr.as_column(), &column.using_name) {
                (Some(alias), _, _) => alias.clone(),
                (None, Some(c), _) => c.name.clone(),
                (None, None, Some(name)) => name.clone(),
                (None, None, None) => {
                    let mut name = format!("C{}", i + 1);
                    while aliases.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
                        name.insert(0, '_');
                    }
                    name
                }
            };
        }

        if let Some(names) = &self.explicit_names {
            if names.len() != visible {
                return Err(Error::ColumnCountMismatch {
                    expected: visible,
                    got: names.len(),
                });
            }
            for (column, name) in self.columns.iter_mut().zip(names) {
                column.name = name.clone();
            }
        }

        let names: Vec<String> = self.columns[..visible]
            .iter()
            .map(|c| c.name.to_ascii_lowercase())
            .collect();
        for (i, column) in self.columns[..visible].iter_mut().enumerate() {
            column.accessible = names.iter().filter(|n| **n == names[i]).count() == 1;
        }
        Ok(())
    }

    fn set_mergeability(&mut self) {
        self.mergeable = !self.aggregated
            && !self.grouped
            && !self.distinct
            && self.limit.is_none()
            && self.offset.is_none()
            && self.zones.len(Zone::OrderBy) == 0
            && self.ranges.len() == 1
            && !self.has_subqueries();
    }

    // =========================================================================
    // Pass three
    // =========================================================================

    /// Computes nullability and selects fast paths
    pub fn resolve_types_part_three(&mut self) -> Result<()> {
        if self.passes.types_three {
            return Ok(());
        }
        if !self.passes.types_two {
            return Err(Error::NotResolved("type pass two"));
        }

        self.compute_nullability();
        self.select_fast_path();

        self.passes.types_three = true;
        log::debug!("type pass three complete: {}", self);
        Ok(())
    }

    /// Ranges on the NULL-extended side of an outer join
    pub(crate) fn outer_join_nullable_ranges(&self) -> Vec<bool> {
        let mut forced = vec![false; self.ranges.len()];
        for (i, range) in self.ranges.iter().enumerate().skip(1) {
            if range.join_type.is_left_outer() {
                forced[i] = true;
            }
            if range.join_type.is_right_outer() {
                forced[..i].iter_mut().for_each(|f| *f = true);
            }
        }
        forced
    }

    fn compute_nullability(&mut self) {
        let forced = self.outer_join_nullable_ranges();
        self.forced_nullable = forced.clone();

        let mut slots = vec![true; self.columns.len()];
        for (i, column) in self.columns.iter_mut().enumerate() {
            if column.zone == Zone::RowId {
                column.nullable = false;
            } else if !column.contains_aggregate {
                column.nullable = column.expr.is_nullable(&forced, &[]);
            }
            slots[i] = column.nullable;
        }
        // aggregate slots are known now
        for i in 0..self.columns.len() {
            if self.columns[i].contains_aggregate {
                let nullable = self.columns[i].expr.is_nullable(&forced, &slots);
                self.columns[i].nullable = nullable;
                slots[i] = nullable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;
    use crate::executor::{JoinType, RangeVariable};
    use crate::storage::{MemoryTable, RangeSource};
    use std::sync::Arc;

    fn table(name: &str) -> Arc<dyn RangeSource> {
        Arc::new(MemoryTable::new(
            SchemaBuilder::new(name)
                .add_primary_key("id", DataType::Integer)
                .add_nullable("v", DataType::Text)
                .build(),
        ))
    }

    #[test]
    fn test_passes_require_order() {
        let mut q = QuerySpecification::new();
        q.from_source(table("t")).add_column(Expression::col("id"));
        assert!(matches!(
            q.resolve_types_part_one(),
            Err(Error::NotResolved(_))
        ));
        q.resolve_references().unwrap();
        assert!(matches!(
            q.resolve_types_part_three(),
            Err(Error::NotResolved(_))
        ));
        q.resolve_types().unwrap();
        // idempotent
        q.resolve_types().unwrap();
        assert!(q.is_resolved());
    }

    #[test]
    fn test_constant_where_folding() {
        let mut q = QuerySpecification::new();
        q.from_source(table("t"))
            .add_column(Expression::col("id"))
            .set_where(Expression::lit(true));
        q.resolve().unwrap();
        assert!(q.where_clause().is_none());

        let mut q = QuerySpecification::new();
        q.from_source(table("t"))
            .add_column(Expression::col("id"))
            .set_where(Expression::lit(false));
        q.resolve().unwrap();
        assert_eq!(q.limit, Some(Expression::lit(0)));
    }

    #[test]
    fn test_automatic_names_avoid_aliases() {
        let mut q = QuerySpecification::new();
        q.from_source(table("t"))
            .add_select(Expression::col("id"), Some("C2"))
            .add_column(Expression::plus(Expression::col("id"), Expression::lit(1)))
            .add_column(Expression::col("v"));
        q.resolve().unwrap();
        assert_eq!(q.column_names(), vec!["C2", "_C2", "v"]);
    }

    #[test]
    fn test_duplicate_names_inaccessible() {
        let mut q = QuerySpecification::new();
        q.from_source(table("t"))
            .add_column(Expression::col("id"))
            .add_select(Expression::col("v"), Some("ID"));
        q.resolve().unwrap();
        assert!(!q.columns()[0].accessible);
        assert!(!q.columns()[1].accessible);
    }

    #[test]
    fn test_outer_join_nullability() {
        let mut q = QuerySpecification::new();
        q.add_range(RangeVariable::new(table("a")))
            .add_range(RangeVariable::new(table("b")).join(
                JoinType::Left,
                Expression::equal(Expression::qcol("a", "id"), Expression::qcol("b", "id")),
            ))
            .add_column(Expression::qcol("a", "id"))
            .add_column(Expression::qcol("b", "id"));
        q.resolve().unwrap();
        assert_eq!(q.column_nullability(), vec![false, true]);
    }

    #[test]
    fn test_strict_typing_rejects_untyped() {
        let mut q = QuerySpecification::new();
        q.set_config(crate::executor::QueryConfig::default().with_strict_typing(true))
            .from_source(table("t"))
            .add_column(Expression::null());
        q.resolve_references().unwrap();
        q.resolve_types_part_one().unwrap();
        assert!(matches!(
            q.resolve_types_part_two(),
            Err(Error::UntypedColumn(_))
        ));

        let mut q = QuerySpecification::new();
        q.from_source(table("t")).add_column(Expression::null());
        q.resolve().unwrap();
        assert_eq!(q.column_types(), vec![DataType::Text]);
    }
}
