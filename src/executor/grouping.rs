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

//! GROUP BY validation and aggregate hoisting

use crate::core::{Error, Result};
use crate::expr::Expression;

use super::query_spec::{QueryColumn, QuerySpecification, Zone};
use super::resolver::bound_column;

impl QuerySpecification {
    /// Checks that every grouped expression is derivable from the grouping,
    /// moves aggregates into their own zone and rewrites references to them
    pub(crate) fn resolve_groups(&mut self) -> Result<()> {
        let group_exprs: Vec<Expression> = self
            .zone(Zone::GroupBy)
            .map(|i| self.columns[i].expr.clone())
            .collect();
        if let Some(expr) = group_exprs.iter().find(|e| e.contains_aggregate()) {
            return Err(Error::AggregateInGroupBy(expr.to_string()));
        }

        let visible_exprs: Vec<Expression> = self
            .zone(Zone::Visible)
            .map(|i| self.columns[i].expr.clone())
            .collect();

        if self.grouped {
            let mut targets = group_exprs.clone();
            targets.extend(self.functional_dependencies(&group_exprs)?);

            for i in self.zone(Zone::Visible) {
                let expr = &self.columns[i].expr;
                if !expr.is_composed_of(&targets, true) {
                    return Err(Error::NotInGroupBy(expr.to_string()));
                }
            }

            let mut order_targets = visible_exprs.clone();
            order_targets.extend(targets.iter().cloned());
            for i in self.zone(Zone::OrderBy) {
                let column = &self.columns[i];
                if column.visible_ref.is_none()
                    && !column.expr.is_composed_of(&order_targets, true)
                {
                    return Err(Error::InvalidOrderBy(column.expr.to_string()));
                }
            }

            for i in self.zone(Zone::Having) {
                let expr = &self.columns[i].expr;
                if !expr.is_composed_of(&targets, true) {
                    return Err(Error::InvalidHaving(expr.to_string()));
                }
            }
        } else if self.aggregated {
            for i in self.zone(Zone::Visible) {
                let expr = &self.columns[i].expr;
                if !expr.is_composed_of(&[], true) {
                    return Err(Error::NotInGroupBy(expr.to_string()));
                }
            }
            for i in self.zone(Zone::OrderBy) {
                let column = &self.columns[i];
                if column.visible_ref.is_none()
                    && !column.expr.is_composed_of(&visible_exprs, true)
                {
                    return Err(Error::InvalidOrderBy(column.expr.to_string()));
                }
            }
        }

        if self.distinct {
            for i in self.zone(Zone::OrderBy) {
                let column = &self.columns[i];
                if column.visible_ref.is_none()
                    && !column.expr.is_composed_of(&visible_exprs, false)
                {
                    return Err(Error::InvalidOrderBy(column.expr.to_string()));
                }
            }
        }

        self.hoist_aggregates()?;
        self.convert_simple_columns();

        self.simple_limit = !self.distinct && !self.grouped && self.zones.len(Zone::OrderBy) == 0;
        Ok(())
    }

    /// Columns of ranges whose unique NOT NULL key is fully grouped
    fn functional_dependencies(&self, group: &[Expression]) -> Result<Vec<Expression>> {
        let mut out = Vec::new();
        for (r, range) in self.ranges.iter().enumerate() {
            let grouped: Vec<usize> = group
                .iter()
                .filter_map(|e| e.as_column())
                .filter_map(|c| c.binding)
                .filter(|b| b.depth == 0 && b.range == r)
                .map(|b| b.column)
                .collect();
            if grouped.is_empty() {
                continue;
            }
            let covered = range
                .schema()
                .unique_not_null_keys()
                .iter()
                .any(|key| key.iter().all(|k| grouped.contains(k)));
            if covered {
                for c in 0..range.width() {
                    out.push(bound_column(range, r, c)?);
                }
            }
        }
        Ok(out)
    }

    /// Allocates one aggregate slot per distinct aggregate and replaces
    /// every occurrence with a reference to its slot
    fn hoist_aggregates(&mut self) -> Result<()> {
        let mut aggregates: Vec<Expression> = Vec::new();
        for column in &self.columns {
            if matches!(column.zone, Zone::Visible | Zone::Having | Zone::OrderBy)
                && column.visible_ref.is_none()
            {
                column.expr.collect_aggregates(&mut aggregates)?;
            }
        }
        if aggregates.is_empty() {
            return Ok(());
        }

        let base = self.columns.len();
        for column in self.columns.iter_mut() {
            if column.expr.contains_aggregate() {
                column.expr = column.expr.rewrite(&mut |e| {
                    if e.is_aggregate() {
                        aggregates
                            .iter()
                            .position(|a| a == e)
                            .map(|k| Expression::SimpleColumn(base + k))
                    } else {
                        None
                    }
                });
                column.contains_aggregate = true;
            }
        }

        for aggregate in aggregates {
            let mut column = QueryColumn::new(Zone::Aggregate, aggregate);
            column.data_type = column.expr.data_type(&[])?;
            self.columns.push(column);
        }
        self.refresh_zones();
        log::debug!(
            "hoisted {} aggregate(s) into slots {:?}",
            self.zones.len(Zone::Aggregate),
            self.zone(Zone::Aggregate)
        );
        Ok(())
    }

    /// Inside aggregated columns, reads grouped values from the row buffer
    /// instead of recomputing them from the group's range rows
    fn convert_simple_columns(&mut self) {
        let candidates: Vec<(usize, Expression)> = self
            .zone(Zone::Visible)
            .chain(self.zone(Zone::GroupBy))
            .map(|i| (i, &self.columns[i]))
            .filter(|(_, c)| {
                !c.contains_aggregate && !c.expr.is_literal() && !c.expr.contains_subquery()
            })
            .map(|(i, c)| (i, c.expr.clone()))
            .collect();
        if candidates.is_empty() {
            return;
        }
        for column in self.columns.iter_mut() {
            if !column.contains_aggregate {
                continue;
            }
            column.expr = column.expr.rewrite(&mut |e| {
                candidates
                    .iter()
                    .find(|(_, c)| c == e)
                    .map(|(i, _)| Expression::SimpleColumn(*i))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, SchemaBuilder};
    use crate::expr::BinaryOp;
    use crate::storage::{MemoryTable, RangeSource};
    use std::sync::Arc;

    fn sales() -> Arc<dyn RangeSource> {
        Arc::new(MemoryTable::new(
            SchemaBuilder::new("sales")
                .add_primary_key("id", DataType::Integer)
                .add_nullable("cat", DataType::Text)
                .add_nullable("amt", DataType::Integer)
                .build(),
        ))
    }

    #[test]
    fn test_hoisting_shares_slots() {
        let mut q = QuerySpecification::new();
        q.from_source(sales())
            .add_column(Expression::col("cat"))
            .add_column(Expression::sum(Expression::col("amt")))
            .add_group_by(Expression::col("cat"))
            .set_having(Expression::gt(
                Expression::sum(Expression::col("amt")),
                Expression::lit(10),
            ));
        q.resolve().unwrap();

        let zones = q.zones();
        assert_eq!(zones.len(Zone::Aggregate), 1);
        let slot = zones.range(Zone::Aggregate).start;
        assert_eq!(q.columns()[1].expr, Expression::SimpleColumn(slot));
        assert!(q.columns()[1].contains_aggregate);
        let having = zones.range(Zone::Having).start;
        assert_eq!(
            q.columns()[having].expr.to_string(),
            format!("COLUMN#{} > 10", slot)
        );
    }

    #[test]
    fn test_grouped_expression_reads_group_column() {
        let mut q = QuerySpecification::new();
        q.from_source(sales())
            .add_column(Expression::col("cat"))
            .add_column(Expression::binary(
                BinaryOp::Concat,
                Expression::col("cat"),
                Expression::count_star(),
            ))
            .add_group_by(Expression::col("cat"));
        q.resolve().unwrap();
        let slot = q.zones().range(Zone::Aggregate).start;
        assert_eq!(
            q.columns()[1].expr.to_string(),
            format!("COLUMN#0 || COLUMN#{}", slot)
        );
    }

    #[test]
    fn test_functional_dependency() {
        let mut q = QuerySpecification::new();
        q.from_source(sales())
            .add_column(Expression::col("id"))
            .add_column(Expression::col("cat"))
            .add_column(Expression::count_star())
            .add_group_by(Expression::col("id"));
        assert!(q.resolve().is_ok());

        let mut q = QuerySpecification::new();
        q.from_source(sales())
            .add_column(Expression::col("amt"))
            .add_group_by(Expression::col("cat"));
        assert!(matches!(q.resolve(), Err(Error::NotInGroupBy(_))));
    }

    #[test]
    fn test_aggregate_in_group_by() {
        let mut q = QuerySpecification::new();
        q.from_source(sales())
            .add_column(Expression::col("cat"))
            .add_group_by(Expression::sum(Expression::col("amt")));
        assert!(matches!(q.resolve(), Err(Error::AggregateInGroupBy(_))));
    }
}
