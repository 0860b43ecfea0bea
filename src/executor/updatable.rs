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

//! Updatability analysis and derived table merging

use crate::core::{DataType, Value};
use crate::expr::{and_conditions, Expression};

use super::query_spec::{QueryColumn, QuerySpecification, Zone};

impl QuerySpecification {
    /// Decides whether rows of the single base range can be updated or
    /// inserted through this query, and maps visible columns to base columns
    pub(crate) fn set_updatability(&mut self) {
        let visible = self.zones.visible_end;
        self.updatable = false;
        self.insertable = false;
        self.base_column_map = vec![None; visible];

        if self.aggregated || self.grouped || self.distinct || !self.top_level {
            return;
        }
        if self.limit.is_some()
            || self.offset.is_some()
            || self.zones.len(Zone::OrderBy) > 0
            || self.ranges.len() != 1
        {
            return;
        }

        let source = self.ranges[0].source.clone();
        if let Some(base) = source.as_query() {
            if !self.can_merge(base) {
                log::debug!("derived table {} is not merged, query is read only", source.name());
                return;
            }
        }
        let Some(base_schema) = source.base_schema() else {
            return;
        };
        let base_name = base_schema.table_name.clone();
        let reads_base = self
            .subqueries()
            .iter()
            .any(|sq| sq.table_names().iter().any(|n| n.eq_ignore_ascii_case(&base_name)));
        if reads_base {
            log::debug!("subquery reads {}, query is read only", base_name);
            return;
        }

        let source_map = source.base_column_map();
        let mut occurrences = vec![0usize; self.ranges[0].width()];
        let plain: Vec<Option<usize>> = self.columns[..visible]
            .iter()
            .map(|c| {
                c.expr
                    .as_column()
                    .and_then(|r| r.binding)
                    .filter(|b| b.depth == 0)
                    .map(|b| b.column)
            })
            .collect();
        for column in plain.iter().flatten() {
            occurrences[*column] += 1;
        }

        let mut updatable = false;
        let mut insertable = source.is_insertable();
        let mut map = vec![None; visible];
        for i in 0..visible {
            match plain[i] {
                Some(c) if self.columns[i].accessible && occurrences[c] == 1 => {
                    map[i] = source_map.get(c).copied().flatten();
                    if map[i].is_some() {
                        updatable = true;
                    }
                }
                _ => insertable = false,
            }
        }
        updatable &= source.is_updatable();

        if insertable {
            let mapped: Vec<usize> = map.iter().flatten().copied().collect();
            insertable = base_schema
                .columns
                .iter()
                .enumerate()
                .all(|(i, c)| mapped.contains(&i) || c.is_insert_optional());
        }
        if !updatable {
            insertable = false;
        }

        self.updatable = updatable;
        self.insertable = insertable;
        self.base_column_map = map;

        if updatable && self.zones.len(Zone::RowId) == 0 {
            let mut row_id = QueryColumn::new(Zone::RowId, Expression::Literal(Value::Integer(0)));
            row_id.data_type = DataType::Integer;
            row_id.nullable = false;
            row_id.name = "ROWID".to_string();
            self.columns.insert(visible, row_id);
            self.refresh_zones();
        }
    }

    /// Whether this query can absorb `base`, the query of its only range
    fn can_merge(&self, base: &QuerySpecification) -> bool {
        self.config.merge_derived_tables
            && base.is_mergeable()
            && self.ranges.len() == 1
            && !self.has_subqueries()
    }

    /// Replaces a derived table range by the range of the query defining it
    ///
    /// References to derived columns are substituted by the defining
    /// expressions and the two WHERE clauses are combined.
    pub(crate) fn merge_derived_table(&mut self) {
        if !self.updatable {
            return;
        }
        let Some(base) = self.ranges.first().and_then(|r| r.source.as_query()) else {
            return;
        };
        if !self.can_merge(base) {
            log::trace!(
                "derived table {} kept (mergeable={})",
                self.ranges[0].name(),
                base.is_mergeable()
            );
            return;
        }
        let Some(base_range) = base.ranges.first() else {
            return;
        };

        let mut range = base_range.clone();
        range.alias = Some(self.ranges[0].name().to_string());
        let definitions: Vec<Expression> = base
            .visible_columns()
            .iter()
            .map(|c| c.expr.clone())
            .collect();
        let base_where = base.where_clause.clone();

        let mut substitute = |e: &Expression| match e {
            Expression::Column(c) => c
                .binding
                .filter(|b| b.depth == 0 && b.range == 0)
                .and_then(|b| definitions.get(b.column).cloned()),
            _ => None,
        };
        for column in self.columns.iter_mut() {
            column.expr = column.expr.rewrite(&mut substitute);
        }
        let own_where = self.where_clause.as_ref().map(|w| w.rewrite(&mut substitute));
        self.where_clause = and_conditions(base_where, own_where);

        log::debug!(
            "merged derived table {} into query over {}",
            self.ranges[0].name(),
            range.source.name()
        );
        self.ranges[0] = range;
        self.merged = true;
        self.mark_used_columns();
    }
}
