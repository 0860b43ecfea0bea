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

//! Query materialization
//!
//! Drives the join, filters candidates through WHERE, groups and folds
//! aggregates, then applies HAVING, DISTINCT, ORDER BY and OFFSET/LIMIT
//! before projecting the visible zone.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::core::{DataType, Error, Result, Row, Value};
use crate::expr::{Expression, RowContext};
use crate::functions::Accumulator;

use super::context::ExecutionContext;
use super::join::JoinIterator;
use super::query_spec::{QuerySpecification, SortSpec, Zone};

/// Type alias for per-group aggregate state
type AggVec<T> = SmallVec<[T; 4]>;

/// Grouping key, the values of the GROUP BY zone
type GroupKey = SmallVec<[Value; 4]>;

/// Rows produced by executing a query specification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializedResult {
    column_names: Vec<String>,
    column_types: Vec<DataType>,
    rows: Vec<Row>,
    row_ids: Option<Vec<usize>>,
}

impl MaterializedResult {
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_types(&self) -> &[DataType] {
        &self.column_types
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Base table positions of the result rows, for updatable queries
    pub fn row_ids(&self) -> Option<&[usize]> {
        self.row_ids.as_deref()
    }
}

struct Group {
    data: Vec<Value>,
    ranges: Vec<Row>,
    accumulators: AggVec<Accumulator>,
}

impl QuerySpecification {
    // =========================================================================
    // Limits
    // =========================================================================

    fn evaluate_bound(
        &self,
        bound: Option<&Expression>,
        clause: &'static str,
        exec: &ExecutionContext,
    ) -> Result<Option<usize>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        let value = expr.evaluate(&RowContext::new(exec, &[]))?;
        match value.as_int64() {
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            _ => Err(Error::InvalidLimit {
                clause,
                value: value.to_string(),
            }),
        }
    }

    /// Number of rows to return after OFFSET, capped by `max_rows`
    fn limit_count(&self, limit: Option<usize>, max_rows: usize) -> usize {
        let limit = limit.unwrap_or(usize::MAX);
        if max_rows != 0 && max_rows < limit {
            max_rows
        } else {
            limit
        }
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    pub(crate) fn materialize(
        &self,
        exec: &ExecutionContext,
        outer: Option<&RowContext<'_>>,
        max_rows: usize,
    ) -> Result<MaterializedResult> {
        let offset = self.evaluate_bound(self.offset.as_ref(), "OFFSET", exec)?.unwrap_or(0);
        let limit = self.evaluate_bound(self.limit.as_ref(), "LIMIT", exec)?;
        let limit_count = self.limit_count(limit, max_rows);
        if limit_count == 0 {
            return Ok(self.build_result(Vec::new()));
        }

        let mut data = match self.fast_path_value(exec, outer)? {
            Some((slot, value)) => {
                let mut row = vec![Value::null_unknown(); self.zones.aggregate_end];
                row[slot] = value;
                self.compute_aggregated_columns(&mut row, &[], exec, outer)?;
                vec![row]
            }
            None => {
                let row_budget = if self.simple_limit && !self.aggregated {
                    limit_count.saturating_add(offset)
                } else {
                    usize::MAX
                };
                self.scan(exec, outer, row_budget)?
            }
        };

        let having = self.zone(Zone::Having);
        if !having.is_empty() {
            data.retain(|row| having.clone().all(|i| row[i].is_true()));
        }

        for i in self.zone(Zone::OrderBy) {
            if let Some(v) = self.columns[i].visible_ref {
                for row in data.iter_mut() {
                    row[i] = row[v].clone();
                }
            }
        }

        if self.distinct && !self.distinct_via_index {
            let visible = self.zones.visible_end;
            let mut seen: FxHashSet<GroupKey> = FxHashSet::default();
            data.retain(|row| seen.insert(row[..visible].iter().cloned().collect()));
        }

        self.sort_rows(&mut data)?;

        let start = offset.min(data.len());
        data.drain(..start);
        data.truncate(limit_count);

        Ok(self.build_result(data))
    }

    /// Runs the join and returns one buffer per result row before HAVING
    fn scan(
        &self,
        exec: &ExecutionContext,
        outer: Option<&RowContext<'_>>,
        row_budget: usize,
    ) -> Result<Vec<Vec<Value>>> {
        let width = self.zones.aggregate_end;
        let agg_start = self.zones.order_by_end;
        let aggregating = self.aggregated || self.grouped;
        let group_zone = self.zone(Zone::GroupBy);
        let agg_zone = self.zone(Zone::Aggregate);

        let mut join = JoinIterator::new(&self.ranges, exec, outer, self.config.cancel_check_interval)?;
        let mut plain: Vec<Vec<Value>> = Vec::new();
        let mut groups: Vec<Group> = Vec::new();
        let mut group_index: FxHashMap<GroupKey, usize> = FxHashMap::default();
        let mut candidates = 0usize;

        while join.next()? {
            candidates += 1;
            let ctx = RowContext::new(exec, join.rows()).with_outer(outer);
            if let Some(cond) = &self.where_clause {
                if !cond.evaluate_predicate(&ctx)? {
                    continue;
                }
            }

            let mut data = vec![Value::null_unknown(); width];
            for (i, column) in self.columns[..agg_start].iter().enumerate() {
                if column.visible_ref.is_some() || (aggregating && column.contains_aggregate) {
                    continue;
                }
                data[i] = match column.zone {
                    Zone::RowId => join
                        .position(0)
                        .map_or_else(|| Value::null(DataType::Integer), |p| Value::Integer(p as i64)),
                    _ => column.expr.evaluate(&ctx)?,
                };
            }

            if !aggregating {
                plain.push(data);
                if plain.len() >= row_budget {
                    break;
                }
                continue;
            }

            let key: GroupKey = data[group_zone.clone()].iter().cloned().collect();
            let index = match group_index.get(&key) {
                Some(&index) => index,
                None => {
                    groups.push(Group {
                        data,
                        ranges: join.rows().to_vec(),
                        accumulators: self.new_accumulators(),
                    });
                    group_index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];
            for (k, slot) in agg_zone.clone().enumerate() {
                let value = match &self.columns[slot].expr {
                    Expression::Aggregate { arg: Some(arg), .. } => arg.evaluate(&ctx)?,
                    _ => Value::Integer(1),
                };
                let acc = std::mem::take(&mut group.accumulators[k]);
                group.accumulators[k] = acc.merge(&value)?;
            }
        }
        join.close()?;

        if !aggregating {
            log::debug!("scanned {} candidates, {} rows", candidates, plain.len());
            return Ok(plain);
        }

        if groups.is_empty() && self.zones.len(Zone::GroupBy) == 0 {
            let null_rows: Vec<Row> = self
                .ranges
                .iter()
                .map(|r| Row::null_row(r.width()))
                .collect();
            let ctx = RowContext::new(exec, &null_rows).with_outer(outer);
            let mut data = vec![Value::null_unknown(); width];
            for (i, column) in self.columns[..agg_start].iter().enumerate() {
                if column.visible_ref.is_some() || column.contains_aggregate {
                    continue;
                }
                data[i] = column.expr.evaluate(&ctx)?;
            }
            groups.push(Group {
                data,
                ranges: null_rows,
                accumulators: self.new_accumulators(),
            });
        }
        log::debug!("scanned {} candidates into {} groups", candidates, groups.len());

        let mut rows = Vec::with_capacity(groups.len());
        for group in groups {
            let mut data = group.data;
            for (k, slot) in agg_zone.clone().enumerate() {
                data[slot] = group.accumulators[k].finish(self.columns[slot].data_type);
            }
            self.compute_aggregated_columns(&mut data, &group.ranges, exec, outer)?;
            rows.push(data);
        }
        Ok(rows)
    }

    fn new_accumulators(&self) -> AggVec<Accumulator> {
        self.zone(Zone::Aggregate)
            .map(|slot| match &self.columns[slot].expr {
                Expression::Aggregate {
                    kind,
                    arg,
                    distinct,
                } => Accumulator::new(*kind, *distinct, arg.is_none()),
                _ => Accumulator::default(),
            })
            .collect()
    }

    /// Evaluates columns that read aggregate slots, in column order
    fn compute_aggregated_columns(
        &self,
        data: &mut [Value],
        ranges: &[Row],
        exec: &ExecutionContext,
        outer: Option<&RowContext<'_>>,
    ) -> Result<()> {
        for i in 0..self.zones.order_by_end {
            let column = &self.columns[i];
            if !column.contains_aggregate || column.visible_ref.is_some() {
                continue;
            }
            let value = {
                let ctx = RowContext::new(exec, ranges)
                    .with_outer(outer)
                    .with_slots(data);
                column.expr.evaluate(&ctx)?
            };
            data[i] = value;
        }
        Ok(())
    }

    fn sort_rows(&self, data: &mut [Vec<Value>]) -> Result<()> {
        let keys: Vec<(usize, SortSpec)> = self
            .zone(Zone::OrderBy)
            .filter_map(|i| self.columns[i].sort.map(|s| (i, s)))
            .collect();
        if keys.is_empty() {
            return Ok(());
        }
        let mut error = None;
        data.sort_by(|a, b| {
            for (i, spec) in &keys {
                match compare_keys(&a[*i], &b[*i], spec) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ord) => return ord,
                    Err(e) => {
                        error.get_or_insert(e);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn build_result(&self, data: Vec<Vec<Value>>) -> MaterializedResult {
        let visible = self.zones.visible_end;
        let row_ids = (self.zones.len(Zone::RowId) == 1).then(|| {
            data.iter()
                .filter_map(|row| row[visible].as_int64())
                .map(|p| p as usize)
                .collect()
        });
        let rows = data
            .into_iter()
            .map(|mut row| {
                row.truncate(visible);
                Row::from_values(row)
            })
            .collect();
        MaterializedResult {
            column_names: self.column_names(),
            column_types: self.column_types(),
            rows,
            row_ids,
        }
    }
}

fn compare_keys(a: &Value, b: &Value, spec: &SortSpec) -> Result<Ordering> {
    let ord = match (a.is_null(), b.is_null()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => {
            return Ok(if spec.nulls_first {
                Ordering::Less
            } else {
                Ordering::Greater
            })
        }
        (false, true) => {
            return Ok(if spec.nulls_first {
                Ordering::Greater
            } else {
                Ordering::Less
            })
        }
        (false, false) => a.compare(b)?,
    };
    Ok(if spec.descending { ord.reverse() } else { ord })
}
