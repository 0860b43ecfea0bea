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

//! Nested-loop join over the range variables of a query
//!
//! Ranges are iterated left to right, each one restarted for every
//! combination of the ranges before it. A LEFT (or FULL) range emits one
//! NULL row for a combination nothing matched. RIGHT and FULL ranges record
//! the positions that matched; once the regular iteration is done each of
//! them is replayed in declared order, emitting its unmatched rows with
//! every range before it NULL-extended.

use rustc_hash::FxHashSet;

use crate::core::{Result, Row};
use crate::expr::RowContext;
use crate::storage::Scanner;

use super::context::ExecutionContext;
use super::range::RangeVariable;

struct RangeState {
    scanner: Box<dyn Scanner>,
    width: usize,
    left_outer: bool,
    right_outer: bool,
    /// No row matched the current combination yet
    has_outer_row: bool,
    /// Positions matched by some combination, right outer ranges only
    matched: FxHashSet<usize>,
    /// Replaying unmatched rows
    full_mode: bool,
}

/// Produces one candidate row combination per `next` call
pub(crate) struct JoinIterator<'a> {
    ranges: &'a [RangeVariable],
    states: Vec<RangeState>,
    rows: Vec<Row>,
    positions: Vec<Option<usize>>,
    current: usize,
    /// Lowest range iterated in the current phase
    floor: usize,
    done: bool,
    emitted_empty: bool,
    exec: &'a ExecutionContext,
    outer: Option<&'a RowContext<'a>>,
    steps: usize,
    check_interval: usize,
}

impl<'a> JoinIterator<'a> {
    /// Opens a scanner on every range
    pub fn new(
        ranges: &'a [RangeVariable],
        exec: &'a ExecutionContext,
        outer: Option<&'a RowContext<'a>>,
        check_interval: usize,
    ) -> Result<Self> {
        let mut states = Vec::with_capacity(ranges.len());
        let mut rows = Vec::with_capacity(ranges.len());
        for (i, range) in ranges.iter().enumerate() {
            let width = range.width();
            states.push(RangeState {
                scanner: range.source.open(exec)?,
                width,
                left_outer: i > 0 && range.join_type.is_left_outer(),
                right_outer: i > 0 && range.join_type.is_right_outer(),
                has_outer_row: false,
                matched: FxHashSet::default(),
                full_mode: false,
            });
            rows.push(Row::null_row(width));
        }
        Ok(Self {
            ranges,
            states,
            rows,
            positions: vec![None; ranges.len()],
            current: 0,
            floor: 0,
            done: false,
            emitted_empty: false,
            exec,
            outer,
            steps: 0,
            check_interval: check_interval.max(1),
        })
    }

    /// Current row of every range
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Source position of the current row of range `i`, `None` when
    /// NULL-extended
    pub fn position(&self, i: usize) -> Option<usize> {
        self.positions.get(i).copied().flatten()
    }

    /// Advances to the next candidate
    pub fn next(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.states.is_empty() {
            self.done = self.emitted_empty;
            self.emitted_empty = true;
            return Ok(!self.done);
        }

        loop {
            let i = self.current;
            if self.advance(i)? {
                if i + 1 == self.states.len() {
                    return Ok(true);
                }
                self.current = i + 1;
                self.reset(i + 1)?;
                continue;
            }
            if i > self.floor {
                self.current = i - 1;
                continue;
            }

            // phase done, replay the next right outer range
            let next = (self.floor + 1..self.states.len()).find(|&j| self.states[j].right_outer);
            let Some(j) = next else {
                self.done = true;
                return Ok(false);
            };
            log::trace!(
                "replaying unmatched rows of {} ({} matched)",
                self.ranges[j].name(),
                self.states[j].matched.len()
            );
            for k in 0..j {
                self.rows[k] = Row::null_row(self.states[k].width);
                self.positions[k] = None;
            }
            self.reset(j)?;
            self.states[j].full_mode = true;
            self.floor = j;
            self.current = j;
        }
    }

    fn reset(&mut self, i: usize) -> Result<()> {
        let state = &mut self.states[i];
        state.scanner.reset()?;
        state.has_outer_row = state.left_outer;
        state.full_mode = false;
        self.rows[i] = Row::null_row(state.width);
        self.positions[i] = None;
        Ok(())
    }

    /// Moves range `i` to its next row matching the join condition
    fn advance(&mut self, i: usize) -> Result<bool> {
        loop {
            self.steps += 1;
            if self.steps % self.check_interval == 0 {
                self.exec.check_cancelled()?;
            }

            let state = &mut self.states[i];
            if !state.scanner.next() {
                if let Some(err) = state.scanner.err() {
                    return Err(err.clone());
                }
                if state.has_outer_row && !state.full_mode {
                    state.has_outer_row = false;
                    self.rows[i] = Row::null_row(state.width);
                    self.positions[i] = None;
                    return Ok(true);
                }
                return Ok(false);
            }

            let position = state.scanner.position();
            if state.full_mode {
                if state.matched.contains(&position) {
                    continue;
                }
                self.rows[i] = state.scanner.row().clone();
                self.positions[i] = Some(position);
                return Ok(true);
            }

            self.rows[i] = state.scanner.row().clone();
            self.positions[i] = Some(position);

            let matches = match &self.ranges[i].condition {
                None => true,
                Some(cond) => {
                    let ctx = RowContext::new(self.exec, &self.rows[..=i]).with_outer(self.outer);
                    cond.evaluate_predicate(&ctx)?
                }
            };
            if matches {
                let state = &mut self.states[i];
                state.has_outer_row = false;
                if state.right_outer {
                    state.matched.insert(position);
                }
                return Ok(true);
            }
        }
    }

    /// Closes every scanner
    pub fn close(&mut self) -> Result<()> {
        for state in self.states.iter_mut() {
            state.scanner.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, SchemaBuilder, Value};
    use crate::executor::JoinType;
    use crate::expr::Expression;
    use crate::storage::{MemoryTable, RangeSource};
    use std::sync::Arc;

    fn table(name: &str, ids: &[i64]) -> Arc<dyn RangeSource> {
        let schema = SchemaBuilder::new(name)
            .add_nullable("id", DataType::Integer)
            .build();
        Arc::new(
            MemoryTable::with_rows(schema, ids.iter().map(|i| Row::from_values(vec![Value::from(*i)])))
                .unwrap(),
        )
    }

    fn bound(range: usize) -> Expression {
        Expression::Column(crate::expr::ColumnRef {
            qualifier: None,
            name: "id".to_string(),
            binding: Some(crate::expr::ColumnBinding {
                depth: 0,
                range,
                column: 0,
                data_type: DataType::Integer,
                nullable: true,
            }),
        })
    }

    fn collect(ranges: &[RangeVariable]) -> Vec<Vec<Option<i64>>> {
        let exec = ExecutionContext::new();
        let mut join = JoinIterator::new(ranges, &exec, None, 1).unwrap();
        let mut out = Vec::new();
        while join.next().unwrap() {
            out.push(join.rows().iter().map(|r| r[0].as_int64()).collect());
        }
        join.close().unwrap();
        out
    }

    #[test]
    fn test_inner_and_left() {
        let inner = vec![
            RangeVariable::new(table("a", &[1, 2])),
            RangeVariable::new(table("b", &[2, 3])).join(JoinType::Inner, Expression::equal(bound(0), bound(1))),
        ];
        assert_eq!(collect(&inner), vec![vec![Some(2), Some(2)]]);

        let left = vec![
            RangeVariable::new(table("a", &[1, 2])),
            RangeVariable::new(table("b", &[2, 3])).join(JoinType::Left, Expression::equal(bound(0), bound(1))),
        ];
        assert_eq!(
            collect(&left),
            vec![vec![Some(1), None], vec![Some(2), Some(2)]]
        );
    }

    #[test]
    fn test_full_replay() {
        let full = vec![
            RangeVariable::new(table("a", &[1, 2])),
            RangeVariable::new(table("b", &[2, 3])).join(JoinType::Full, Expression::equal(bound(0), bound(1))),
        ];
        assert_eq!(
            collect(&full),
            vec![
                vec![Some(1), None],
                vec![Some(2), Some(2)],
                vec![None, Some(3)]
            ]
        );
    }

    #[test]
    fn test_zero_ranges_single_candidate() {
        assert_eq!(collect(&[]), vec![Vec::<Option<i64>>::new()]);
    }

    #[test]
    fn test_cancellation() {
        let ranges = vec![RangeVariable::new(table("a", &[1, 2, 3]))];
        let exec = ExecutionContext::new();
        exec.cancel();
        let mut join = JoinIterator::new(&ranges, &exec, None, 1).unwrap();
        assert!(matches!(join.next(), Err(crate::core::Error::QueryCancelled)));
    }
}
