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

//! Query specification: one SELECT ... FROM ... WHERE ... GROUP BY ...
//! HAVING ... ORDER BY ... block
//!
//! A specification is built through the `add_*`/`set_*` methods, resolved
//! once (`resolve_references`, then the three type passes) and may then be
//! executed any number of times.
//!
//! All computed expressions live in one column list, tagged by [`Zone`]:
//!
//! ```text
//! | visible | row id | group by | having | order by | aggregate slots |
//! ```
//!
//! Expressions refer to aggregate slots (and, inside aggregated columns, to
//! grouped columns) through `Expression::SimpleColumn(position)`.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::core::{DataType, Error, Result, Schema, SchemaColumn};
use crate::expr::{Expression, RowContext};
use crate::storage::RangeSource;

use super::config::QueryConfig;
use super::context::ExecutionContext;
use super::range::RangeVariable;
use super::result::MaterializedResult;

/// Column list zones, in positional order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    Visible,
    RowId,
    GroupBy,
    Having,
    OrderBy,
    Aggregate,
}

/// Zone end positions, derived from the column tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneBounds {
    pub visible_end: usize,
    pub row_id_end: usize,
    pub group_by_end: usize,
    pub having_end: usize,
    pub order_by_end: usize,
    pub aggregate_end: usize,
}

impl ZoneBounds {
    /// Recomputes the bounds from zone tags
    pub fn compute(columns: &[QueryColumn]) -> Self {
        let count = |zone: Zone| columns.iter().filter(|c| c.zone == zone).count();
        let visible_end = count(Zone::Visible);
        let row_id_end = visible_end + count(Zone::RowId);
        let group_by_end = row_id_end + count(Zone::GroupBy);
        let having_end = group_by_end + count(Zone::Having);
        let order_by_end = having_end + count(Zone::OrderBy);
        let aggregate_end = order_by_end + count(Zone::Aggregate);
        Self {
            visible_end,
            row_id_end,
            group_by_end,
            having_end,
            order_by_end,
            aggregate_end,
        }
    }

    /// Positions of a zone
    pub fn range(&self, zone: Zone) -> Range<usize> {
        match zone {
            Zone::Visible => 0..self.visible_end,
            Zone::RowId => self.visible_end..self.row_id_end,
            Zone::GroupBy => self.row_id_end..self.group_by_end,
            Zone::Having => self.group_by_end..self.having_end,
            Zone::OrderBy => self.having_end..self.order_by_end,
            Zone::Aggregate => self.order_by_end..self.aggregate_end,
        }
    }

    pub fn len(&self, zone: Zone) -> usize {
        self.range(zone).len()
    }

    /// Every bound is at least the previous one
    pub fn is_monotonic(&self) -> bool {
        self.visible_end <= self.row_id_end
            && self.row_id_end <= self.group_by_end
            && self.group_by_end <= self.having_end
            && self.having_end <= self.order_by_end
            && self.order_by_end <= self.aggregate_end
    }
}

/// Sort direction of an ORDER BY column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub descending: bool,
    pub nulls_first: bool,
}

/// One entry of the column list
#[derive(Debug, Clone)]
pub struct QueryColumn {
    pub zone: Zone,
    pub expr: Expression,
    /// Alias given in the SELECT list
    pub alias: Option<String>,
    /// Result column name, visible zone only
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Computed from aggregate slots once a group is complete
    pub contains_aggregate: bool,
    /// ORDER BY entry that reads a visible column instead of its own value
    pub visible_ref: Option<usize>,
    /// Name is unique among the visible columns
    pub accessible: bool,
    pub sort: Option<SortSpec>,
    /// Name of the USING column a coalesced join column stands for
    pub(crate) using_name: Option<String>,
}

impl QueryColumn {
    pub(crate) fn new(zone: Zone, expr: Expression) -> Self {
        Self {
            zone,
            expr,
            alias: None,
            name: String::new(),
            data_type: DataType::Null,
            nullable: true,
            contains_aggregate: false,
            visible_ref: None,
            accessible: true,
            sort: None,
            using_name: None,
        }
    }
}

/// An ORDER BY item as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expression,
    pub descending: bool,
    /// Defaults to NULLS FIRST ascending and NULLS LAST descending
    pub nulls_first: Option<bool>,
}

impl OrderItem {
    pub fn asc(expr: Expression) -> Self {
        Self {
            expr,
            descending: false,
            nulls_first: None,
        }
    }

    pub fn desc(expr: Expression) -> Self {
        Self {
            expr,
            descending: true,
            nulls_first: None,
        }
    }

    pub fn nulls_first(mut self, first: bool) -> Self {
        self.nulls_first = Some(first);
        self
    }

    pub(crate) fn sort_spec(&self) -> SortSpec {
        SortSpec {
            descending: self.descending,
            nulls_first: self.nulls_first.unwrap_or(!self.descending),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SelectItem {
    Expr {
        expr: Expression,
        alias: Option<String>,
    },
    Wildcard(Option<String>),
}

/// Specialized execution strategies chosen in the third pass
#[derive(Debug, Clone, Default)]
pub(crate) enum FastPath {
    #[default]
    None,
    /// `SELECT COUNT(*) FROM t` answered from the cached row count
    CountStar,
    /// Single MIN/MAX answered by `ORDER BY arg LIMIT 1`
    MinMax(Box<QuerySpecification>),
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PassState {
    pub references: bool,
    pub types_one: bool,
    pub types_two: bool,
    pub types_three: bool,
}

/// A resolvable and executable query specification
#[derive(Clone)]
pub struct QuerySpecification {
    pub(crate) ranges: Vec<RangeVariable>,
    pub(crate) select_items: Vec<SelectItem>,
    pub(crate) group_by_items: Vec<Expression>,
    pub(crate) having_item: Option<Expression>,
    pub(crate) order_items: Vec<OrderItem>,
    pub(crate) columns: Vec<QueryColumn>,
    pub(crate) zones: ZoneBounds,
    pub(crate) where_clause: Option<Expression>,
    pub(crate) offset: Option<Expression>,
    pub(crate) limit: Option<Expression>,
    pub(crate) explicit_names: Option<Vec<String>>,
    pub(crate) union_types: Option<Vec<DataType>>,
    pub(crate) distinct: bool,
    pub(crate) grouped: bool,
    pub(crate) aggregated: bool,
    pub(crate) order_sensitive: bool,
    pub(crate) mergeable: bool,
    pub(crate) updatable: bool,
    pub(crate) insertable: bool,
    pub(crate) simple_limit: bool,
    pub(crate) top_level: bool,
    pub(crate) merged: bool,
    pub(crate) distinct_via_index: bool,
    pub(crate) fast_path: FastPath,
    pub(crate) base_column_map: Vec<Option<usize>>,
    pub(crate) forced_nullable: Vec<bool>,
    pub(crate) passes: PassState,
    pub(crate) config: QueryConfig,
}

impl Default for QuerySpecification {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySpecification {
    /// Creates an empty top-level specification
    pub fn new() -> Self {
        Self {
            ranges: Vec::new(),
            select_items: Vec::new(),
            group_by_items: Vec::new(),
            having_item: None,
            order_items: Vec::new(),
            columns: Vec::new(),
            zones: ZoneBounds::default(),
            where_clause: None,
            offset: None,
            limit: None,
            explicit_names: None,
            union_types: None,
            distinct: false,
            grouped: false,
            aggregated: false,
            order_sensitive: false,
            mergeable: false,
            updatable: false,
            insertable: false,
            simple_limit: false,
            top_level: true,
            merged: false,
            distinct_via_index: false,
            fast_path: FastPath::None,
            base_column_map: Vec::new(),
            forced_nullable: Vec::new(),
            passes: PassState::default(),
            config: QueryConfig::default(),
        }
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Replaces the configuration; nested subqueries inherit it
    pub fn set_config(&mut self, config: QueryConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Appends a FROM clause entry
    pub fn add_range(&mut self, range: RangeVariable) -> &mut Self {
        self.ranges.push(range);
        self
    }

    /// Appends a plain FROM clause entry over `source`
    pub fn from_source(&mut self, source: Arc<dyn RangeSource>) -> &mut Self {
        self.add_range(RangeVariable::new(source))
    }

    /// Appends a SELECT list entry
    pub fn add_select(&mut self, expr: Expression, alias: Option<&str>) -> &mut Self {
        self.select_items.push(SelectItem::Expr {
            expr,
            alias: alias.map(str::to_string),
        });
        self
    }

    /// Appends an unaliased SELECT list entry
    pub fn add_column(&mut self, expr: Expression) -> &mut Self {
        self.add_select(expr, None)
    }

    /// Appends `*` or `qualifier.*`
    pub fn add_wildcard(&mut self, qualifier: Option<&str>) -> &mut Self {
        self.select_items
            .push(SelectItem::Wildcard(qualifier.map(str::to_string)));
        self
    }

    pub fn set_where(&mut self, condition: Expression) -> &mut Self {
        self.where_clause = Some(condition);
        self
    }

    pub fn add_group_by(&mut self, expr: Expression) -> &mut Self {
        self.group_by_items.push(expr);
        self
    }

    pub fn set_having(&mut self, condition: Expression) -> &mut Self {
        self.having_item = Some(condition);
        self
    }

    pub fn add_order_by(&mut self, item: OrderItem) -> &mut Self {
        self.order_items.push(item);
        self
    }

    /// OFFSET, a literal or parameter
    pub fn set_offset(&mut self, offset: Expression) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// LIMIT, a literal or parameter
    pub fn set_limit(&mut self, limit: Expression) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Explicit result column names, as in `AS v(a, b)`
    pub fn set_column_names(&mut self, names: Vec<String>) -> &mut Self {
        self.explicit_names = Some(names);
        self
    }

    /// Widens the visible column types with those of another set operation
    /// branch
    ///
    /// Must be called between the first and second type passes.
    pub fn union_types_with(&mut self, other: &[DataType]) -> Result<()> {
        if !self.passes.types_one {
            return Err(Error::NotResolved("type pass one"));
        }
        if self.passes.types_two {
            return Err(Error::internal("column types already finalized"));
        }
        let visible = self.zones.visible_end;
        if other.len() != visible {
            return Err(Error::ColumnCountMismatch {
                expected: visible,
                got: other.len(),
            });
        }
        let mut merged = match self.union_types.take() {
            Some(types) => types,
            None => self.columns[..visible].iter().map(|c| c.data_type).collect(),
        };
        for (t, o) in merged.iter_mut().zip(other) {
            *t = t.aggregate_type(*o)?;
        }
        self.union_types = Some(merged);
        Ok(())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Runs every resolution pass
    pub fn resolve(&mut self) -> Result<()> {
        self.resolve_references()?;
        self.resolve_types()
    }

    /// Runs the three type passes
    pub fn resolve_types(&mut self) -> Result<()> {
        self.resolve_types_part_one()?;
        self.resolve_types_part_two()?;
        self.resolve_types_part_three()
    }

    pub fn is_resolved(&self) -> bool {
        self.passes.types_three
    }

    pub(crate) fn require_resolved(&self) -> Result<()> {
        if self.is_resolved() {
            Ok(())
        } else {
            Err(Error::NotResolved("query specification"))
        }
    }

    pub(crate) fn refresh_zones(&mut self) {
        self.zones = ZoneBounds::compute(&self.columns);
    }

    /// Positions of the columns in `zone`
    pub(crate) fn zone(&self, zone: Zone) -> Range<usize> {
        self.zones.range(zone)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Executes the query
    ///
    /// `max_rows` caps the number of returned rows; 0 means no cap.
    pub fn execute(&self, ctx: &ExecutionContext, max_rows: usize) -> Result<MaterializedResult> {
        self.require_resolved()?;
        self.materialize(ctx, None, max_rows)
    }

    /// Executes as a subquery of the row in `outer`
    pub(crate) fn execute_nested(
        &self,
        outer: &RowContext<'_>,
        max_rows: usize,
    ) -> Result<MaterializedResult> {
        self.require_resolved()?;
        self.materialize(outer.exec, Some(outer), max_rows)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Result column names
    pub fn column_names(&self) -> Vec<String> {
        self.visible_columns().iter().map(|c| c.name.clone()).collect()
    }

    /// Result column types
    pub fn column_types(&self) -> Vec<DataType> {
        self.visible_columns().iter().map(|c| c.data_type).collect()
    }

    /// Result column nullability
    pub fn column_nullability(&self) -> Vec<bool> {
        self.visible_columns().iter().map(|c| c.nullable).collect()
    }

    /// Schema of the result rows, named `table_name`
    pub fn result_schema(&self, table_name: &str) -> Schema {
        let columns = self
            .visible_columns()
            .iter()
            .enumerate()
            .map(|(i, c)| SchemaColumn::new(i, c.name.clone(), c.data_type, c.nullable, false))
            .collect();
        Schema::new(table_name, columns)
    }

    pub fn columns(&self) -> &[QueryColumn] {
        &self.columns
    }

    pub fn zones(&self) -> ZoneBounds {
        self.zones
    }

    pub(crate) fn visible_columns(&self) -> &[QueryColumn] {
        &self.columns[..self.zones.visible_end.min(self.columns.len())]
    }

    pub fn ranges(&self) -> &[RangeVariable] {
        &self.ranges
    }

    pub fn where_clause(&self) -> Option<&Expression> {
        self.where_clause.as_ref()
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn is_order_sensitive(&self) -> bool {
        self.order_sensitive
    }

    pub fn is_mergeable(&self) -> bool {
        self.mergeable
    }

    /// True once this query was merged with the derived table it ranged over
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    pub fn is_insertable(&self) -> bool {
        self.insertable
    }

    /// Maps each visible column to a base table column
    pub fn base_table_column_map(&self) -> &[Option<usize>] {
        &self.base_column_map
    }

    /// Schema of the table rows are updated in, when updatable
    pub fn base_schema(&self) -> Option<&Schema> {
        if !self.updatable {
            return None;
        }
        self.ranges.first().and_then(|r| r.source.base_schema())
    }

    /// True if the result is produced from the cached row count
    pub fn uses_count_fast_path(&self) -> bool {
        matches!(self.fast_path, FastPath::CountStar)
    }

    /// True if a single MIN/MAX is rewritten to `ORDER BY ... LIMIT 1`
    pub fn uses_min_max_rewrite(&self) -> bool {
        matches!(self.fast_path, FastPath::MinMax(_))
    }

    /// True if DISTINCT is guaranteed by a unique index
    pub fn uses_distinct_index(&self) -> bool {
        self.distinct_via_index
    }

    /// Every nested subquery, in discovery order, including subqueries of
    /// subqueries
    pub fn subqueries(&self) -> Vec<&QuerySpecification> {
        let mut out = Vec::new();
        for expr in self.expressions() {
            for sq in expr.subqueries() {
                out.push(sq.query.as_ref());
                out.extend(sq.query.subqueries());
            }
        }
        out
    }

    /// Names of every table this query reads, directly or through derived
    /// tables and subqueries
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let add = |name: String, names: &mut Vec<String>| {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        };
        for range in &self.ranges {
            add(range.source.name().to_string(), &mut names);
            if let Some(query) = range.source.as_query() {
                for name in query.table_names() {
                    add(name, &mut names);
                }
            }
        }
        for sq in self.subqueries() {
            for range in &sq.ranges {
                add(range.source.name().to_string(), &mut names);
            }
        }
        names
    }

    /// Every expression owned by this query, excluding nested subqueries
    pub(crate) fn expressions(&self) -> Vec<&Expression> {
        let mut out: Vec<&Expression> = Vec::new();
        if self.passes.references {
            out.extend(self.columns.iter().map(|c| &c.expr));
        } else {
            for item in &self.select_items {
                if let SelectItem::Expr { expr, .. } = item {
                    out.push(expr);
                }
            }
            out.extend(self.group_by_items.iter());
            out.extend(self.having_item.iter());
            out.extend(self.order_items.iter().map(|o| &o.expr));
        }
        out.extend(self.where_clause.iter());
        out.extend(self.ranges.iter().filter_map(|r| r.condition.as_ref()));
        out
    }

    /// True if any owned expression contains a subquery
    pub(crate) fn has_subqueries(&self) -> bool {
        self.expressions().iter().any(|e| e.contains_subquery())
    }

    /// Multi-line description of the resolved state
    pub fn describe(&self) -> String {
        let mut sb = String::new();
        sb.push_str(&format!("isDistinctSelect=[{}]\n", self.distinct));
        sb.push_str(&format!("isGrouped=[{}]\n", self.grouped));
        sb.push_str(&format!("isAggregated=[{}]\n", self.aggregated));
        sb.push_str(&format!("isUpdatable=[{}]\n", self.updatable));
        sb.push_str(&format!("isInsertable=[{}]\n", self.insertable));
        sb.push_str(&format!("isMergeable=[{}]\n", self.mergeable));
        let z = self.zones;
        sb.push_str(&format!(
            "zones=[visible={} rowid={} group={} having={} order={} aggregate={}]\n",
            z.visible_end, z.row_id_end, z.group_by_end, z.having_end, z.order_by_end, z.aggregate_end
        ));
        sb.push_str("columns=[");
        for (i, c) in self.columns.iter().enumerate() {
            sb.push_str(&format!(
                "\n  {} {:?} {} {}{}",
                i,
                c.zone,
                c.expr,
                c.data_type,
                if c.nullable { "" } else { " NOT NULL" }
            ));
        }
        sb.push_str("\n]\n");
        for (i, range) in self.ranges.iter().enumerate() {
            sb.push_str(&format!("range variable {}\n", i + 1));
            sb.push_str(&format!("  table=[{}]\n", range.source.name()));
            sb.push_str(&format!("  alias=[{}]\n", range.name()));
            sb.push_str(&format!("  joinType=[{}]\n", range.join_type));
            let cond = range
                .condition
                .as_ref()
                .map_or_else(|| "null".to_string(), |c| c.to_string());
            sb.push_str(&format!("  joinCondition=[{}]\n", cond));
        }
        let cond = self
            .where_clause
            .as_ref()
            .map_or_else(|| "null".to_string(), |c| c.to_string());
        sb.push_str(&format!("queryCondition=[{}]\n", cond));
        let having = self
            .zone(Zone::Having)
            .next()
            .map_or_else(|| "null".to_string(), |i| self.columns[i].expr.to_string());
        sb.push_str(&format!("havingCondition=[{}]\n", having));
        let groups: Vec<String> = self
            .zone(Zone::GroupBy)
            .map(|i| self.columns[i].expr.to_string())
            .collect();
        sb.push_str(&format!("groupColumns=[{}]\n", groups.join(", ")));
        let fast = match self.fast_path {
            FastPath::None => "none",
            FastPath::CountStar => "count(*)",
            FastPath::MinMax(_) => "min/max",
        };
        sb.push_str(&format!("fastPath=[{}]\n", fast));
        sb
    }
}

impl fmt::Debug for QuerySpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpecification")
            .field("sql", &self.to_string())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Renders the query as SQL
impl fmt::Display for QuerySpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.passes.references {
            for (i, c) in self.visible_columns().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", c.expr)?;
                if let Some(alias) = &c.alias {
                    write!(f, " AS {}", alias)?;
                }
            }
        } else {
            for (i, item) in self.select_items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match item {
                    SelectItem::Expr { expr, alias } => {
                        write!(f, "{}", expr)?;
                        if let Some(alias) = alias {
                            write!(f, " AS {}", alias)?;
                        }
                    }
                    SelectItem::Wildcard(Some(q)) => write!(f, "{}.*", q)?,
                    SelectItem::Wildcard(None) => write!(f, "*")?,
                }
            }
        }

        for (i, range) in self.ranges.iter().enumerate() {
            if i == 0 {
                write!(f, " FROM {}", range)?;
                continue;
            }
            write!(f, " {} {}", range.join_type, range)?;
            if !range.using.is_empty() {
                write!(f, " USING ({})", range.using.join(", "))?;
            } else if let Some(cond) = &range.condition {
                write!(f, " ON {}", cond)?;
            }
        }

        if let Some(cond) = &self.where_clause {
            write!(f, " WHERE {}", cond)?;
        }

        let (groups, having, orders): (Vec<String>, Option<String>, Vec<String>) =
            if self.passes.references {
                (
                    self.zone(Zone::GroupBy)
                        .map(|i| self.columns[i].expr.to_string())
                        .collect(),
                    self.zone(Zone::Having)
                        .next()
                        .map(|i| self.columns[i].expr.to_string()),
                    self.zone(Zone::OrderBy)
                        .map(|i| {
                            let c = &self.columns[i];
                            let desc = c.sort.is_some_and(|s| s.descending);
                            format!("{}{}", c.expr, if desc { " DESC" } else { "" })
                        })
                        .collect(),
                )
            } else {
                (
                    self.group_by_items.iter().map(|e| e.to_string()).collect(),
                    self.having_item.as_ref().map(|e| e.to_string()),
                    self.order_items
                        .iter()
                        .map(|o| format!("{}{}", o.expr, if o.descending { " DESC" } else { "" }))
                        .collect(),
                )
            };
        if !groups.is_empty() {
            write!(f, " GROUP BY {}", groups.join(", "))?;
        }
        if let Some(having) = having {
            write!(f, " HAVING {}", having)?;
        }
        if !orders.is_empty() {
            write!(f, " ORDER BY {}", orders.join(", "))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}
