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

//! Reference resolution
//!
//! Binds every column reference of a query specification to a range
//! variable, expands wildcards, synthesizes USING join conditions, resolves
//! GROUP BY and ORDER BY aliases and lays the column list out in zone order.

use crate::core::{Error, Result};
use crate::expr::{and_conditions, ColumnBinding, ColumnRef, Expression, FunctionCall};
use crate::functions::global_registry;

use super::config::QueryConfig;
use super::query_spec::{QueryColumn, QuerySpecification, SelectItem, Zone};
use super::range::RangeVariable;

/// Ranges visible to an expression, chained to enclosing queries
///
/// Binding depth grows by one per `parent` hop.
pub(crate) struct Scope<'a> {
    ranges: &'a [RangeVariable],
    limit: usize,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(ranges: &'a [RangeVariable], parent: Option<&'a Scope<'a>>) -> Self {
        Self::limited(ranges, ranges.len(), parent)
    }

    /// Only the first `limit` ranges are visible, as in a join condition
    pub fn limited(
        ranges: &'a [RangeVariable],
        limit: usize,
        parent: Option<&'a Scope<'a>>,
    ) -> Self {
        Self {
            ranges,
            limit: limit.min(ranges.len()),
            parent,
        }
    }

    /// Finds the binding for `col`, innermost scope first
    pub fn bind(&self, col: &ColumnRef) -> Result<ColumnBinding> {
        self.locate(col).map(|(binding, _)| binding)
    }

    /// Coalesced expression for an unqualified USING column of a RIGHT or
    /// FULL join, whose left copy is NULL on replayed rows
    pub fn named_join_column(&self, col: &ColumnRef) -> Result<Option<Expression>> {
        if col.qualifier.is_some() {
            return Ok(None);
        }
        let (binding, scope) = self.locate(col)?;
        scope.coalesce_using(binding)
    }

    fn locate(&self, col: &ColumnRef) -> Result<(ColumnBinding, &Scope<'a>)> {
        let mut scope: Option<&Scope<'a>> = Some(self);
        let mut depth = 0;
        let mut qualifier_seen = false;
        while let Some(s) = scope {
            if let Some(mut binding) = s.lookup(col, &mut qualifier_seen)? {
                binding.depth = depth;
                return Ok((binding, s));
            }
            scope = s.parent;
            depth += 1;
        }
        match &col.qualifier {
            Some(q) if !qualifier_seen => Err(Error::TableNotFound(q.clone())),
            Some(q) => Err(Error::ColumnNotFound(format!("{}.{}", q, col.name))),
            None => Err(Error::ColumnNotFound(col.name.clone())),
        }
    }

    /// Wraps the left copy `b` in COALESCE with the right copy of every
    /// later right outer range joined to it by USING
    fn coalesce_using(&self, b: ColumnBinding) -> Result<Option<Expression>> {
        let mut named: Option<Expression> = None;
        for j in b.range + 1..self.limit {
            let range = &self.ranges[j];
            if !range.join_type.is_right_outer() {
                continue;
            }
            let Some(c) = range.using_partner(b.range, b.column) else {
                continue;
            };
            let left = match named.take() {
                Some(e) => e,
                None => bound_at(&self.ranges[b.range], b.range, b.column, b.depth)?,
            };
            let right = bound_at(range, j, c, b.depth)?;
            named = Some(coalesce(left, right)?);
        }
        Ok(named)
    }

    fn lookup(&self, col: &ColumnRef, qualifier_seen: &mut bool) -> Result<Option<ColumnBinding>> {
        let mut found: Option<ColumnBinding> = None;
        for (r, range) in self.ranges[..self.limit].iter().enumerate() {
            if let Some(q) = &col.qualifier {
                if !range.matches_qualifier(q) {
                    continue;
                }
                *qualifier_seen = true;
            }
            let Some(c) = range.find_column(&col.name) else {
                continue;
            };
            if col.qualifier.is_none() && range.is_using_column(c) {
                continue;
            }
            if found.is_some() {
                return Err(Error::AmbiguousColumn(col.name.clone()));
            }
            found = Some(binding_for(range, r, c)?);
        }
        Ok(found)
    }
}

fn binding_for(range: &RangeVariable, r: usize, c: usize) -> Result<ColumnBinding> {
    let column = range
        .schema()
        .get_column(c)
        .ok_or_else(|| Error::internal(format!("column {} missing in {}", c, range.name())))?;
    Ok(ColumnBinding {
        depth: 0,
        range: r,
        column: c,
        data_type: column.data_type,
        nullable: column.nullable,
    })
}

pub(super) fn bound_column(range: &RangeVariable, r: usize, c: usize) -> Result<Expression> {
    bound_at(range, r, c, 0)
}

fn bound_at(range: &RangeVariable, r: usize, c: usize, depth: usize) -> Result<Expression> {
    let mut binding = binding_for(range, r, c)?;
    binding.depth = depth;
    let name = range.schema().columns[c].name.clone();
    Ok(Expression::Column(ColumnRef {
        qualifier: Some(range.name().to_string()),
        name,
        binding: Some(binding),
    }))
}

fn coalesce(left: Expression, right: Expression) -> Result<Expression> {
    let func = global_registry()
        .get_scalar("COALESCE")
        .ok_or_else(|| Error::FunctionNotFound("COALESCE".to_string()))?;
    Ok(Expression::Function(FunctionCall {
        name: "COALESCE".to_string(),
        args: vec![left, right],
        func: Some(func),
    }))
}

/// Binds columns, functions and nested subqueries of `expr`
pub(crate) fn resolve_expression(
    expr: &mut Expression,
    scope: &Scope<'_>,
    config: &QueryConfig,
) -> Result<()> {
    match expr {
        Expression::Column(c) => {
            if c.binding.is_none() {
                if let Some(named) = scope.named_join_column(c)? {
                    *expr = named;
                } else {
                    c.binding = Some(scope.bind(c)?);
                }
            }
            Ok(())
        }
        Expression::Function(call) => {
            for arg in call.args.iter_mut() {
                resolve_expression(arg, scope, config)?;
            }
            if call.func.is_none() {
                let func = global_registry()
                    .get_scalar(&call.name)
                    .ok_or_else(|| Error::FunctionNotFound(call.name.clone()))?;
                func.info()
                    .signature
                    .validate_arg_count(&call.name, call.args.len())?;
                call.func = Some(func);
            }
            Ok(())
        }
        Expression::ScalarSubquery(sq) | Expression::Exists(sq) => {
            sq.query.resolve_nested(scope, config)
        }
        _ => {
            for child in expr.children_mut() {
                resolve_expression(child, scope, config)?;
            }
            Ok(())
        }
    }
}

/// Appends the bindings at `level` found in `expr` and its subqueries
fn collect_bindings(expr: &Expression, level: usize, out: &mut Vec<ColumnBinding>) {
    expr.for_each(&mut |e| match e {
        Expression::Column(c) => {
            if let Some(b) = c.binding {
                if b.depth == level {
                    out.push(b);
                }
            }
        }
        Expression::ScalarSubquery(sq) | Expression::Exists(sq) => {
            for inner in sq.query.expressions() {
                collect_bindings(inner, level + 1, out);
            }
        }
        _ => {}
    });
}

fn expand_wildcard(
    ranges: &[RangeVariable],
    qualifier: Option<&str>,
    columns: &mut Vec<QueryColumn>,
) -> Result<()> {
    let scope = Scope::new(ranges, None);
    let mut matched = false;
    for (r, range) in ranges.iter().enumerate() {
        if let Some(q) = qualifier {
            if !range.matches_qualifier(q) {
                continue;
            }
        }
        matched = true;
        for c in 0..range.width() {
            if qualifier.is_some() {
                columns.push(QueryColumn::new(Zone::Visible, bound_column(range, r, c)?));
                continue;
            }
            if range.is_using_column(c) {
                continue;
            }
            let column = match scope.coalesce_using(binding_for(range, r, c)?)? {
                Some(named) => {
                    let mut column = QueryColumn::new(Zone::Visible, named);
                    column.using_name = Some(range.schema().columns[c].name.clone());
                    column
                }
                None => QueryColumn::new(Zone::Visible, bound_column(range, r, c)?),
            };
            columns.push(column);
        }
    }
    match qualifier {
        Some(q) if !matched => Err(Error::TableNotFound(q.to_string())),
        _ => Ok(()),
    }
}

/// Looks an unqualified GROUP BY name up among the SELECT aliases
fn group_by_alias(item: &Expression, visible: &[QueryColumn]) -> Result<Option<Expression>> {
    let Expression::Column(c) = item else {
        return Ok(None);
    };
    if c.qualifier.is_some() {
        return Ok(None);
    }
    let mut matches = visible.iter().filter(|v| {
        v.alias
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(&c.name))
    });
    match (matches.next(), matches.next()) {
        (None, _) => Ok(None),
        (Some(v), None) => Ok(Some(v.expr.clone())),
        (Some(_), Some(_)) => Err(Error::AmbiguousGroupByAlias(c.name.clone())),
    }
}

/// Resolves one ORDER BY expression
///
/// Returns the bound expression and the visible column it reads, if any.
fn resolve_order_expr(
    item: &Expression,
    visible: &[QueryColumn],
    own: &Scope<'_>,
    full: &Scope<'_>,
    config: &QueryConfig,
) -> Result<(Expression, Option<usize>)> {
    if let Expression::Literal(crate::core::Value::Integer(n)) = item {
        if *n < 1 || *n as usize > visible.len() {
            return Err(Error::InvalidOrderBy(item.to_string()));
        }
        let i = *n as usize - 1;
        return Ok((visible[i].expr.clone(), Some(i)));
    }
    // only integer constants are ordinals, and a predicate is no sort key
    if item.is_literal() || item.is_predicate() {
        return Err(Error::InvalidOrderBy(item.to_string()));
    }

    if let Expression::Column(c) = item {
        if c.qualifier.is_none() && c.binding.is_none() {
            match own.bind(c) {
                Ok(_) => {}
                Err(Error::ColumnNotFound(_)) => {
                    let mut matches = visible.iter().enumerate().filter(|(_, v)| {
                        v.alias
                            .as_deref()
                            .is_some_and(|a| a.eq_ignore_ascii_case(&c.name))
                    });
                    if let Some((i, v)) = matches.next() {
                        if matches.next().is_some() {
                            return Err(Error::AmbiguousColumn(c.name.clone()));
                        }
                        return Ok((v.expr.clone(), Some(i)));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    let mut expr = item.clone();
    resolve_expression(&mut expr, full, config)?;
    let visible_ref = visible.iter().position(|v| v.expr == expr);
    Ok((expr, visible_ref))
}

impl QuerySpecification {
    /// Binds every reference of this query, which must be top level or have
    /// no correlated references
    pub fn resolve_references(&mut self) -> Result<()> {
        self.resolve_references_in(None)
    }

    /// Resolves a subquery inside the scope of its enclosing query
    pub(crate) fn resolve_nested(&mut self, scope: &Scope<'_>, config: &QueryConfig) -> Result<()> {
        if !self.passes.references {
            self.top_level = false;
            self.config = config.clone();
            self.resolve_references_in(Some(scope))?;
        }
        self.resolve_types()
    }

    pub(crate) fn resolve_references_in(&mut self, parent: Option<&Scope<'_>>) -> Result<()> {
        if self.passes.references {
            return Ok(());
        }
        self.resolve_using()?;
        self.resolve_join_conditions(parent)?;

        let scope = Scope::new(&self.ranges, parent);
        let own = Scope::new(&self.ranges, None);

        let mut columns: Vec<QueryColumn> = Vec::new();
        for item in &self.select_items {
            match item {
                SelectItem::Expr { expr, alias } => {
                    let mut resolved = expr.clone();
                    resolve_expression(&mut resolved, &scope, &self.config)?;
                    let mut column = QueryColumn::new(Zone::Visible, resolved);
                    column.alias = alias.clone();
                    if column.expr.as_column().is_none() {
                        column.using_name = expr.as_column().map(|c| c.name.clone());
                    }
                    columns.push(column);
                }
                SelectItem::Wildcard(q) => expand_wildcard(&self.ranges, q.as_deref(), &mut columns)?,
            }
        }
        if columns.is_empty() {
            return Err(Error::invalid_argument("select list is empty"));
        }
        let visible = columns.len();

        let mut where_clause = self.where_clause.clone();
        if let Some(cond) = where_clause.as_mut() {
            resolve_expression(cond, &scope, &self.config)?;
        }

        for item in &self.group_by_items {
            let mut expr = item.clone();
            match resolve_expression(&mut expr, &scope, &self.config) {
                Ok(()) => {}
                Err(Error::ColumnNotFound(name)) => {
                    expr = group_by_alias(item, &columns[..visible])?
                        .ok_or(Error::ColumnNotFound(name))?;
                }
                Err(e) => return Err(e),
            }
            columns.push(QueryColumn::new(Zone::GroupBy, expr));
        }

        if let Some(having) = &self.having_item {
            let mut expr = having.clone();
            resolve_expression(&mut expr, &scope, &self.config)?;
            columns.push(QueryColumn::new(Zone::Having, expr));
        }

        for item in &self.order_items {
            let (expr, visible_ref) =
                resolve_order_expr(&item.expr, &columns[..visible], &own, &scope, &self.config)?;
            let mut column = QueryColumn::new(Zone::OrderBy, expr);
            column.visible_ref = visible_ref;
            column.sort = Some(item.sort_spec());
            columns.push(column);
        }

        for (clause, bound) in [("OFFSET", &self.offset), ("LIMIT", &self.limit)] {
            if let Some(e) = bound {
                if !matches!(e, Expression::Literal(_) | Expression::Parameter(_)) {
                    return Err(Error::InvalidLimit {
                        clause,
                        value: e.to_string(),
                    });
                }
            }
        }

        self.where_clause = where_clause;
        self.columns = columns;
        self.refresh_zones();
        self.passes.references = true;
        self.mark_used_columns();
        log::debug!(
            "resolved references: {} columns over {} ranges",
            self.columns.len(),
            self.ranges.len()
        );
        Ok(())
    }

    /// Synthesizes the equi-join condition of each USING range
    fn resolve_using(&mut self) -> Result<()> {
        for i in 1..self.ranges.len() {
            if self.ranges[i].using.is_empty() || !self.ranges[i].using_columns.is_empty() {
                continue;
            }
            let mut condition = None;
            let mut using_columns = Vec::new();
            let mut using_left = Vec::new();
            {
                let left_scope = Scope::limited(&self.ranges, i, None);
                let right = &self.ranges[i];
                for name in &right.using {
                    let col = ColumnRef::new(None, name);
                    let left = left_scope.bind(&col)?;
                    let c = right
                        .find_column(name)
                        .ok_or_else(|| Error::ColumnNotFound(format!("{}.{}", right.name(), name)))?;
                    let left_expr = match left_scope.named_join_column(&col)? {
                        Some(named) => named,
                        None => bound_column(&self.ranges[left.range], left.range, left.column)?,
                    };
                    let eq = Expression::equal(left_expr, bound_column(right, i, c)?);
                    condition = and_conditions(condition, Some(eq));
                    using_columns.push(c);
                    using_left.push((left.range, left.column));
                }
            }
            let range = &mut self.ranges[i];
            range.condition = and_conditions(condition, range.condition.take());
            range.using_columns = using_columns;
            range.using_left = using_left;
        }
        Ok(())
    }

    /// Each join condition sees its own range and the ranges before it
    fn resolve_join_conditions(&mut self, parent: Option<&Scope<'_>>) -> Result<()> {
        for i in 0..self.ranges.len() {
            let Some(mut cond) = self.ranges[i].condition.take() else {
                continue;
            };
            let result = {
                let scope = Scope::limited(&self.ranges, i + 1, parent);
                resolve_expression(&mut cond, &scope, &self.config)
            };
            self.ranges[i].condition = Some(cond);
            result?;
        }
        Ok(())
    }

    /// Flags every range column read by this query or its subqueries
    pub(crate) fn mark_used_columns(&mut self) {
        let mut used = Vec::new();
        for expr in self.expressions() {
            collect_bindings(expr, 0, &mut used);
        }
        for b in used {
            if let Some(range) = self.ranges.get_mut(b.range) {
                range.mark_used(b.column);
            }
        }
    }
}
