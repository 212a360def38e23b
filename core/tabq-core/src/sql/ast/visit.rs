//! Expression tree traversal
//!
//! `children` never crosses into subqueries: a subquery is a separate scope
//! and its aggregates or analytic calls belong to it. The `try_for_each_*`
//! walkers do descend into subqueries and are used for whole-statement passes
//! such as function binding.

use super::*;
use crate::error::QueryResult;

/// Direct child expressions of `expr` (subqueries excluded).
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Literal(_) | Expr::Column(_) | Expr::AllColumns(_) | Expr::Variable(_) => Vec::new(),
        Expr::Exists(_) | Expr::Subquery(_) => Vec::new(),
        Expr::Arithmetic { left, right, .. } | Expr::Comparison { left, right, .. } => vec![&**left, &**right],
        Expr::And(l, r) | Expr::Or(l, r) => vec![&**l, &**r],
        Expr::UnaryMinus(e) | Expr::Not(e) => vec![&**e],
        Expr::Concat(items) => items.iter().collect(),
        Expr::Is { expr, .. } => vec![&**expr],
        Expr::Between { expr, low, high, .. } => vec![&**expr, &**low, &**high],
        Expr::Like { expr, pattern, .. } => vec![&**expr, &**pattern],
        Expr::InList { expr, list, .. } => std::iter::once(&**expr).chain(list.iter()).collect(),
        Expr::InSubquery { expr, .. } => vec![&**expr],
        Expr::Quantified { left, .. } => vec![&**left],
        Expr::Case { operand, branches, else_result } => {
            let mut out: Vec<&Expr> = Vec::new();
            if let Some(op) = operand {
                out.push(op);
            }
            for (when, then) in branches {
                out.push(when);
                out.push(then);
            }
            if let Some(e) = else_result {
                out.push(e);
            }
            out
        }
        Expr::Function(call) => call.args.iter().collect(),
        Expr::Analytic(call) => call
            .function
            .args
            .iter()
            .chain(call.partition_by.iter())
            .chain(call.order_by.iter().map(|o| &o.expr))
            .collect(),
    }
}

/// Subqueries directly attached to `expr`.
pub fn subqueries(expr: &Expr) -> Vec<&SelectQuery> {
    match expr {
        Expr::InSubquery { query, .. } | Expr::Quantified { query, .. } => vec![&**query],
        Expr::Exists(query) | Expr::Subquery(query) => vec![&**query],
        _ => Vec::new(),
    }
}

/// True when `pred` holds for `expr` or any descendant in the same scope.
/// `descend_analytic` controls whether the arguments of analytic calls are visited.
pub fn any_in_scope(expr: &Expr, descend_analytic: bool, pred: &impl Fn(&Expr) -> bool) -> bool {
    if pred(expr) {
        return true;
    }
    if matches!(expr, Expr::Analytic(_)) && !descend_analytic {
        return false;
    }
    children(expr).into_iter().any(|c| any_in_scope(c, descend_analytic, pred))
}

/// Collect analytic calls of one scope in first-appearance order, without duplicates.
pub fn collect_analytic<'a>(expr: &'a Expr, out: &mut Vec<&'a AnalyticCall>) {
    if let Expr::Analytic(call) = expr {
        if !out.iter().any(|c| *c == call) {
            out.push(call);
        }
        return;
    }
    for child in children(expr) {
        collect_analytic(child, out);
    }
}

/// Visit every expression of `expr`, including those inside subqueries.
pub fn try_for_each_expr<F>(expr: &Expr, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    walk(expr, f)
}

fn walk<F>(expr: &Expr, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    f(expr)?;
    for child in children(expr) {
        walk(child, f)?;
    }
    for query in subqueries(expr) {
        try_for_each_in_query(query, f)?;
    }
    Ok(())
}

/// Visit every expression of a query.
pub fn try_for_each_in_query<F>(query: &SelectQuery, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    for table in &query.with {
        try_for_each_in_query(&table.query, f)?;
    }
    walk_body(&query.body, f)?;
    for item in &query.order_by {
        walk(&item.expr, f)?;
    }
    if let Some(limit) = &query.limit {
        walk(&limit.count, f)?;
    }
    if let Some(offset) = &query.offset {
        walk(offset, f)?;
    }
    Ok(())
}

fn walk_body<F>(body: &QueryBody, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    match body {
        QueryBody::Entity(entity) => {
            for field in &entity.fields {
                walk(&field.expr, f)?;
            }
            for table in &entity.from {
                walk_table(table, f)?;
            }
            for e in entity.where_clause.iter().chain(entity.group_by.iter()).chain(entity.having.iter()) {
                walk(e, f)?;
            }
            Ok(())
        }
        QueryBody::SetOperation { left, right, .. } => {
            walk_body(left, f)?;
            walk_body(right, f)
        }
    }
}

fn walk_table<F>(table: &TableExpr, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    match table {
        TableExpr::Table { .. } => Ok(()),
        TableExpr::Subquery { query, .. } => try_for_each_in_query(query, f),
        TableExpr::Join(join) => {
            walk_table(&join.left, f)?;
            walk_table(&join.right, f)?;
            if let JoinConstraint::On(cond) = &join.constraint {
                walk(cond, f)?;
            }
            Ok(())
        }
    }
}

/// Visit every expression of a statement.
pub fn try_for_each_in_statement<F>(statement: &Statement, f: &mut F) -> QueryResult<()>
where
    F: FnMut(&Expr) -> QueryResult<()>,
{
    match statement {
        Statement::Select(query) => try_for_each_in_query(query, f),
        Statement::Insert(insert) => match &insert.source {
            InsertSource::Values(rows) => {
                for e in rows.iter().flatten() {
                    walk(e, f)?;
                }
                Ok(())
            }
            InsertSource::Query(query) => try_for_each_in_query(query, f),
        },
        Statement::Update(update) => {
            for (_, e) in &update.assignments {
                walk(e, f)?;
            }
            if let Some(cond) = &update.where_clause {
                walk(cond, f)?;
            }
            Ok(())
        }
        Statement::Delete(delete) => match &delete.where_clause {
            Some(cond) => walk(cond, f),
            None => Ok(()),
        },
        Statement::AlterTable(alter) => {
            if let AlterOperation::Add { columns, .. } = &alter.operation {
                for e in columns.iter().filter_map(|c| c.default.as_ref()) {
                    walk(e, f)?;
                }
            }
            Ok(())
        }
        Statement::DeclareVariable(vars) => {
            for e in vars.iter().filter_map(|(_, e)| e.as_ref()) {
                walk(e, f)?;
            }
            Ok(())
        }
        Statement::SetVariable { value, .. } => walk(value, f),
    }
}
