//! SELECT pipeline
//!
//! 고정된 절 순서로 뷰를 변환합니다:
//!
//! ```text
//! WITH → FROM (join) → WHERE → GROUP BY → HAVING → analytic → SELECT → DISTINCT
//!      → set operation → ORDER BY → OFFSET → LIMIT → fix
//! ```
//!
//! 서브쿼리는 `create_scope()`로 만든 스코프에서 같은 파이프라인을 재귀적으로 실행합니다.

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::visit::collect_analytic;
use crate::sql::ast::{
    AnalyticCall, InlineTable, JoinConstraint, JoinKind, OrderItem, QueryBody, SelectEntity, SelectQuery, TableExpr,
};
use crate::sql::filter::Filter;
use crate::sql::functions::contains_aggregate;
use crate::view::View;
use std::sync::Arc;

/// Run a query in the scope of `filter` and return the fixed result view.
pub fn run_query(query: &SelectQuery, filter: &Filter<'_>) -> QueryResult<View> {
    let scope = inline_tables(&query.with, filter)?;

    let mut view = match &query.body {
        QueryBody::Entity(entity) => run_entity(entity, &query.order_by, &scope)?,
        body => run_body(body, &scope)?,
    };
    if !query.order_by.is_empty() {
        view = view.order_by(&query.order_by, &scope)?;
    }
    if let Some(offset) = &query.offset {
        view = view.offset(offset, &scope)?;
    }
    if let Some(limit) = &query.limit {
        view = view.limit(limit, &query.order_by, &scope)?;
    }

    let view = view.fix();
    tracing::debug!(target: "tabq::select", depth = filter.depth(), records = view.len(), "query finished");
    Ok(view)
}

/// Evaluate the WITH clause; each inline table sees the ones declared before it.
fn inline_tables<'a>(tables: &[InlineTable], filter: &Filter<'a>) -> QueryResult<Filter<'a>> {
    let mut scope = filter.clone();
    for table in tables {
        let mut view = run_query(&table.query, &scope)?;
        if !table.columns.is_empty() {
            if table.columns.len() != view.field_count() {
                return Err(QueryError::FieldLengthNotMatch {
                    expected: view.field_count(),
                    actual: table.columns.len(),
                });
            }
            for (i, name) in table.columns.iter().enumerate() {
                view.header.rename_field(i, name);
            }
        }
        view.header.update_qualifier(&table.name);
        scope = scope.with_inline_tables(vec![(table.name.clone(), view)]);
    }
    Ok(scope)
}

/// Set operation operands are fixed before they are combined.
fn run_body(body: &QueryBody, filter: &Filter<'_>) -> QueryResult<View> {
    match body {
        QueryBody::Entity(entity) => Ok(run_entity(entity, &[], filter)?.fix()),
        QueryBody::SetOperation { left, op, all, right } => {
            let left = run_body(left, filter)?;
            let right = run_body(right, filter)?;
            left.combine(*op, *all, &right)
        }
    }
}

fn run_entity(entity: &SelectEntity, order_by: &[OrderItem], filter: &Filter<'_>) -> QueryResult<View> {
    let functions = &filter.context().functions;
    let clause_exprs = entity
        .fields
        .iter()
        .map(|f| &f.expr)
        .chain(entity.having.iter())
        .chain(order_by.iter().map(|o| &o.expr));
    for expr in clause_exprs.clone() {
        functions.bind_expr(expr)?;
    }

    let mut view = from_clause(&entity.from, filter)?;

    if let Some(condition) = &entity.where_clause {
        functions.bind_expr(condition)?;
        view = view.where_clause(condition, filter)?;
    }

    if !entity.group_by.is_empty() {
        for key in &entity.group_by {
            functions.bind_expr(key)?;
        }
        view = view.group_by(&entity.group_by, filter)?;
    } else if entity.having.is_some() || clause_exprs.clone().any(contains_aggregate) {
        view = view.group_all();
    }

    if let Some(condition) = &entity.having {
        view = view.having(condition, filter)?;
    }

    let mut calls: Vec<&AnalyticCall> = Vec::new();
    for expr in entity.fields.iter().map(|f| &f.expr).chain(order_by.iter().map(|o| &o.expr)) {
        collect_analytic(expr, &mut calls);
    }
    if !calls.is_empty() {
        view = view.analyze(&calls, filter)?;
    }

    view = view.select(&entity.fields, filter)?;
    if entity.distinct {
        view = view.distinct();
    }
    Ok(view)
}

/// FROM: comma separated entries are cross joined; no entry is a one-record view.
fn from_clause(tables: &[TableExpr], filter: &Filter<'_>) -> QueryResult<View> {
    let mut entries = tables.iter();
    let Some(first) = entries.next() else {
        return Ok(View::dual());
    };
    let mut view = table_view(first, filter)?;
    for table in entries {
        let right = table_view(table, filter)?;
        view = view.join(&right, JoinKind::Cross, &JoinConstraint::None, filter)?;
    }
    Ok(view)
}

fn table_view(table: &TableExpr, filter: &Filter<'_>) -> QueryResult<View> {
    match table {
        TableExpr::Table { name, alias } => {
            let mut view = match filter.inline_table(name) {
                Some(view) => Arc::unwrap_or_clone(view),
                None => {
                    let ctx = filter.context();
                    Arc::unwrap_or_clone(ctx.catalog.snapshot(name, ctx.config.wait_timeout)?)
                }
            };
            if let Some(alias) = alias {
                view.header.update_qualifier(alias);
            }
            tracing::debug!(target: "tabq::select", table = %name, records = view.len(), "table loaded");
            Ok(view)
        }
        TableExpr::Subquery { query, alias } => {
            let mut view = run_query(query, &filter.create_scope())?;
            view.header.update_qualifier(alias);
            Ok(view)
        }
        TableExpr::Join(join) => {
            let left = table_view(&join.left, filter)?;
            let right = table_view(&join.right, filter)?;
            left.join(&right, join.kind, &join.constraint, filter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::run_query;
    use crate::catalog::Catalog;
    use crate::config::ExecutionConfig;
    use crate::engine::ParallelExecutionEngine;
    use crate::error::QueryError;
    use crate::sql::ast::*;
    use crate::sql::executor::ParallelQueryExecutor;
    use crate::sql::filter::{Filter, QueryContext, Variables};
    use crate::sql::functions::FunctionRegistry;
    use crate::value::Value;
    use std::sync::Arc;

    fn context() -> QueryContext {
        let catalog = Catalog::new();
        catalog
            .register(
                "emp",
                &["id", "dept", "salary"],
                vec![
                    vec![Value::from(1), Value::from("a"), Value::from(100)],
                    vec![Value::from(2), Value::from("b"), Value::from(200)],
                    vec![Value::from(3), Value::from("a"), Value::from(300)],
                    vec![Value::from(4), Value::from("c"), Value::Null],
                ],
            )
            .unwrap();
        catalog
            .register(
                "dept",
                &["dept", "name"],
                vec![
                    vec![Value::from("a"), Value::from("Sales")],
                    vec![Value::from("b"), Value::from("Ops")],
                ],
            )
            .unwrap();
        let engine = ParallelExecutionEngine::new_fixed(2).unwrap();
        QueryContext::new(
            ExecutionConfig::default(),
            Arc::new(catalog),
            Arc::new(FunctionRegistry::new()),
            ParallelQueryExecutor::from_engine(&engine).with_min_rows(1),
        )
    }

    fn run(query: &SelectQuery) -> Result<Vec<Vec<Value>>, QueryError> {
        let ctx = context();
        let vars = Variables::new();
        run_query(query, &Filter::new(&ctx, &vars)).map(|v| v.to_rows())
    }

    #[test]
    fn group_having_order() {
        let query = SelectEntity::new()
            .field(col("dept"))
            .field(func("sum", vec![col("salary")]).alias("total"))
            .from_table("emp")
            .group_by(vec![col("dept")])
            .having(count_all().gt(lit(0)))
            .into_query()
            .order_by(vec![OrderItem::desc(col("total"))]);
        assert_eq!(
            run(&query).unwrap(),
            vec![
                vec![Value::from("a"), Value::from(400)],
                vec![Value::from("b"), Value::from(200)],
                vec![Value::from("c"), Value::Null],
            ]
        );
    }

    #[test]
    fn aggregate_without_group_by_groups_everything() {
        let query = SelectEntity::new()
            .field(count_all())
            .field(func("max", vec![col("salary")]))
            .from_table("emp")
            .into_query();
        assert_eq!(run(&query).unwrap(), vec![vec![Value::from(4), Value::from(300)]]);
    }

    #[test]
    fn correlated_subquery_and_join_alias() {
        let outer = SelectEntity::new()
            .field(qcol("e", "id"))
            .field(qcol("d", "name"))
            .from(TableExpr::aliased("emp", "e").join(
                JoinKind::Inner,
                TableExpr::aliased("dept", "d"),
                JoinConstraint::On(qcol("e", "dept").equal(qcol("d", "dept"))),
            ))
            .filter(exists(
                SelectEntity::new()
                    .field(lit(1))
                    .from_table("emp")
                    .filter(col("salary").gt(qcol("e", "salary")))
                    .into_query(),
            ))
            .into_query();
        assert_eq!(
            run(&outer).unwrap(),
            vec![
                vec![Value::from(1), Value::from("Sales")],
                vec![Value::from(2), Value::from("Ops")],
            ]
        );
    }

    #[test]
    fn inline_tables_and_set_operations() {
        let body = QueryBody::from(SelectEntity::new().field(col("x")).from_table("w")).combine(
            SetOperator::Union,
            false,
            SelectEntity::new().field(lit(1)).into(),
        );
        let query = SelectQuery::new(body)
        .with_table(
            "w",
            &["x"],
            SelectEntity::new().field(col("id")).from_table("emp").filter(col("id").lt(lit(3))).into_query(),
        )
        .order_by(vec![OrderItem::desc(col("x"))]);
        assert_eq!(run(&query).unwrap(), vec![vec![Value::from(2)], vec![Value::from(1)]]);
    }

    #[test]
    fn missing_table_and_ambiguous_column() {
        let missing = SelectEntity::new().field(wildcard()).from_table("nope").into_query();
        assert_eq!(run(&missing).unwrap_err(), QueryError::TableNotFound("nope".to_string()));

        let ambiguous = SelectEntity::new()
            .field(col("dept"))
            .from_table("emp")
            .from_table("dept")
            .into_query();
        assert_eq!(run(&ambiguous).unwrap_err(), QueryError::FieldAmbiguous("dept".to_string()));
    }
}
