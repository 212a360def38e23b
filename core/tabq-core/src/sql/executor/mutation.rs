//! INSERT / UPDATE / DELETE / ALTER TABLE
//!
//! 모든 DML은 [`Catalog::update`](crate::catalog::Catalog::update)의 두 단계로 실행됩니다.
//! 계획 단계에서 새 값을 전부 계산하고, 성공한 경우에만 쓰기 잠금 아래에서
//! 적용합니다. 평가 오류가 나면 테이블은 바뀌지 않습니다.

use super::StatementResult;
use super::select::run_query;
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{
    AlterOperation, AlterTableStatement, ColumnDefault, ColumnPosition, DeleteStatement, Expr, InsertSource,
    InsertStatement, UpdateStatement,
};
use crate::sql::eval::{evaluate, evaluate_condition};
use crate::sql::filter::Filter;
use crate::value::Value;
use crate::view::{Cell, HeaderField, Record, View};
use ahash::AHashSet;
use std::borrow::Cow;

pub(super) fn insert(statement: &InsertStatement, filter: &Filter<'_>) -> QueryResult<StatementResult> {
    let ctx = filter.context();
    let blank = ctx.config.blank_value();

    let (count, view) = ctx.catalog.update(
        &statement.table,
        ctx.config.wait_timeout,
        |table| {
            let targets = target_columns(table, &statement.columns, filter)?;
            let rows: Vec<Vec<Value>> = match &statement.source {
                InsertSource::Values(rows) => rows
                    .iter()
                    .map(|row| {
                        check_width(targets.len(), row.len())?;
                        row.iter().map(|e| evaluate(e, filter)).collect()
                    })
                    .collect::<QueryResult<_>>()?,
                InsertSource::Query(query) => {
                    let view = run_query(query, &filter.create_scope())?;
                    check_width(targets.len(), view.field_count())?;
                    view.to_rows()
                }
            };
            Ok(rows
                .into_iter()
                .map(|row| {
                    let mut values = vec![blank.clone(); table.field_count()];
                    for (&index, value) in targets.iter().zip(row) {
                        values[index] = value;
                    }
                    Record::new(values)
                })
                .collect::<Vec<_>>())
        },
        |table, records| {
            let count = records.len();
            table.records.extend(records);
            (count, table.clone())
        },
    )?;

    tracing::info!(target: "tabq::dml", table = %statement.table, count, "insert");
    Ok(affected(&statement.table, count, view))
}

pub(super) fn update(statement: &UpdateStatement, filter: &Filter<'_>) -> QueryResult<StatementResult> {
    let ctx = filter.context();
    let matching = ctx.field_name_match();

    let (count, view) = ctx.catalog.update(
        &statement.table,
        ctx.config.wait_timeout,
        |table| {
            let scan = aliased(table, statement.alias.as_deref());
            let mut targets = Vec::with_capacity(statement.assignments.len());
            for (column, _) in &statement.assignments {
                let index = scan.header.field_index(None, column, matching)?;
                if targets.contains(&index) {
                    return Err(QueryError::DuplicateColumnName(column.clone()));
                }
                targets.push(index);
            }

            let changes = ctx.parallel.map_records(scan.len(), |i| {
                let record = &scan.records[i];
                let scope = filter.with_record(&scan, record);
                if let Some(condition) = &statement.where_clause
                    && !evaluate_condition(condition, &scope)?.is_true()
                {
                    return Ok(None);
                }
                statement
                    .assignments
                    .iter()
                    .map(|(_, e)| evaluate(e, &scope))
                    .collect::<QueryResult<Vec<_>>>()
                    .map(Some)
            })?;
            Ok((targets, changes))
        },
        |table, (targets, changes)| {
            let mut count = 0;
            for (record, values) in table.records.iter_mut().zip(changes) {
                let Some(values) = values else { continue };
                for (&index, value) in targets.iter().zip(values) {
                    record.set(index, Cell::Value(value));
                }
                count += 1;
            }
            (count, table.clone())
        },
    )?;

    tracing::info!(target: "tabq::dml", table = %statement.table, count, "update");
    Ok(affected(&statement.table, count, view))
}

pub(super) fn delete(statement: &DeleteStatement, filter: &Filter<'_>) -> QueryResult<StatementResult> {
    let ctx = filter.context();

    let (count, view) = ctx.catalog.update(
        &statement.table,
        ctx.config.wait_timeout,
        |table| {
            let scan = aliased(table, statement.alias.as_deref());
            ctx.parallel.map_records(scan.len(), |i| match &statement.where_clause {
                Some(condition) => {
                    let scope = filter.with_record(&scan, &scan.records[i]);
                    Ok(evaluate_condition(condition, &scope)?.is_true())
                }
                None => Ok(true),
            })
        },
        |table, remove| {
            let before = table.records.len();
            let mut flags = remove.into_iter();
            table.records.retain(|_| !flags.next().unwrap_or(false));
            (before - table.records.len(), table.clone())
        },
    )?;

    tracing::info!(target: "tabq::dml", table = %statement.table, count, "delete");
    Ok(affected(&statement.table, count, view))
}

/// Planned ALTER TABLE change.
enum AlterPlan {
    Add {
        at: usize,
        fields: Vec<HeaderField>,
        values: Vec<Vec<Value>>,
    },
    Drop(Vec<usize>),
    Rename(usize, String),
}

pub(super) fn alter(statement: &AlterTableStatement, filter: &Filter<'_>) -> QueryResult<StatementResult> {
    let ctx = filter.context();
    let matching = ctx.field_name_match();

    let (count, view) = ctx.catalog.update(
        &statement.table,
        ctx.config.wait_timeout,
        |table| match &statement.operation {
            AlterOperation::Add { columns, position } => plan_add(table, columns, position, filter),
            AlterOperation::Drop(columns) => {
                let mut indices = Vec::with_capacity(columns.len());
                for column in columns {
                    let index = table.header.field_index(None, column, matching)?;
                    if !indices.contains(&index) {
                        indices.push(index);
                    }
                }
                Ok(AlterPlan::Drop(indices))
            }
            AlterOperation::Rename { from, to } => {
                let index = table.header.field_index(None, from, matching)?;
                if let Some(existing) = table.header.find_index(None, to, matching)?
                    && existing != index
                {
                    return Err(QueryError::DuplicateColumnName(to.clone()));
                }
                Ok(AlterPlan::Rename(index, to.clone()))
            }
        },
        |table, plan| {
            let count = match plan {
                AlterPlan::Add { at, fields, values } => {
                    let count = fields.len();
                    table.header.insert_fields(at, fields);
                    for (record, row) in table.records.iter_mut().zip(values) {
                        record.insert_cells(at, row.into_iter().map(Cell::Value).collect());
                    }
                    count
                }
                AlterPlan::Drop(indices) => {
                    table.header.remove_fields(&indices);
                    for record in &mut table.records {
                        record.remove_cells(&indices);
                    }
                    indices.len()
                }
                AlterPlan::Rename(index, name) => {
                    table.header.rename_field(index, &name);
                    1
                }
            };
            (count, table.clone())
        },
    )?;

    tracing::info!(target: "tabq::dml", table = %statement.table, count, "alter table");
    Ok(affected(&statement.table, count, view))
}

fn plan_add(
    table: &View,
    columns: &[ColumnDefault],
    position: &ColumnPosition,
    filter: &Filter<'_>,
) -> QueryResult<AlterPlan> {
    let ctx = filter.context();
    let matching = ctx.field_name_match();

    let mut names = AHashSet::with_capacity(columns.len());
    for column in columns {
        if table.header.find_index(None, &column.name, matching)?.is_some() || !names.insert(column.name.to_lowercase())
        {
            return Err(QueryError::DuplicateColumnName(column.name.clone()));
        }
    }

    let at = match position {
        ColumnPosition::First => 0,
        ColumnPosition::Last => table.field_count(),
        ColumnPosition::After(column) => table.header.field_index(None, column, matching)? + 1,
        ColumnPosition::Before(column) => table.header.field_index(None, column, matching)?,
    };

    let qualifier = table.source().unwrap_or_default().to_string();
    let fields = columns
        .iter()
        .map(|c| HeaderField::table(qualifier.clone(), c.name.clone(), 0))
        .collect();

    let defaults: Vec<Option<&Expr>> = columns.iter().map(|c| c.default.as_ref()).collect();
    let blank = ctx.config.blank_value();
    let values = ctx.parallel.map_records(table.len(), |i| {
        let scope = filter.with_record(table, &table.records[i]);
        defaults
            .iter()
            .map(|d| match d {
                Some(expr) => evaluate(expr, &scope),
                None => Ok(blank.clone()),
            })
            .collect::<QueryResult<Vec<_>>>()
    })?;

    Ok(AlterPlan::Add { at, fields, values })
}

/// Column positions written by INSERT; an empty list means every column.
fn target_columns(table: &View, columns: &[String], filter: &Filter<'_>) -> QueryResult<Vec<usize>> {
    if columns.is_empty() {
        return Ok((0..table.field_count()).collect());
    }
    let matching = filter.context().field_name_match();
    let mut indices = Vec::with_capacity(columns.len());
    for column in columns {
        let index = table.header.field_index(None, column, matching)?;
        if indices.contains(&index) {
            return Err(QueryError::DuplicateColumnName(column.clone()));
        }
        indices.push(index);
    }
    Ok(indices)
}

fn check_width(expected: usize, actual: usize) -> QueryResult<()> {
    if expected != actual {
        return Err(QueryError::FieldLengthNotMatch { expected, actual });
    }
    Ok(())
}

/// The table as seen by WHERE and SET expressions: requalified when aliased.
fn aliased<'v>(table: &'v View, alias: Option<&str>) -> Cow<'v, View> {
    match alias {
        Some(alias) => {
            let mut view = table.clone();
            view.header.update_qualifier(alias);
            Cow::Owned(view)
        }
        None => Cow::Borrowed(table),
    }
}

fn affected(table: &str, count: usize, view: View) -> StatementResult {
    StatementResult::Affected {
        table: table.to_string(),
        count,
        view,
    }
}
