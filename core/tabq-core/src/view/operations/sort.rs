//! ORDER BY

use super::map_records;
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{Expr, OrderItem, SortDirection};
use crate::sql::eval::evaluate;
use crate::sql::filter::Filter;
use crate::value::{SortKey, Value};
use crate::view::{FieldNameMatch, View};
use chrono::FixedOffset;
use std::cmp::Ordering;

/// Compare two sort key tuples under `items`.
pub(crate) fn compare_sort_keys(a: &[Value], b: &[Value], items: &[OrderItem], tz: &FixedOffset) -> Ordering {
    for ((x, y), item) in a.iter().zip(b).zip(items) {
        let ord = compare_key(&SortKey::classify(x, tz), &SortKey::classify(y, tz), item);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// [`compare_sort_keys`] over tuples that were classified up front.
fn compare_classified(a: &[SortKey<'_>], b: &[SortKey<'_>], items: &[OrderItem]) -> Ordering {
    for ((x, y), item) in a.iter().zip(b).zip(items) {
        let ord = compare_key(x, y, item);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_key(x: &SortKey<'_>, y: &SortKey<'_>, item: &OrderItem) -> Ordering {
    let (x_null, y_null) = (matches!(x, SortKey::Null), matches!(y, SortKey::Null));
    match (x_null, y_null) {
        (true, true) => Ordering::Equal,
        (true, false) | (false, true) => {
            let null_first = if x_null { Ordering::Less } else { Ordering::Greater };
            // null position is independent of the direction
            if item.nulls_first() { null_first } else { null_first.reverse() }
        }
        (false, false) => match item.direction {
            SortDirection::Asc => x.cmp(y),
            SortDirection::Desc => y.cmp(x),
        },
    }
}

impl View {
    /// Stable sort by `items`.
    ///
    /// An unqualified column name is first matched against the selected
    /// output names, so ORDER BY may use select aliases.
    pub fn order_by(&self, items: &[OrderItem], filter: &Filter<'_>) -> QueryResult<View> {
        let matching = filter.context().field_name_match();
        let aliases = items
            .iter()
            .map(|item| self.selected_alias(&item.expr, matching))
            .collect::<QueryResult<Vec<Option<usize>>>>()?;

        let keys = map_records(self, filter, |scope, record| {
            items
                .iter()
                .zip(&aliases)
                .map(|(item, alias)| match alias {
                    Some(index) => record.value(*index).cloned(),
                    None => evaluate(&item.expr, scope),
                })
                .collect::<QueryResult<Vec<Value>>>()
        })?;

        let tz = filter.context().timezone();
        let classified: Vec<Vec<SortKey<'_>>> = keys
            .iter()
            .map(|row| row.iter().map(|v| SortKey::classify(v, tz)).collect())
            .collect();
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| compare_classified(&classified[a], &classified[b], items));
        drop(classified);

        let records = order.iter().map(|&i| self.records[i].clone()).collect();
        let mut keys: Vec<Option<Vec<Value>>> = keys.into_iter().map(Some).collect();
        let sort_values = order.iter().map(|&i| keys[i].take().unwrap_or_default()).collect();

        let mut view = self.with_records(records);
        view.sort_values = Some(sort_values);
        Ok(view)
    }

    /// Selected column whose output name is `expr` (an unqualified column).
    fn selected_alias(&self, expr: &Expr, matching: FieldNameMatch) -> QueryResult<Option<usize>> {
        let (Expr::Column(column), Some(selected)) = (expr, &self.selected) else {
            return Ok(None);
        };
        if column.qualifier.is_some() {
            return Ok(None);
        }
        let mut found: Option<usize> = None;
        for s in selected {
            let same = match matching {
                FieldNameMatch::IgnoreCase => s.name.eq_ignore_ascii_case(&column.name),
                FieldNameMatch::Exact => s.name == column.name,
            };
            if same {
                match found {
                    Some(index) if index != s.index => {
                        return Err(QueryError::FieldAmbiguous(column.name.clone()));
                    }
                    _ => found = Some(s.index),
                }
            }
        }
        Ok(found)
    }
}
