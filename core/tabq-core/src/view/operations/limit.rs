//! LIMIT / OFFSET

use super::compare_sort_keys;
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{Expr, LimitClause, OrderItem};
use crate::sql::eval::evaluate;
use crate::sql::filter::Filter;
use crate::value::Value;
use crate::view::View;
use std::cmp::Ordering;

fn evaluate_count(expr: &Expr, filter: &Filter<'_>, clause: &str) -> QueryResult<Value> {
    let value = evaluate(expr, filter)?;
    if value.is_null() {
        return Err(QueryError::InvalidLimit(format!("{clause} {expr} is null")));
    }
    Ok(value)
}

impl View {
    /// Skip the first `expr` records; an offset past the end yields an empty view.
    pub fn offset(&self, expr: &Expr, filter: &Filter<'_>) -> QueryResult<View> {
        let value = evaluate_count(expr, filter, "OFFSET")?;
        let offset = value
            .to_integer()
            .filter(|n| *n >= 0)
            .ok_or_else(|| QueryError::InvalidLimit(format!("OFFSET {expr} must be a non-negative integer")))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        Ok(self.slice(start, self.len()))
    }

    /// Keep the first records as requested by `clause`.
    ///
    /// `PERCENT` rounds up. `WITH TIES` extends the slice with the records
    /// whose sort keys equal the last kept record; it has no effect on a view
    /// that was not sorted.
    pub fn limit(&self, clause: &LimitClause, order_by: &[OrderItem], filter: &Filter<'_>) -> QueryResult<View> {
        let value = evaluate_count(&clause.count, filter, "LIMIT")?;
        let mut end = if clause.percent {
            let percent = value
                .to_float()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .ok_or_else(|| QueryError::InvalidLimit(format!("LIMIT {} PERCENT must be a non-negative number", clause.count)))?;
            ((self.len() as f64) * percent.min(100.0) / 100.0).ceil() as usize
        } else {
            let n = value
                .to_integer()
                .filter(|n| *n >= 0)
                .ok_or_else(|| QueryError::InvalidLimit(format!("LIMIT {} must be a non-negative integer", clause.count)))?;
            usize::try_from(n).unwrap_or(usize::MAX)
        };
        end = end.min(self.len());

        if clause.with_ties
            && end > 0
            && let Some(keys) = &self.sort_values
        {
            let tz = filter.context().timezone();
            let last = &keys[end - 1];
            while end < self.len() && compare_sort_keys(last, &keys[end], order_by, tz) == Ordering::Equal {
                end += 1;
            }
        }
        Ok(self.slice(0, end))
    }

    fn slice(&self, start: usize, end: usize) -> View {
        let mut view = self.with_records(self.records[start..end].to_vec());
        view.sort_values = self.sort_values.as_ref().map(|k| k[start..end].to_vec());
        view
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, int_rows, table};
    use crate::error::QueryError;
    use crate::sql::ast::{LimitClause, OrderItem, col, lit};
    use crate::sql::filter::{Filter, Variables};

    fn clause(count: i64, percent: bool, with_ties: bool) -> LimitClause {
        LimitClause {
            count: lit(count),
            percent,
            with_ties,
        }
    }

    #[test]
    fn offset_past_end_is_empty() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1, 2, 3]));
        let result = view
            .offset(&lit(5), &filter)
            .unwrap()
            .limit(&clause(2, false, false), &[], &filter)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn limit_percent_rounds_up() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1, 2, 3]));
        let result = view.limit(&clause(50, true, false), &[], &filter).unwrap();
        assert_eq!(result.to_rows(), int_rows(&[1, 2]));
    }

    #[test]
    fn with_ties_extends_over_equal_keys() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let items = [OrderItem::asc(col("c1"))];
        let view = table("t", &["c1"], int_rows(&[3, 1, 2, 1]))
            .order_by(&items, &filter)
            .unwrap();
        let result = view.limit(&clause(1, false, true), &items, &filter).unwrap();
        assert_eq!(result.to_rows(), int_rows(&[1, 1]));
    }

    #[test]
    fn invalid_counts() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1]));
        assert!(matches!(view.offset(&lit(-1), &filter), Err(QueryError::InvalidLimit(_))));
        assert!(matches!(
            view.limit(
                &LimitClause {
                    count: lit("x"),
                    percent: false,
                    with_ties: false
                },
                &[],
                &filter
            ),
            Err(QueryError::InvalidLimit(_))
        ));
    }
}
