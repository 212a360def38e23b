//! WHERE / HAVING

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::Expr;
use crate::sql::eval::evaluate_condition;
use crate::sql::filter::Filter;
use crate::view::View;
use std::sync::atomic::Ordering;

impl View {
    /// Keep the records for which `condition` is TRUE.
    pub fn where_clause(&self, condition: &Expr, filter: &Filter<'_>) -> QueryResult<View> {
        let records = filter.context().parallel.map_chunks(self.len(), |range, cancel| {
            let mut kept = Vec::new();
            for record in &self.records[range] {
                if cancel.load(Ordering::Relaxed) {
                    return Err(QueryError::Cancelled);
                }
                let scope = filter.with_record(self, record);
                if evaluate_condition(condition, &scope)?.is_true() {
                    kept.push(record.clone());
                }
            }
            Ok(kept)
        })?;
        tracing::debug!(target: "tabq::select", input = self.len(), output = records.len(), "where");
        Ok(self.with_records(records))
    }

    /// HAVING; an ungrouped view is grouped as a whole first.
    pub fn having(&self, condition: &Expr, filter: &Filter<'_>) -> QueryResult<View> {
        if self.is_grouped {
            self.where_clause(condition, filter)
        } else {
            self.group_all().where_clause(condition, filter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, int_rows, table};
    use crate::sql::ast::{col, count_all, lit};
    use crate::sql::filter::{Filter, Variables};
    use crate::value::Value;

    #[test]
    fn keeps_only_true_records() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1, 2, 3]));

        let result = view.where_clause(&col("c1").gt(lit(1)), &filter).unwrap();
        assert_eq!(result.to_rows(), int_rows(&[2, 3]));

        let none = result.where_clause(&!col("c1").gt(lit(1)), &filter).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn unknown_is_dropped() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], vec![vec![Value::Null], vec![Value::from(1)]]);
        let result = view.where_clause(&col("c1").equal(lit(1)), &filter).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn having_groups_whole_view() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1, 2, 3]));
        let result = view.having(&count_all().gt(lit(2)), &filter).unwrap();
        assert!(result.is_grouped());
        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].group_len(), 3);
    }
}
