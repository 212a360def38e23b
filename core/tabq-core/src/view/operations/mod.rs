//! View transformations
//!
//! 각 단계는 `&View`를 빌려 새 `View`를 만듭니다. 레코드 단위 평가는
//! [`ParallelQueryExecutor`](crate::sql::executor::ParallelQueryExecutor)를 통해
//! 청크 병렬로 수행되고, 그룹 맵 구성/정렬/집합 연산 중복 제거는 단일 스레드입니다.

mod analytic;
mod filter;
mod group;
mod join;
mod limit;
mod projection;
mod set_ops;
mod sort;

pub(crate) use sort::compare_sort_keys;

use super::{Record, View};
use crate::error::{QueryError, QueryResult};
use crate::sql::filter::{Filter, ScopeFrame};
use std::sync::atomic::Ordering;

impl View {
    /// Same metadata over a new record list.
    pub(crate) fn with_records(&self, records: Vec<Record>) -> View {
        View {
            header: self.header.clone(),
            records,
            is_grouped: self.is_grouped,
            materialized: self.materialized.clone(),
            selected: self.selected.clone(),
            source: self.source.clone(),
            sort_values: None,
        }
    }
}

/// Evaluate `f` once per record, in parallel chunks, keeping record order.
///
/// Each chunk owns one scope and pushes/pops the record frame around `f`.
pub(crate) fn map_records<T, F>(view: &View, filter: &Filter<'_>, f: F) -> QueryResult<Vec<T>>
where
    T: Send,
    F: Fn(&Filter<'_>, &Record) -> QueryResult<T> + Sync,
{
    filter.context().parallel.map_chunks(view.len(), |range, cancel| {
        let mut scope = filter.clone();
        let mut out = Vec::with_capacity(range.len());
        for record in &view.records[range] {
            if cancel.load(Ordering::Relaxed) {
                return Err(QueryError::Cancelled);
            }
            scope.push(ScopeFrame {
                view,
                record,
                member: None,
            });
            let result = f(&scope, record);
            scope.pop();
            out.push(result?);
        }
        Ok(out)
    })
}


#[cfg(test)]
mod tests {
    use super::map_records;
    use super::testing::{context, int_rows, table};
    use crate::sql::ast::ColumnRef;
    use crate::sql::filter::{Filter, Variables};
    use crate::value::Value;

    #[test]
    fn map_records_scopes_each_record_innermost() {
        let ctx = context();
        let vars = Variables::new();
        let outer = table("o", &["c1"], int_rows(&[100]));
        let view = table("t", &["c1"], int_rows(&[1, 2, 3, 4, 5, 6, 7]));
        let base = Filter::new(&ctx, &vars);
        let filter = base.with_record(&outer, &outer.records[0]);
        let c1 = ColumnRef {
            qualifier: None,
            name: "c1".to_string(),
        };

        let seen = map_records(&view, &filter, |scope, _| Ok((scope.depth(), scope.resolve_column(&c1)?))).unwrap();
        assert_eq!(
            seen,
            (1..=7).map(|i| (2, Value::Integer(i))).collect::<Vec<_>>()
        );
        assert_eq!(filter.depth(), 1);
    }
}
