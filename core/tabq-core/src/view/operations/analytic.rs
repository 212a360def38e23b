//! Analytic (window) functions
//!
//! 파티션은 키가 처음 나타난 순서를 따르고, 파티션 내부는 ORDER BY 로 안정 정렬됩니다.
//! 결과는 원래 레코드 순서대로 파생 컬럼에 추가되고 호출식으로 구체화되어
//! 이후 select/order by 단계가 다시 읽습니다.

use super::{compare_sort_keys, map_records};
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{AnalyticCall, Expr};
use crate::sql::eval::evaluate;
use crate::sql::filter::Filter;
use crate::sql::functions::Binding;
use crate::value::Value;
use crate::view::{Cell, GroupKey, HeaderField, View};
use ahash::{AHashMap, AHashSet};

/// Per-record inputs of one analytic call.
struct WindowRow {
    partition: Vec<Value>,
    order: Vec<Value>,
    args: Vec<Value>,
}

impl View {
    /// Compute `calls` and append one column per call not yet materialized.
    pub fn analyze(&self, calls: &[&AnalyticCall], filter: &Filter<'_>) -> QueryResult<View> {
        let mut view = self.clone();
        for call in calls {
            let expr = Expr::Analytic((*call).clone());
            if view.materialized_index(&expr).is_some() {
                continue;
            }
            let values = view.window(call, &expr, filter)?;
            let index = view.header.push_field(HeaderField::derived(expr.to_string()));
            for (record, value) in view.records.iter_mut().zip(values) {
                record.push(Cell::Value(value));
            }
            view.push_materialized(expr, index);
        }
        Ok(view)
    }

    fn window(&self, call: &AnalyticCall, expr: &Expr, filter: &Filter<'_>) -> QueryResult<Vec<Value>> {
        let ctx = filter.context();
        let binding = call.function.bind(&ctx.functions, true)?;
        let count_all = call.function.is_count_all();

        let rows = map_records(self, filter, |scope, _| {
            let partition = call
                .partition_by
                .iter()
                .map(|e| evaluate(e, scope))
                .collect::<QueryResult<Vec<_>>>()?;
            let order = call
                .order_by
                .iter()
                .map(|item| evaluate(&item.expr, scope))
                .collect::<QueryResult<Vec<_>>>()?;
            let args = if count_all {
                vec![Value::Integer(1)]
            } else {
                call.function
                    .args
                    .iter()
                    .map(|e| evaluate(e, scope))
                    .collect::<QueryResult<Vec<_>>>()?
            };
            Ok(WindowRow { partition, order, args })
        })?;

        let mut positions: AHashMap<GroupKey, usize> = AHashMap::new();
        let mut partitions: Vec<Vec<usize>> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let next = partitions.len();
            let p = *positions.entry(GroupKey::from_values(&row.partition)).or_insert(next);
            if p == next {
                partitions.push(Vec::new());
            }
            partitions[p].push(i);
        }

        let tz = ctx.timezone();
        let mut output = vec![Value::Null; rows.len()];
        for mut members in partitions {
            members.sort_by(|&a, &b| compare_sort_keys(&rows[a].order, &rows[b].order, &call.order_by, tz));

            let mut peers = Vec::with_capacity(members.len());
            for (pos, &m) in members.iter().enumerate() {
                let group = match pos {
                    0 => 0,
                    _ if call.order_by.is_empty() => 0,
                    _ => {
                        let prev = members[pos - 1];
                        let last: usize = peers[pos - 1];
                        if compare_sort_keys(&rows[prev].order, &rows[m].order, &call.order_by, tz).is_eq() {
                            last
                        } else {
                            last + 1
                        }
                    }
                };
                peers.push(group);
            }

            let args: Vec<Vec<Value>> = members.iter().map(|&m| rows[m].args.clone()).collect();
            let values = match &binding {
                Binding::Analytic(function) => function.compute(&args, &peers),
                Binding::Aggregate(function) => window_aggregate(call, &args, &peers, |values, extra| {
                    function.apply(values, extra, tz)
                }),
                Binding::UserAggregate(udf) => {
                    window_aggregate(call, &args, &peers, |values, _| udf.aggregate(values))
                }
                Binding::Scalar(_) | Binding::UserScalar(_) => Err(QueryError::InvalidArguments(format!(
                    "function {} cannot be used as an analytic function",
                    call.function.name.to_uppercase()
                ))),
            }
            .map_err(|e| e.in_expression(expr))?;

            for (&m, value) in members.iter().zip(values) {
                output[m] = value;
            }
        }

        tracing::debug!(target: "tabq::select", call = %expr, records = rows.len(), "analytic function");
        Ok(output)
    }
}

/// Aggregate used as a window function.
///
/// Without ORDER BY every row sees the whole partition. With ORDER BY the
/// frame runs from the first row through the last peer of the current row.
fn window_aggregate(
    call: &AnalyticCall,
    args: &[Vec<Value>],
    peers: &[usize],
    apply: impl Fn(&[Value], &[Value]) -> QueryResult<Value>,
) -> QueryResult<Vec<Value>> {
    let first_arg = |row: &Vec<Value>| row.first().cloned().unwrap_or_default();
    let extra: Vec<Value> = args.first().map(|a| a.iter().skip(1).cloned().collect()).unwrap_or_default();

    let frame = |end: usize| -> Vec<Value> {
        let mut values: Vec<Value> = args[..end].iter().map(first_arg).collect();
        if call.function.distinct {
            let mut seen = AHashSet::with_capacity(values.len());
            values.retain(|v| seen.insert(GroupKey::from_values([v])));
        }
        values
    };

    if call.order_by.is_empty() {
        let value = apply(&frame(args.len()), &extra)?;
        return Ok(vec![value; args.len()]);
    }

    let mut out = Vec::with_capacity(args.len());
    let mut row = 0;
    while row < peers.len() {
        let mut end = row;
        while end < peers.len() && peers[end] == peers[row] {
            end += 1;
        }
        let value = apply(&frame(end), &extra)?;
        out.extend(std::iter::repeat_n(value, end - row));
        row = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, table};
    use crate::sql::ast::{AnalyticCall, Expr, OrderItem, analytic, col, wildcard};
    use crate::sql::filter::{Filter, Variables};
    use crate::value::Value;

    fn call(expr: &Expr) -> &AnalyticCall {
        match expr {
            Expr::Analytic(call) => call,
            _ => unreachable!(),
        }
    }

    fn sales() -> crate::view::View {
        table(
            "t",
            &["dept", "amount"],
            vec![
                vec![Value::from("a"), Value::from(30)],
                vec![Value::from("b"), Value::from(10)],
                vec![Value::from("a"), Value::from(10)],
                vec![Value::from("a"), Value::from(20)],
                vec![Value::from("a"), Value::from(20)],
            ],
        )
    }

    #[test]
    fn rank_within_partitions_keeps_record_order() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let rank = analytic("rank", vec![], vec![col("dept")], vec![OrderItem::asc(col("amount"))]);
        let view = sales().analyze(&[call(&rank)], &filter).unwrap();

        assert_eq!(view.materialized_index(&rank), Some(2));
        let ranks: Vec<Value> = view.records().iter().map(|r| r.value(2).unwrap().clone()).collect();
        assert_eq!(
            ranks,
            vec![Value::from(4), Value::from(1), Value::from(1), Value::from(2), Value::from(2)]
        );
    }

    #[test]
    fn running_sum_includes_peers() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let sum = analytic("sum", vec![col("amount")], vec![col("dept")], vec![OrderItem::asc(col("amount"))]);
        let view = sales().analyze(&[call(&sum)], &filter).unwrap();
        let sums: Vec<Value> = view.records().iter().map(|r| r.value(2).unwrap().clone()).collect();
        assert_eq!(
            sums,
            vec![Value::from(80), Value::from(10), Value::from(10), Value::from(50), Value::from(50)]
        );
    }

    #[test]
    fn count_all_over_whole_partition() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let count = analytic("count", vec![wildcard()], vec![col("dept")], vec![]);
        let view = sales().analyze(&[call(&count)], &filter).unwrap();
        assert_eq!(view.records()[1].value(2).unwrap(), &Value::from(1));
        assert_eq!(view.records()[4].value(2).unwrap(), &Value::from(4));

        // analyzing again reuses the materialized column
        let again = view.analyze(&[call(&count)], &filter).unwrap();
        assert_eq!(again.field_count(), 3);
    }
}
