//! Built-in aggregate functions
//!
//! Aggregates receive the argument values of every group member in original
//! row order. NULLs and values without a numeric form are skipped by the
//! numeric aggregates; an aggregate over no usable value yields NULL
//! (COUNT yields 0).

use super::{Arity, FunctionDef, FunctionKind};
use crate::error::QueryResult;
use crate::value::{Value, sort_ordering};
use chrono::FixedOffset;
use std::cmp::Ordering;

/// 내장 집계 함수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Median,
    Listagg,
    Stdev,
    Var,
}

pub(super) fn definitions() -> Vec<FunctionDef> {
    [
        ("COUNT", Arity::Exact(1), AggregateFunction::Count),
        ("SUM", Arity::Exact(1), AggregateFunction::Sum),
        ("AVG", Arity::Exact(1), AggregateFunction::Avg),
        ("MIN", Arity::Exact(1), AggregateFunction::Min),
        ("MAX", Arity::Exact(1), AggregateFunction::Max),
        ("MEDIAN", Arity::Exact(1), AggregateFunction::Median),
        ("LISTAGG", Arity::Range(1, 2), AggregateFunction::Listagg),
        ("STDEV", Arity::Exact(1), AggregateFunction::Stdev),
        ("VAR", Arity::Exact(1), AggregateFunction::Var),
    ]
    .into_iter()
    .map(|(name, arity, f)| FunctionDef {
        name,
        arity,
        kind: FunctionKind::Aggregate(f),
    })
    .collect()
}

impl AggregateFunction {
    /// Aggregate `values`. `extra` holds the remaining, per-group constant
    /// arguments (the LISTAGG separator).
    pub fn apply(self, values: &[Value], extra: &[Value], tz: &FixedOffset) -> QueryResult<Value> {
        let result = match self {
            AggregateFunction::Count => Value::Integer(values.iter().filter(|v| !v.is_null()).count() as i64),
            AggregateFunction::Sum => sum(values),
            AggregateFunction::Avg => {
                let nums = numbers(values);
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            AggregateFunction::Min => extreme(values, tz, Ordering::Less),
            AggregateFunction::Max => extreme(values, tz, Ordering::Greater),
            AggregateFunction::Median => {
                let mut nums = numbers(values);
                if nums.is_empty() {
                    Value::Null
                } else {
                    nums.sort_by(f64::total_cmp);
                    let mid = nums.len() / 2;
                    if nums.len() % 2 == 0 {
                        Value::Float((nums[mid - 1] + nums[mid]) / 2.0)
                    } else {
                        Value::Float(nums[mid])
                    }
                }
            }
            AggregateFunction::Listagg => {
                let separator = extra.first().and_then(Value::to_text).unwrap_or_default();
                let parts: Vec<String> = values.iter().filter_map(Value::to_text).collect();
                if parts.is_empty() {
                    Value::Null
                } else {
                    Value::String(parts.join(&separator))
                }
            }
            AggregateFunction::Stdev => variance(values).map(|v| Value::Float(v.sqrt())).unwrap_or_default(),
            AggregateFunction::Var => variance(values).map(Value::Float).unwrap_or_default(),
        };
        Ok(result)
    }
}

fn numbers(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::to_float).collect()
}

/// Integer sum while every operand is integral and the sum fits, float otherwise.
fn sum(values: &[Value]) -> Value {
    let mut int_sum: Option<i64> = Some(0);
    let mut float_sum = 0.0;
    let mut seen = false;
    for value in values {
        let Some(f) = value.to_float() else {
            continue;
        };
        seen = true;
        float_sum += f;
        int_sum = match (int_sum, value) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            (Some(acc), Value::String(_)) => value.to_integer().and_then(|i| acc.checked_add(i)),
            _ => None,
        };
    }
    match (seen, int_sum) {
        (false, _) => Value::Null,
        (true, Some(i)) => Value::Integer(i),
        (true, None) => Value::Float(float_sum),
    }
}

fn extreme(values: &[Value], tz: &FixedOffset, wanted: Ordering) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if sort_ordering(v, b, tz) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or_default()
}

/// Sample variance.
fn variance(values: &[Value]) -> Option<f64> {
    let nums = numbers(values);
    if nums.len() < 2 {
        return None;
    }
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    Some(nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0))
}
