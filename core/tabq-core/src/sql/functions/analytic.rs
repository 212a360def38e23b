//! Built-in analytic (window) functions

use super::{Arity, FunctionDef, FunctionKind};
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// 내장 분석 함수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticFunction {
    RowNumber,
    Rank,
    DenseRank,
    CumeDist,
    PercentRank,
    Ntile,
    FirstValue,
    LastValue,
    NthValue,
    Lag,
    Lead,
}

pub(super) fn definitions() -> Vec<FunctionDef> {
    [
        ("ROW_NUMBER", Arity::Exact(0), AnalyticFunction::RowNumber),
        ("RANK", Arity::Exact(0), AnalyticFunction::Rank),
        ("DENSE_RANK", Arity::Exact(0), AnalyticFunction::DenseRank),
        ("CUME_DIST", Arity::Exact(0), AnalyticFunction::CumeDist),
        ("PERCENT_RANK", Arity::Exact(0), AnalyticFunction::PercentRank),
        ("NTILE", Arity::Exact(1), AnalyticFunction::Ntile),
        ("FIRST_VALUE", Arity::Exact(1), AnalyticFunction::FirstValue),
        ("LAST_VALUE", Arity::Exact(1), AnalyticFunction::LastValue),
        ("NTH_VALUE", Arity::Exact(2), AnalyticFunction::NthValue),
        ("LAG", Arity::Range(1, 3), AnalyticFunction::Lag),
        ("LEAD", Arity::Range(1, 3), AnalyticFunction::Lead),
    ]
    .into_iter()
    .map(|(name, arity, f)| FunctionDef {
        name,
        arity,
        kind: FunctionKind::Analytic(f),
    })
    .collect()
}

impl AnalyticFunction {
    fn name(self) -> &'static str {
        match self {
            AnalyticFunction::RowNumber => "ROW_NUMBER",
            AnalyticFunction::Rank => "RANK",
            AnalyticFunction::DenseRank => "DENSE_RANK",
            AnalyticFunction::CumeDist => "CUME_DIST",
            AnalyticFunction::PercentRank => "PERCENT_RANK",
            AnalyticFunction::Ntile => "NTILE",
            AnalyticFunction::FirstValue => "FIRST_VALUE",
            AnalyticFunction::LastValue => "LAST_VALUE",
            AnalyticFunction::NthValue => "NTH_VALUE",
            AnalyticFunction::Lag => "LAG",
            AnalyticFunction::Lead => "LEAD",
        }
    }

    /// Compute the function over one sorted partition.
    ///
    /// `args[i]` are the evaluated arguments of the i-th row in window order and
    /// `peers[i]` its peer group (rows with equal ORDER BY keys share a group;
    /// groups are numbered from 0 in order). Output is in window order.
    pub fn compute(self, args: &[Vec<Value>], peers: &[usize]) -> QueryResult<Vec<Value>> {
        let n = peers.len();
        let arg = |row: usize, i: usize| args.get(row).and_then(|a| a.get(i)).cloned().unwrap_or_default();

        // first and last row index of every peer group
        let mut bounds: Vec<(usize, usize)> = Vec::new();
        for (row, &group) in peers.iter().enumerate() {
            if group == bounds.len() {
                bounds.push((row, row));
            } else if let Some(b) = bounds.get_mut(group) {
                b.1 = row;
            }
        }
        let rank = |row: usize| bounds.get(peers[row]).map(|b| b.0 + 1).unwrap_or(row + 1);

        let values = match self {
            AnalyticFunction::RowNumber => (0..n).map(|i| Value::Integer(i as i64 + 1)).collect(),
            AnalyticFunction::Rank => (0..n).map(|i| Value::Integer(rank(i) as i64)).collect(),
            AnalyticFunction::DenseRank => peers.iter().map(|&g| Value::Integer(g as i64 + 1)).collect(),
            AnalyticFunction::CumeDist => (0..n)
                .map(|i| {
                    let last = bounds.get(peers[i]).map(|b| b.1).unwrap_or(i);
                    Value::Float((last + 1) as f64 / n as f64)
                })
                .collect(),
            AnalyticFunction::PercentRank => (0..n)
                .map(|i| {
                    if n <= 1 {
                        Value::Float(0.0)
                    } else {
                        Value::Float((rank(i) - 1) as f64 / (n - 1) as f64)
                    }
                })
                .collect(),
            AnalyticFunction::Ntile => {
                if n == 0 {
                    return Ok(Vec::new());
                }
                let buckets = self.positive(&arg(0, 0))?;
                let size = n / buckets;
                let extra = n % buckets;
                (0..n)
                    .map(|i| {
                        let bucket = if i < extra * (size + 1) {
                            i / (size + 1)
                        } else {
                            extra + (i - extra * (size + 1)) / size.max(1)
                        };
                        Value::Integer(bucket as i64 + 1)
                    })
                    .collect()
            }
            AnalyticFunction::FirstValue => vec![arg(0, 0); n],
            AnalyticFunction::LastValue => vec![if n == 0 { Value::Null } else { arg(n - 1, 0) }; n],
            AnalyticFunction::NthValue => {
                if n == 0 {
                    return Ok(Vec::new());
                }
                let nth = self.positive(&arg(0, 1))?;
                vec![if nth <= n { arg(nth - 1, 0) } else { Value::Null }; n]
            }
            AnalyticFunction::Lag | AnalyticFunction::Lead => {
                let mut out = Vec::with_capacity(n);
                for i in 0..n {
                    let offset: usize = match args.get(i).and_then(|a| a.get(1)) {
                        Some(v) => v
                            .to_integer()
                            .filter(|o| *o >= 0)
                            .map(|o| o as usize)
                            .ok_or_else(|| self.argument_error())?,
                        None => 1,
                    };
                    let target = if self == AnalyticFunction::Lag {
                        i.checked_sub(offset)
                    } else {
                        i.checked_add(offset).filter(|t| *t < n)
                    };
                    out.push(match target {
                        Some(t) => arg(t, 0),
                        None => arg(i, 2),
                    });
                }
                out
            }
        };
        Ok(values)
    }

    fn positive(self, value: &Value) -> QueryResult<usize> {
        value
            .to_integer()
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .ok_or_else(|| self.argument_error())
    }

    fn argument_error(self) -> QueryError {
        QueryError::FunctionArgumentError {
            name: self.name().to_string(),
            expected: "a positive integer".to_string(),
        }
    }
}
