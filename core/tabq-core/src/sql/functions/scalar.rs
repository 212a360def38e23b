//! Built-in scalar functions

use super::{Arity, FunctionDef, FunctionKind};
use crate::error::{QueryError, QueryResult};
use crate::value::{ArithmeticOperator, ComparisonOperator, Ternary, Value, arithmetic, concat};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};
use std::fmt::Write;

static NULL: Value = Value::Null;

/// 스칼라 함수 평가에 필요한 문장 단위 정보
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext {
    /// Fixed statement timestamp returned by NOW()
    pub now: DateTime<FixedOffset>,
    pub timezone: FixedOffset,
}

/// 내장 스칼라 함수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Coalesce,
    If,
    Ifnull,
    Nullif,
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Power,
    Mod,
    Upper,
    Lower,
    Trim,
    Ltrim,
    Rtrim,
    Len,
    Substr,
    Replace,
    Concat,
    Now,
    DatetimeFormat,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Integer,
    Float,
    String,
    Boolean,
    Datetime,
}

pub(super) fn definitions() -> Vec<FunctionDef> {
    use ScalarFunction::*;
    let table: [(&'static str, Arity, ScalarFunction); 33] = [
        ("COALESCE", Arity::AtLeast(1), Coalesce),
        ("IF", Arity::Exact(3), If),
        ("IFNULL", Arity::Exact(2), Ifnull),
        ("NULLIF", Arity::Exact(2), Nullif),
        ("ABS", Arity::Exact(1), Abs),
        ("CEIL", Arity::Exact(1), Ceil),
        ("FLOOR", Arity::Exact(1), Floor),
        ("ROUND", Arity::Range(1, 2), Round),
        ("SQRT", Arity::Exact(1), Sqrt),
        ("POWER", Arity::Exact(2), Power),
        ("MOD", Arity::Exact(2), Mod),
        ("UPPER", Arity::Exact(1), Upper),
        ("LOWER", Arity::Exact(1), Lower),
        ("TRIM", Arity::Range(1, 2), Trim),
        ("LTRIM", Arity::Range(1, 2), Ltrim),
        ("RTRIM", Arity::Range(1, 2), Rtrim),
        ("LEN", Arity::Exact(1), Len),
        ("SUBSTR", Arity::Range(2, 3), Substr),
        ("REPLACE", Arity::Exact(3), Replace),
        ("CONCAT", Arity::AtLeast(1), Concat),
        ("NOW", Arity::Exact(0), Now),
        ("DATETIME_FORMAT", Arity::Exact(2), DatetimeFormat),
        ("YEAR", Arity::Exact(1), Year),
        ("MONTH", Arity::Exact(1), Month),
        ("DAY", Arity::Exact(1), Day),
        ("HOUR", Arity::Exact(1), Hour),
        ("MINUTE", Arity::Exact(1), Minute),
        ("SECOND", Arity::Exact(1), Second),
        ("INTEGER", Arity::Exact(1), Integer),
        ("FLOAT", Arity::Exact(1), Float),
        ("STRING", Arity::Exact(1), String),
        ("BOOLEAN", Arity::Exact(1), Boolean),
        ("DATETIME", Arity::Exact(1), Datetime),
    ];
    table
        .into_iter()
        .map(|(name, arity, f)| FunctionDef {
            name,
            arity,
            kind: FunctionKind::Scalar(f),
        })
        .collect()
}

impl ScalarFunction {
    /// Apply the function to already evaluated arguments.
    pub fn call(self, args: &[Value], ctx: &FunctionContext) -> QueryResult<Value> {
        let arg = |i: usize| args.get(i).unwrap_or(&NULL);
        let tz = &ctx.timezone;

        let value = match self {
            ScalarFunction::Coalesce => args.iter().find(|v| !v.is_null()).cloned().unwrap_or_default(),
            ScalarFunction::If => {
                if arg(0).to_ternary() == Ternary::True {
                    arg(1).clone()
                } else {
                    arg(2).clone()
                }
            }
            ScalarFunction::Ifnull => {
                if arg(0).is_null() {
                    arg(1).clone()
                } else {
                    arg(0).clone()
                }
            }
            ScalarFunction::Nullif => {
                if ComparisonOperator::Equal.evaluate(arg(0), arg(1), tz) == Ternary::True {
                    Value::Null
                } else {
                    arg(0).clone()
                }
            }
            ScalarFunction::Abs => match arg(0) {
                Value::Integer(i) => i.checked_abs().map(Value::Integer).unwrap_or(Value::Float((*i as f64).abs())),
                other => numeric(other, f64::abs),
            },
            ScalarFunction::Ceil => integral(arg(0), f64::ceil),
            ScalarFunction::Floor => integral(arg(0), f64::floor),
            ScalarFunction::Round => round(arg(0), args.get(1))?,
            ScalarFunction::Sqrt => numeric(arg(0), |f| if f < 0.0 { f64::NAN } else { f.sqrt() }),
            ScalarFunction::Power => match (arg(0).to_float(), arg(1).to_float()) {
                (Some(b), Some(e)) => finite(b.powf(e)),
                _ => Value::Null,
            },
            ScalarFunction::Mod => arithmetic(ArithmeticOperator::Modulo, arg(0), arg(1))?,
            ScalarFunction::Upper => text(arg(0), |s| s.to_uppercase()),
            ScalarFunction::Lower => text(arg(0), |s| s.to_lowercase()),
            ScalarFunction::Trim => trim(args, |s, set| s.trim_matches(set).to_string()),
            ScalarFunction::Ltrim => trim(args, |s, set| s.trim_start_matches(set).to_string()),
            ScalarFunction::Rtrim => trim(args, |s, set| s.trim_end_matches(set).to_string()),
            ScalarFunction::Len => match arg(0).to_text() {
                Some(s) => Value::Integer(s.chars().count() as i64),
                None => Value::Null,
            },
            ScalarFunction::Substr => substr(arg(0), arg(1), args.get(2)),
            ScalarFunction::Replace => match (arg(0).to_text(), arg(1).to_text(), arg(2).to_text()) {
                (Some(s), Some(from), Some(to)) if !from.is_empty() => Value::String(s.replace(&from, &to)),
                (Some(s), Some(_), Some(_)) => Value::String(s),
                _ => Value::Null,
            },
            ScalarFunction::Concat => concat(args),
            ScalarFunction::Now => Value::Datetime(ctx.now),
            ScalarFunction::DatetimeFormat => match (arg(0).to_datetime(tz), arg(1).to_text()) {
                (Some(dt), Some(format)) => Value::String(format_datetime(&dt, &format)?),
                _ => Value::Null,
            },
            ScalarFunction::Year => component(arg(0), tz, |dt| dt.year() as i64),
            ScalarFunction::Month => component(arg(0), tz, |dt| dt.month() as i64),
            ScalarFunction::Day => component(arg(0), tz, |dt| dt.day() as i64),
            ScalarFunction::Hour => component(arg(0), tz, |dt| dt.hour() as i64),
            ScalarFunction::Minute => component(arg(0), tz, |dt| dt.minute() as i64),
            ScalarFunction::Second => component(arg(0), tz, |dt| dt.second() as i64),
            ScalarFunction::Integer => match arg(0) {
                Value::Datetime(dt) => Value::Integer(dt.timestamp()),
                other => other
                    .to_integer()
                    .or_else(|| other.to_float().map(|f| f.round()).and_then(|f| Value::Float(f).to_integer()))
                    .map(Value::Integer)
                    .unwrap_or_default(),
            },
            ScalarFunction::Float => arg(0).to_float().map(Value::Float).unwrap_or_default(),
            ScalarFunction::String => arg(0).to_text().map(Value::String).unwrap_or_default(),
            ScalarFunction::Boolean => arg(0).to_boolean().map(Value::Boolean).unwrap_or_default(),
            ScalarFunction::Datetime => match arg(0) {
                Value::Integer(secs) => tz.timestamp_opt(*secs, 0).single().map(Value::Datetime).unwrap_or_default(),
                other => other.to_datetime(tz).map(Value::Datetime).unwrap_or_default(),
            },
        };
        Ok(value)
    }
}

fn finite(f: f64) -> Value {
    if f.is_finite() { Value::Float(f) } else { Value::Null }
}

fn numeric(value: &Value, op: impl Fn(f64) -> f64) -> Value {
    value.to_float().map(|f| finite(op(f))).unwrap_or_default()
}

/// CEIL / FLOOR: integers pass through, floats become integers when they fit.
fn integral(value: &Value, op: impl Fn(f64) -> f64) -> Value {
    if let Value::Integer(i) = value {
        return Value::Integer(*i);
    }
    match value.to_float() {
        Some(f) => {
            let r = op(f);
            Value::Float(r).to_integer().map(Value::Integer).unwrap_or_else(|| finite(r))
        }
        None => Value::Null,
    }
}

/// Half away from zero at `places` decimal digits.
fn round(value: &Value, places: Option<&Value>) -> QueryResult<Value> {
    let places = match places {
        None => 0,
        Some(p) if p.is_null() => return Ok(Value::Null),
        Some(p) => p.to_integer().ok_or_else(|| QueryError::FunctionArgumentError {
            name: "ROUND".to_string(),
            expected: "an integer for the number of decimal places".to_string(),
        })?,
    };
    if let Value::Integer(i) = value
        && places >= 0
    {
        return Ok(Value::Integer(*i));
    }
    let Some(f) = value.to_float() else {
        return Ok(Value::Null);
    };
    let scale = 10f64.powi(places.clamp(-308, 308) as i32);
    Ok(finite((f * scale).round() / scale))
}

fn text(value: &Value, op: impl Fn(&str) -> String) -> Value {
    value.to_text().map(|s| Value::String(op(&s))).unwrap_or_default()
}

fn trim(args: &[Value], op: impl Fn(&str, &[char]) -> String) -> Value {
    let Some(s) = args.first().and_then(Value::to_text) else {
        return Value::Null;
    };
    let set: Vec<char> = match args.get(1) {
        Some(v) => match v.to_text() {
            Some(chars) => chars.chars().collect(),
            None => return Value::Null,
        },
        None => vec![' ', '\t', '\n', '\r'],
    };
    Value::String(op(&s, &set))
}

/// 1-based start; a negative start counts from the end.
fn substr(value: &Value, start: &Value, length: Option<&Value>) -> Value {
    let (Some(s), Some(start)) = (value.to_text(), start.to_integer()) else {
        return Value::Null;
    };
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let from = match start {
        0 => 0,
        s if s > 0 => s - 1,
        s => (n + s).max(0),
    };
    if from >= n {
        return Value::String(String::new());
    }
    let to = match length {
        None => n,
        Some(l) => match l.to_integer() {
            Some(l) if l >= 0 => from.saturating_add(l).min(n),
            _ => return Value::Null,
        },
    };
    Value::String(chars[from as usize..to as usize].iter().collect())
}

fn component(value: &Value, tz: &FixedOffset, op: impl Fn(&DateTime<FixedOffset>) -> i64) -> Value {
    value.to_datetime(tz).map(|dt| Value::Integer(op(&dt))).unwrap_or_default()
}

fn format_datetime(dt: &DateTime<FixedOffset>, format: &str) -> QueryResult<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(QueryError::FunctionArgumentError {
            name: "DATETIME_FORMAT".to_string(),
            expected: format!("a valid format string, got '{format}'"),
        });
    }
    let mut out = String::new();
    write!(out, "{}", dt.format_with_items(items.into_iter())).map_err(|_| QueryError::FunctionArgumentError {
        name: "DATETIME_FORMAT".to_string(),
        expected: format!("a format applicable to a datetime, got '{format}'"),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FunctionContext {
        let tz = FixedOffset::east_opt(0).unwrap();
        FunctionContext {
            now: tz.with_ymd_and_hms(2012, 2, 3, 9, 18, 15).unwrap(),
            timezone: tz,
        }
    }

    fn call(f: ScalarFunction, args: &[Value]) -> Value {
        f.call(args, &ctx()).unwrap()
    }

    #[test]
    fn null_handling() {
        assert_eq!(call(ScalarFunction::Coalesce, &[Value::Null, Value::from("a")]), Value::from("a"));
        assert_eq!(call(ScalarFunction::Ifnull, &[Value::Null, Value::Integer(1)]), Value::Integer(1));
        assert_eq!(call(ScalarFunction::Nullif, &[Value::from("1"), Value::Integer(1)]), Value::Null);
        assert_eq!(call(ScalarFunction::Upper, &[Value::Null]), Value::Null);
    }

    #[test]
    fn numeric_functions() {
        assert_eq!(call(ScalarFunction::Abs, &[Value::from("-3")]), Value::Float(3.0));
        assert_eq!(call(ScalarFunction::Abs, &[Value::Integer(-3)]), Value::Integer(3));
        assert_eq!(call(ScalarFunction::Ceil, &[Value::Float(1.2)]), Value::Integer(2));
        assert_eq!(call(ScalarFunction::Round, &[Value::Float(1.25), Value::Integer(1)]), Value::Float(1.3));
        assert_eq!(call(ScalarFunction::Round, &[Value::Float(-2.5)]), Value::Float(-3.0));
        assert_eq!(call(ScalarFunction::Sqrt, &[Value::Integer(-1)]), Value::Null);
        assert_eq!(call(ScalarFunction::Power, &[Value::Integer(2), Value::Integer(10)]), Value::Float(1024.0));
    }

    #[test]
    fn string_functions() {
        assert_eq!(call(ScalarFunction::Substr, &[Value::from("abcdef"), Value::Integer(2), Value::Integer(3)]), Value::from("bcd"));
        assert_eq!(call(ScalarFunction::Substr, &[Value::from("abcdef"), Value::Integer(-2)]), Value::from("ef"));
        assert_eq!(call(ScalarFunction::Trim, &[Value::from("--a--"), Value::from("-")]), Value::from("a"));
        assert_eq!(call(ScalarFunction::Len, &[Value::from("日本語")]), Value::Integer(3));
        assert_eq!(
            call(ScalarFunction::Replace, &[Value::from("a-b-c"), Value::from("-"), Value::from("+")]),
            Value::from("a+b+c")
        );
    }

    #[test]
    fn substr_at_integer_limits() {
        let abc = Value::from("abc");
        assert_eq!(call(ScalarFunction::Substr, &[abc.clone(), Value::Integer(2), Value::Integer(i64::MAX)]), Value::from("bc"));
        assert_eq!(call(ScalarFunction::Substr, &[abc.clone(), Value::Integer(i64::MAX), Value::Integer(i64::MAX)]), Value::from(""));
        assert_eq!(call(ScalarFunction::Substr, &[abc.clone(), Value::Integer(i64::MIN), Value::Integer(2)]), Value::from("ab"));
        assert_eq!(call(ScalarFunction::Substr, &[abc, Value::Integer(1), Value::Integer(i64::MIN)]), Value::Null);
    }

    #[test]
    fn datetime_functions() {
        assert_eq!(call(ScalarFunction::Now, &[]), Value::Datetime(ctx().now));
        assert_eq!(call(ScalarFunction::Year, &[Value::from("2012-02-03")]), Value::Integer(2012));
        assert_eq!(
            call(ScalarFunction::DatetimeFormat, &[Value::from("2012-02-03 09:18:15"), Value::from("%Y/%m/%d")]),
            Value::from("2012/02/03")
        );
        assert!(ScalarFunction::DatetimeFormat
            .call(&[Value::from("2012-02-03"), Value::from("%Q")], &ctx())
            .is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call(ScalarFunction::Integer, &[Value::from("2.6")]), Value::Integer(3));
        assert_eq!(call(ScalarFunction::Boolean, &[Value::from("false")]), Value::Boolean(false));
        assert_eq!(call(ScalarFunction::String, &[Value::Integer(1)]), Value::from("1"));
        assert_eq!(call(ScalarFunction::Float, &[Value::from("x")]), Value::Null);
    }
}
