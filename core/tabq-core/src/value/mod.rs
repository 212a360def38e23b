//! Value layer
//!
//! 스칼라 값의 태그드 유니온. 파일에서 읽은 셀은 대부분 문자열이므로
//! 비교와 연산은 필요한 시점에 정수 → 실수 → 날짜 → 불리언 순으로 변환을 시도합니다.

mod compare;
mod ops;
mod ternary;

pub use compare::{compare_values, sort_ordering};
pub(crate) use compare::SortKey;
pub use ops::{ArithmeticOperator, ComparisonOperator, arithmetic, concat, negate};
pub use ternary::Ternary;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use std::fmt;

/// Datetime layouts accepted when a string is used as a datetime.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// 쿼리 엔진의 스칼라 값
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Ternary(Ternary),
    Integer(i64),
    Float(f64),
    String(String),
    Datetime(DateTime<FixedOffset>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Ternary(_) => "ternary",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Datetime(_) => "datetime",
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => float_to_integer(*f),
            Value::String(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Some(i),
                    Err(_) => s.parse::<f64>().ok().and_then(float_to_integer),
                }
            }
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Datetime view of the value; naive strings are placed in `tz`.
    pub fn to_datetime(&self, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::Datetime(dt) => Some(*dt),
            Value::String(s) => parse_datetime(s.trim(), tz),
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Ternary(t) => t.to_bool(),
            Value::Integer(1) => Some(true),
            Value::Integer(0) => Some(false),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn to_ternary(&self) -> Ternary {
        match self {
            Value::Ternary(t) => *t,
            other => other.to_boolean().map(Ternary::from_bool).unwrap_or(Ternary::Unknown),
        }
    }

    /// String form for string functions; NULL has none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a datetime string in one of the supported layouts.
pub fn parse_datetime(s: &str, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    if s.len() < 8 || !s.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return tz.from_local_datetime(&naive).single();
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(s, layout) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return tz.from_local_datetime(&naive).single();
        }
    }
    None
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Ternary(t) => write!(f, "{t}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Ternary> for Value {
    fn from(v: Ternary) -> Self {
        Value::Ternary(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Datetime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
