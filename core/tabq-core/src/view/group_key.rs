//! Canonical group key
//!
//! GROUP BY, DISTINCT and set operations hash rows through `GroupKey`.
//! Values that compare equal after numeric coercion share one key part, and
//! NULL parts are equal to each other (NULLs collapse into a single group).

use crate::value::{Ternary, Value};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Integer(i64),
    /// f64 bit pattern of a non-integral float
    Float(u64),
    Boolean(bool),
    /// (unix seconds, subsecond nanos) in UTC
    Datetime(i64, u32),
    String(String),
}

impl KeyPart {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Integer(i) => KeyPart::Integer(*i),
            Value::Float(f) => float_part(*f),
            Value::Boolean(b) => KeyPart::Boolean(*b),
            Value::Ternary(Ternary::Unknown) => KeyPart::Null,
            Value::Ternary(t) => KeyPart::Boolean(t.is_true()),
            Value::Datetime(dt) => KeyPart::Datetime(dt.timestamp(), dt.timestamp_subsec_nanos()),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    KeyPart::Integer(i)
                } else if let Ok(f) = trimmed.parse::<f64>()
                    && f.is_finite()
                {
                    float_part(f)
                } else {
                    KeyPart::String(s.clone())
                }
            }
        }
    }
}

fn float_part(f: f64) -> KeyPart {
    match Value::Float(f).to_integer() {
        Some(i) => KeyPart::Integer(i),
        None => KeyPart::Float(f.to_bits()),
    }
}

/// 그룹 키 (값 튜플의 정규화 형태)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupKey(SmallVec<[KeyPart; 4]>);

impl GroupKey {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        Self(values.into_iter().map(KeyPart::from_value).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}
