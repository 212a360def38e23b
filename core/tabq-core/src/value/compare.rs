//! Value comparison
//!
//! `compare_values` implements the three-valued comparison used by operators;
//! `sort_ordering` is the total order used by ORDER BY and MIN/MAX.

use super::Value;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;

/// Compare two values after coercion.
///
/// Returns `None` when either side is NULL or when the pair is
/// incommensurable; operators turn `None` into UNKNOWN.
pub fn compare_values(lhs: &Value, rhs: &Value, tz: &FixedOffset) -> Option<Ordering> {
    if lhs.is_null() || rhs.is_null() {
        return None;
    }

    if let (Some(l), Some(r)) = (lhs.to_integer(), rhs.to_integer()) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (lhs.to_float(), rhs.to_float()) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (lhs.to_datetime(tz), rhs.to_datetime(tz)) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (lhs.to_boolean(), rhs.to_boolean()) {
        return Some(l.cmp(&r));
    }
    if let (Value::String(l), Value::String(r)) = (lhs, rhs) {
        return Some(l.as_str().cmp(r.as_str()));
    }
    None
}

/// 정렬용 전순서. NULL 위치는 호출자가 결정하므로 여기서는 가장 작은 값으로 둡니다.
///
/// Each operand is classified once into a `SortKey`; keys of different
/// classes order by class (numbers < datetimes < booleans < text), keys of
/// the same class by their canonical value. Number-like strings are numbers,
/// so `"10"`, `10` and `10.0` tie.
pub fn sort_ordering(lhs: &Value, rhs: &Value, tz: &FixedOffset) -> Ordering {
    SortKey::classify(lhs, tz).cmp(&SortKey::classify(rhs, tz))
}

/// Canonical sort form of a value. Variant order is the class rank.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortKey<'a> {
    Null,
    Number(Number),
    Datetime(DateTime<FixedOffset>),
    Boolean(bool),
    Text(&'a str),
}

impl<'a> SortKey<'a> {
    pub(crate) fn classify(value: &'a Value, tz: &FixedOffset) -> Self {
        match value {
            Value::Null => SortKey::Null,
            Value::Integer(i) => SortKey::Number(Number::Int(*i)),
            Value::Float(f) => SortKey::Number(Number::Float(*f)),
            Value::Datetime(dt) => SortKey::Datetime(*dt),
            Value::Boolean(b) => SortKey::Boolean(*b),
            Value::Ternary(t) => t.to_bool().map_or(SortKey::Null, SortKey::Boolean),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    SortKey::Number(Number::Int(i))
                } else if let Some(f) = value.to_float() {
                    SortKey::Number(Number::Float(f))
                } else if let Some(dt) = value.to_datetime(tz) {
                    SortKey::Datetime(dt)
                } else {
                    match trimmed.to_ascii_lowercase().as_str() {
                        "true" => SortKey::Boolean(true),
                        "false" => SortKey::Boolean(false),
                        _ => SortKey::Text(s.as_str()),
                    }
                }
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Number(_) => 1,
            SortKey::Datetime(_) => 2,
            SortKey::Boolean(_) => 3,
            SortKey::Text(_) => 4,
        }
    }
}

impl Eq for SortKey<'_> {}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(l), SortKey::Number(r)) => l.cmp(r),
            (SortKey::Datetime(l), SortKey::Datetime(r)) => l.cmp(r),
            (SortKey::Boolean(l), SortKey::Boolean(r)) => l.cmp(r),
            (SortKey::Text(l), SortKey::Text(r)) => l.cmp(r),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Exact numeric value; integers never round through `f64`.
/// NaN sorts above every other number and equal to itself.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Number::Int(l), Number::Int(r)) => l.cmp(&r),
            (Number::Int(l), Number::Float(r)) => int_float(l, r),
            (Number::Float(l), Number::Int(r)) => int_float(r, l).reverse(),
            (Number::Float(l), Number::Float(r)) => match (l.is_nan(), r.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                // -0.0 == 0.0 keeps ties consistent with Int(0).
                (false, false) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            },
        }
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

fn int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    // whole is inside [-2^63, 2^63) so the cast is exact.
    i.cmp(&(whole as i64)).then_with(|| {
        let fraction = f - whole;
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Ternary;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn string_numbers_compare_numerically() {
        let tz = utc();
        assert_eq!(
            compare_values(&Value::from("10"), &Value::Integer(9), &tz),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&Value::Integer(1), &Value::Float(1.0), &tz),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::from("1.5"), &Value::Integer(2), &tz),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn null_and_incommensurable_are_unknown() {
        let tz = utc();
        assert_eq!(compare_values(&Value::Null, &Value::Null, &tz), None);
        assert_eq!(compare_values(&Value::Integer(5), &Value::from("abc"), &tz), None);
    }

    #[test]
    fn datetime_and_boolean_and_string() {
        let tz = utc();
        assert_eq!(
            compare_values(&Value::from("2012-01-01"), &Value::from("2011-12-31 23:59:59"), &tz),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&Value::Ternary(Ternary::True), &Value::from("true"), &tz),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::from("abc"), &Value::from("abd"), &tz),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn sort_ordering_is_total() {
        let tz = utc();
        assert_eq!(sort_ordering(&Value::Null, &Value::Integer(1), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(1), &Value::from("abc"), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::from("b"), &Value::from("a"), &tz), Ordering::Greater);
    }

    #[test]
    fn sort_ordering_has_no_cycles_across_kinds() {
        let tz = utc();
        let values = [
            Value::from("!"),
            Value::from("10"),
            Value::Integer(10),
            Value::Integer(1),
            Value::Integer(2),
            Value::Boolean(true),
            Value::from("abc"),
            Value::from("9"),
            Value::Float(1.5),
            Value::Float(f64::NAN),
            Value::Integer(i64::MAX),
            Value::Float(TWO_POW_63),
            Value::Ternary(Ternary::False),
            Value::from("2012-01-01"),
        ];
        for a in &values {
            for b in &values {
                let ab = sort_ordering(a, b, &tz);
                assert_eq!(ab, sort_ordering(b, a, &tz).reverse(), "{a:?} vs {b:?}");
                for c in &values {
                    if ab != Ordering::Greater && sort_ordering(b, c, &tz) != Ordering::Greater {
                        assert_ne!(sort_ordering(a, c, &tz), Ordering::Greater, "{a:?} <= {b:?} <= {c:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn sort_ordering_classifies_once() {
        let tz = utc();
        // number-like strings are numbers; booleans are never coerced from 1/0
        assert_eq!(sort_ordering(&Value::from("10"), &Value::Integer(10), &tz), Ordering::Equal);
        assert_eq!(sort_ordering(&Value::Integer(1), &Value::Integer(2), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(2), &Value::Boolean(true), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(10), &Value::from("!"), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::from("!"), &Value::from("10"), &tz), Ordering::Greater);
        assert_eq!(sort_ordering(&Value::from("TRUE"), &Value::Boolean(true), &tz), Ordering::Equal);

        let mut values = vec![
            Value::Boolean(true),
            Value::from("abc"),
            Value::Integer(2),
            Value::from("!"),
            Value::from("10"),
            Value::Integer(1),
            Value::from("9"),
        ];
        values.sort_by(|a, b| sort_ordering(a, b, &tz));
        assert_eq!(
            values,
            vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::from("9"),
                Value::from("10"),
                Value::Boolean(true),
                Value::from("!"),
                Value::from("abc"),
            ]
        );
    }

    #[test]
    fn integers_order_exactly_against_floats() {
        let tz = utc();
        assert_eq!(sort_ordering(&Value::Integer(i64::MAX), &Value::Float(TWO_POW_63), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(i64::MAX - 1), &Value::Integer(i64::MAX), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(-2), &Value::Float(-1.5), &tz), Ordering::Less);
        assert_eq!(sort_ordering(&Value::Integer(0), &Value::Float(-0.0), &tz), Ordering::Equal);
        assert_eq!(sort_ordering(&Value::Float(f64::NAN), &Value::Float(f64::INFINITY), &tz), Ordering::Greater);
    }
}
