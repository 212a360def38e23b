//! Operators over values

use super::{Ternary, Value, compare_values};
use crate::error::{QueryError, QueryResult};
use chrono::FixedOffset;
use std::cmp::Ordering;
use std::fmt;

/// 산술 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulo => "%",
        };
        f.write_str(s)
    }
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOperator {
    /// Three-valued comparison of two values.
    pub fn evaluate(self, lhs: &Value, rhs: &Value, tz: &FixedOffset) -> Ternary {
        match compare_values(lhs, rhs, tz) {
            None => Ternary::Unknown,
            Some(ord) => Ternary::from_bool(self.holds(ord)),
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ord == Ordering::Equal,
            ComparisonOperator::NotEqual => ord != Ordering::Equal,
            ComparisonOperator::Less => ord == Ordering::Less,
            ComparisonOperator::LessOrEqual => ord != Ordering::Greater,
            ComparisonOperator::Greater => ord == Ordering::Greater,
            ComparisonOperator::GreaterOrEqual => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterOrEqual => ">=",
        };
        f.write_str(s)
    }
}

/// Apply an arithmetic operator.
///
/// NULL and non-numeric strings yield NULL. Boolean, ternary and datetime
/// operands are a type mismatch.
pub fn arithmetic(op: ArithmeticOperator, lhs: &Value, rhs: &Value) -> QueryResult<Value> {
    for operand in [lhs, rhs] {
        if matches!(operand, Value::Boolean(_) | Value::Ternary(_) | Value::Datetime(_)) {
            return Err(QueryError::TypeMismatch {
                expr: format!("{} {} {}", lhs.type_name(), op, rhs.type_name()),
                message: format!("{} operand is not numeric", operand.type_name()),
            });
        }
    }
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }

    if let (Some(l), Some(r)) = (integer_operand(lhs), integer_operand(rhs)) {
        let checked = match op {
            ArithmeticOperator::Add => l.checked_add(r),
            ArithmeticOperator::Subtract => l.checked_sub(r),
            ArithmeticOperator::Multiply => l.checked_mul(r),
            ArithmeticOperator::Divide => {
                if r == 0 {
                    return Ok(Value::Null);
                }
                // i64::MIN / -1 overflows; None falls through to the float path.
                match l.checked_rem(r) {
                    Some(0) => l.checked_div(r),
                    Some(_) => return Ok(Value::Float(l as f64 / r as f64)),
                    None => None,
                }
            }
            ArithmeticOperator::Modulo => {
                if r == 0 {
                    return Ok(Value::Null);
                }
                // wrapping_rem only wraps for i64::MIN % -1, where 0 is exact.
                Some(l.wrapping_rem(r))
            }
        };
        if let Some(v) = checked {
            return Ok(Value::Integer(v));
        }
    }

    let (Some(l), Some(r)) = (lhs.to_float(), rhs.to_float()) else {
        return Ok(Value::Null);
    };
    let result = match op {
        ArithmeticOperator::Add => l + r,
        ArithmeticOperator::Subtract => l - r,
        ArithmeticOperator::Multiply => l * r,
        ArithmeticOperator::Divide => {
            if r == 0.0 {
                return Ok(Value::Null);
            }
            l / r
        }
        ArithmeticOperator::Modulo => {
            if r == 0.0 {
                return Ok(Value::Null);
            }
            l % r
        }
    };
    Ok(if result.is_finite() { Value::Float(result) } else { Value::Null })
}

/// Integer operands only come from integers and integer-looking strings;
/// a float stays a float even when its fraction is zero.
fn integer_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Unary minus.
pub fn negate(value: &Value) -> QueryResult<Value> {
    arithmetic(ArithmeticOperator::Subtract, &Value::Integer(0), value)
}

/// `||` concatenation; any NULL operand yields NULL.
pub fn concat(values: &[Value]) -> Value {
    let mut out = String::new();
    for value in values {
        match value.to_text() {
            Some(s) => out.push_str(&s),
            None => return Value::Null,
        }
    }
    Value::String(out)
}
