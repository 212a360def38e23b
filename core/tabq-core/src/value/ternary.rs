//! Three-valued logic

use std::fmt;
use std::ops::Not;

/// SQL 3값 논리 (TRUE / FALSE / UNKNOWN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ternary {
    False,
    Unknown,
    True,
}

impl Ternary {
    pub fn from_bool(b: bool) -> Self {
        if b { Ternary::True } else { Ternary::False }
    }

    /// FALSE dominates, then UNKNOWN.
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::True, Ternary::True) => Ternary::True,
            _ => Ternary::Unknown,
        }
    }

    /// TRUE dominates, then UNKNOWN.
    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::False, Ternary::False) => Ternary::False,
            _ => Ternary::Unknown,
        }
    }

    pub fn is_true(self) -> bool {
        self == Ternary::True
    }

    /// Boolean view of a known value; UNKNOWN has none.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Ternary::True => Some(true),
            Ternary::False => Some(false),
            Ternary::Unknown => None,
        }
    }
}

impl Not for Ternary {
    type Output = Ternary;

    fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Unknown => Ternary::Unknown,
        }
    }
}

impl From<bool> for Ternary {
    fn from(b: bool) -> Self {
        Ternary::from_bool(b)
    }
}

impl fmt::Display for Ternary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ternary::True => "TRUE",
            Ternary::False => "FALSE",
            Ternary::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
