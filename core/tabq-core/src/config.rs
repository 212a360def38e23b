//! Execution configuration
//!
//! 실행 시 사용되는 설정 값. JSON에서 읽거나 빌더 메서드로 구성합니다.
//!
//! ```rust
//! use tabq_core::ExecutionConfig;
//!
//! let config = ExecutionConfig::from_json(r#"{"cpu": 2, "timezone": "+09:00"}"#).unwrap();
//! assert_eq!(config.cpu, 2);
//! ```

use crate::error::{QueryError, QueryResult};
use crate::value::Value;
use crate::view::FieldNameMatch;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait for a table lock.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum number of records before work is split across workers.
pub const DEFAULT_MIN_ROWS_FOR_PARALLEL: usize = 1000;

/// 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Fixed statement timestamp; the wall clock at statement start when unset
    pub now: Option<DateTime<FixedOffset>>,
    /// Zone applied to datetime strings without an offset
    #[serde(with = "offset_serde")]
    pub timezone: FixedOffset,
    /// Worker count
    pub cpu: usize,
    /// Wait for a table lock before failing
    #[serde(with = "duration_serde")]
    pub wait_timeout: Duration,
    pub field_name_match: FieldNameMatch,
    /// Pad outer joins with empty strings instead of NULL
    pub without_null: bool,
    pub min_rows_for_parallel: usize,
    /// Reject duplicate output column names
    pub strict_column_names: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            now: None,
            timezone: utc(),
            cpu: default_cpu(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            field_name_match: FieldNameMatch::IgnoreCase,
            without_null: false,
            min_rows_for_parallel: DEFAULT_MIN_ROWS_FOR_PARALLEL,
            strict_column_names: false,
        }
    }
}

/// Half of the logical CPUs, at least one.
pub fn default_cpu() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.cpu == 0 {
            return Err(QueryError::Configuration("cpu must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_cpu(mut self, cpu: usize) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_field_name_match(mut self, matching: FieldNameMatch) -> Self {
        self.field_name_match = matching;
        self
    }

    pub fn with_without_null(mut self, without_null: bool) -> Self {
        self.without_null = without_null;
        self
    }

    pub fn with_min_rows_for_parallel(mut self, min_rows: usize) -> Self {
        self.min_rows_for_parallel = min_rows;
        self
    }

    pub fn with_strict_column_names(mut self, strict: bool) -> Self {
        self.strict_column_names = strict;
        self
    }

    /// Timestamp for the statement about to run.
    pub fn statement_time(&self) -> DateTime<FixedOffset> {
        self.now.unwrap_or_else(|| Utc::now().with_timezone(&self.timezone))
    }

    /// Value used to pad records on the outer side of a join.
    pub fn blank_value(&self) -> Value {
        if self.without_null {
            Value::String(String::new())
        } else {
            Value::Null
        }
    }
}

/// `"UTC"`, `"Z"` or `"+09:00"` / `"-0530"`
mod offset_serde {
    use chrono::FixedOffset;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(offset: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&offset.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedOffset, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| de::Error::custom(format!("invalid time zone offset: {s}")))
    }

    pub(super) fn parse(s: &str) -> Option<FixedOffset> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return FixedOffset::east_opt(0);
        }
        let (sign, rest) = match s.as_bytes().first()? {
            b'+' => (1, &s[1..]),
            b'-' => (-1, &s[1..]),
            _ => return None,
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    }
}

/// Seconds as a float
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|e| de::Error::custom(format!("invalid wait timeout: {e}")))
    }
}
