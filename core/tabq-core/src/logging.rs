//! Logging utilities for tabq
//!
//! 엔진은 `tabq::select`, `tabq::parallel` 타깃에 `debug!`, `tabq::dml` 타깃에
//! `info!` 이벤트를 남깁니다. 이 모듈은 그 이벤트를 보는 subscriber를 설치합니다.
//! `RUST_LOG`가 있으면 그 값이 우선이고, 없으면 주어진 레벨이 `tabq` 타깃에만
//! 적용됩니다.

use crate::error::{QueryError, QueryResult};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// Targets the engine logs under.
pub const TARGETS: [&str; 3] = ["tabq::select", "tabq::parallel", "tabq::dml"];

fn parse_level(level: &str) -> QueryResult<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| QueryError::Configuration(format!("unknown log level '{level}'")))
}

/// Install the subscriber at `info`.
///
/// # Example
/// ```rust
/// tabq_core::logging::init().ok();
/// ```
pub fn init() -> QueryResult<()> {
    init_with_level("info")
}

/// Install the subscriber with `level` applied to the `tabq` targets.
///
/// Fails with [`QueryError::Configuration`] for an unknown level or when a
/// global subscriber is already installed.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) -> QueryResult<()> {
    let level = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("tabq={level}")));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| QueryError::Configuration(format!("tracing subscriber not installed: {e}")))
}

/// Verbose subscriber for tests; a second call keeps the first subscriber.
#[cfg(feature = "logging")]
pub fn init_test() {
    let installed = fmt()
        .with_env_filter(EnvFilter::new("tabq=debug"))
        .with_test_writer()
        .try_init();
    if let Err(e) = installed {
        tracing::debug!(target: "tabq::select", error = %e, "test subscriber already installed");
    }
}

// Without the feature only the level is checked
#[cfg(not(feature = "logging"))]
pub fn init_with_level(level: &str) -> QueryResult<()> {
    parse_level(level).map(|_| ())
}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
