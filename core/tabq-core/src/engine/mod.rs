//! Execution engine module
//!
//! 프로세스 전역에서 공유되는 워커 풀.

pub mod parallel_engine;

pub use parallel_engine::{ParallelExecutionEngine, ParallelizationPolicy};
