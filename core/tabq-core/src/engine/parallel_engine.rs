//! Parallel Execution Engine: bounded rayon worker pool
//!
//! Pools are built once per thread count and shared process-wide, so every
//! statement executed with the same `cpu` setting reuses the same workers.

use crate::config::default_cpu;
use crate::error::{QueryError, QueryResult};
use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use std::sync::{Arc, OnceLock};

/// Parallelization policy for the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelizationPolicy {
    /// Half of the logical CPUs, at least one
    #[default]
    Auto,
    /// Use a fixed number of threads
    Fixed(usize),
}

/// size → pool
static POOLS: OnceLock<Mutex<AHashMap<usize, Arc<rayon::ThreadPool>>>> = OnceLock::new();

/// Parallel execution engine using Rayon thread pool
#[derive(Clone)]
pub struct ParallelExecutionEngine {
    thread_pool: Arc<rayon::ThreadPool>,
    policy: ParallelizationPolicy,
}

impl std::fmt::Debug for ParallelExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutionEngine")
            .field("policy", &self.policy)
            .field("threads", &self.thread_count())
            .finish()
    }
}

impl ParallelExecutionEngine {
    /// Engine over the shared pool for the policy's thread count.
    pub fn new(policy: ParallelizationPolicy) -> QueryResult<Self> {
        let num_threads = Self::determine_thread_count(policy);
        if num_threads == 0 {
            return Err(QueryError::InvalidArguments(
                "Thread count must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            thread_pool: Self::shared_pool(num_threads)?,
            policy,
        })
    }

    /// Create a new parallel execution engine with automatic thread count
    pub fn new_auto() -> QueryResult<Self> {
        Self::new(ParallelizationPolicy::Auto)
    }

    /// Create a new parallel execution engine with a fixed number of threads
    pub fn new_fixed(num_threads: usize) -> QueryResult<Self> {
        Self::new(ParallelizationPolicy::Fixed(num_threads))
    }

    fn shared_pool(num_threads: usize) -> QueryResult<Arc<rayon::ThreadPool>> {
        let pools = POOLS.get_or_init(|| Mutex::new(AHashMap::new()));
        let mut pools = pools.lock();
        if let Some(pool) = pools.get(&num_threads) {
            return Ok(Arc::clone(pool));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(move |i| format!("tabq-worker-{num_threads}-{i}"))
            .build()
            .map_err(|e| QueryError::ThreadPool(format!("Failed to create thread pool: {e}")))?;
        let pool = Arc::new(pool);
        pools.insert(num_threads, Arc::clone(&pool));
        tracing::debug!(target: "tabq::parallel", threads = num_threads, "worker pool created");
        Ok(pool)
    }

    /// Get the current parallelization policy
    pub fn policy(&self) -> ParallelizationPolicy {
        self.policy
    }

    /// Get the number of threads in the thread pool
    pub fn thread_count(&self) -> usize {
        self.thread_pool.current_num_threads()
    }

    pub fn thread_pool(&self) -> &Arc<rayon::ThreadPool> {
        &self.thread_pool
    }

    /// Execute a closure in the thread pool
    pub fn execute<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.thread_pool.install(f)
    }

    fn determine_thread_count(policy: ParallelizationPolicy) -> usize {
        match policy {
            ParallelizationPolicy::Auto => default_cpu(),
            ParallelizationPolicy::Fixed(n) => n,
        }
    }

    /// Number of chunks to split `workload_size` records into, keeping at
    /// least `min_rows` records per chunk.
    pub fn auto_tune(&self, workload_size: usize, min_rows: usize) -> usize {
        let min_rows = min_rows.max(1);
        if workload_size < min_rows.saturating_mul(2) {
            1
        } else {
            (workload_size / min_rows).clamp(1, self.thread_count())
        }
    }

    /// Check if parallelization is beneficial for the given workload size
    pub fn should_parallelize(&self, workload_size: usize, min_rows: usize) -> bool {
        self.auto_tune(workload_size, min_rows) > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_auto() {
        let engine = ParallelExecutionEngine::new_auto().unwrap();
        assert_eq!(engine.policy(), ParallelizationPolicy::Auto);
        assert_eq!(engine.thread_count(), default_cpu());
    }

    #[test]
    fn test_new_fixed() {
        let engine = ParallelExecutionEngine::new_fixed(4).unwrap();
        assert_eq!(engine.policy(), ParallelizationPolicy::Fixed(4));
        assert_eq!(engine.thread_count(), 4);
    }

    #[test]
    fn test_new_fixed_zero_threads() {
        let result = ParallelExecutionEngine::new_fixed(0);
        assert!(result.is_err());
    }

    #[test]
    fn test_pools_are_shared_per_size() {
        let a = ParallelExecutionEngine::new_fixed(3).unwrap();
        let b = ParallelExecutionEngine::new_fixed(3).unwrap();
        assert!(Arc::ptr_eq(a.thread_pool(), b.thread_pool()));
    }

    #[test]
    fn test_execute() {
        let engine = ParallelExecutionEngine::new_fixed(2).unwrap();
        let result = engine.execute(|| 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_auto_tune_small_workload() {
        let engine = ParallelExecutionEngine::new_fixed(4).unwrap();
        assert_eq!(engine.auto_tune(500, 1000), 1);
        assert!(!engine.should_parallelize(500, 1000));
    }

    #[test]
    fn test_auto_tune_large_workload() {
        let engine = ParallelExecutionEngine::new_fixed(4).unwrap();
        assert_eq!(engine.auto_tune(100_000, 1000), 4);
        assert_eq!(engine.auto_tune(2_500, 1000), 2);
        assert!(engine.should_parallelize(100_000, 1000));
    }
}
