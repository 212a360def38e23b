//! Parallel Query Executor
//!
//! 레코드 구간 단위 병렬 처리: `0..len`을 연속된 청크로 나누어 Rayon 스레드 풀에서
//! 동시에 처리하고, 청크 순서대로 결과를 이어 붙입니다. 한 청크가 실패하면
//! 공유 취소 플래그를 세워 나머지 청크가 일찍 멈추도록 합니다.

use crate::config::DEFAULT_MIN_ROWS_FOR_PARALLEL;
use crate::engine::ParallelExecutionEngine;
use crate::error::{QueryError, QueryResult};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 병렬 쿼리 실행기
///
/// 총 행 수가 `min_rows_for_parallel`의 두 배 미만이면 순차 실행으로 fallback합니다.
#[derive(Clone)]
pub struct ParallelQueryExecutor {
    /// 병렬화 최소 행 수 (청크 하나당)
    min_rows_for_parallel: usize,
    /// 사용할 스레드 풀 (None이면 순차 실행)
    thread_pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for ParallelQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelQueryExecutor")
            .field("min_rows_for_parallel", &self.min_rows_for_parallel)
            .field("threads", &self.thread_count())
            .finish()
    }
}

impl ParallelQueryExecutor {
    /// 순차 실행기 (스레드 풀 없음)
    pub fn new() -> Self {
        Self {
            min_rows_for_parallel: DEFAULT_MIN_ROWS_FOR_PARALLEL,
            thread_pool: None,
        }
    }

    /// Executor over the engine's shared pool.
    pub fn from_engine(engine: &ParallelExecutionEngine) -> Self {
        Self::new().with_thread_pool(Arc::clone(engine.thread_pool()))
    }

    /// 커스텀 스레드 풀 설정
    pub fn with_thread_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    /// 병렬화 최소 행 수 설정
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows_for_parallel = min_rows.max(1);
        self
    }

    pub fn thread_count(&self) -> usize {
        self.thread_pool.as_ref().map(|p| p.current_num_threads()).unwrap_or(1)
    }

    /// Number of chunks `len` records are split into.
    fn chunk_count(&self, len: usize) -> usize {
        if len < self.min_rows_for_parallel.saturating_mul(2) {
            return 1;
        }
        (len / self.min_rows_for_parallel).clamp(1, self.thread_count())
    }

    /// Run `op` over contiguous chunks of `0..len` and concatenate the
    /// chunk outputs in chunk order.
    ///
    /// `op` should poll the cancel flag and return [`QueryError::Cancelled`]
    /// once it is raised. The error returned is the first real error in
    /// chunk order.
    pub fn map_chunks<T, F>(&self, len: usize, op: F) -> QueryResult<Vec<T>>
    where
        T: Send,
        F: Fn(Range<usize>, &AtomicBool) -> QueryResult<Vec<T>> + Sync,
    {
        let chunks = self.chunk_count(len);
        let cancel = AtomicBool::new(false);

        let pool = match &self.thread_pool {
            Some(pool) if chunks > 1 => pool,
            _ => return op(0..len, &cancel),
        };

        let size = len.div_ceil(chunks);
        let ranges: Vec<Range<usize>> = (0..chunks)
            .map(|c| (c * size).min(len)..((c + 1) * size).min(len))
            .collect();
        tracing::debug!(target: "tabq::parallel", records = len, chunks, "parallel dispatch");

        let results: Vec<QueryResult<Vec<T>>> = pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(QueryError::Cancelled);
                    }
                    let result = op(range, &cancel);
                    if result.is_err() {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });

        let mut out = Vec::with_capacity(len);
        let mut cancelled = false;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(part) => out.extend(part),
                Err(QueryError::Cancelled) => cancelled = true,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None if cancelled => Err(QueryError::Cancelled),
            None => Ok(out),
        }
    }

    /// Apply `f` to every index of `0..len`, preserving order.
    pub fn map_records<T, F>(&self, len: usize, f: F) -> QueryResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> QueryResult<T> + Sync,
    {
        self.map_chunks(len, |range, cancel| {
            let mut out = Vec::with_capacity(range.len());
            for i in range {
                if cancel.load(Ordering::Relaxed) {
                    return Err(QueryError::Cancelled);
                }
                out.push(f(i)?);
            }
            Ok(out)
        })
    }
}

impl Default for ParallelQueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallel(threads: usize, min_rows: usize) -> ParallelQueryExecutor {
        let engine = ParallelExecutionEngine::new_fixed(threads).unwrap();
        ParallelQueryExecutor::from_engine(&engine).with_min_rows(min_rows)
    }

    #[test]
    fn test_sequential_fallback_for_small_input() {
        let executor = parallel(4, 1000);
        assert_eq!(executor.chunk_count(1500), 1);
        let out = executor.map_records(10, |i| Ok(i * 2)).unwrap();
        assert_eq!(out, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_order_preserved_across_chunks() {
        let executor = parallel(4, 10);
        assert_eq!(executor.chunk_count(10_000), 4);
        let out = executor.map_records(10_000, |i| Ok(i as i64)).unwrap();
        assert_eq!(out.len(), 10_000);
        assert!(out.windows(2).all(|w| w[0] + 1 == w[1]));
    }

    #[test]
    fn test_first_error_wins() {
        let executor = parallel(4, 10);
        let err = executor
            .map_records(1_000, |i| {
                if i == 500 {
                    Err(QueryError::FieldNotExist("c9".to_string()))
                } else {
                    Ok(i)
                }
            })
            .unwrap_err();
        assert_eq!(err, QueryError::FieldNotExist("c9".to_string()));
    }

    #[test]
    fn test_chunks_can_filter() {
        let executor = parallel(2, 10);
        let evens = executor
            .map_chunks(100, |range, _| Ok(range.filter(|i| i % 2 == 0).collect()))
            .unwrap();
        assert_eq!(evens.len(), 50);
        assert_eq!(evens[1], 2);
    }
}
