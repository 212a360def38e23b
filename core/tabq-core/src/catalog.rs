//! Catalog: source tables handed over by readers
//!
//! 테이블 이름(대소문자 무시) → 뷰. 읽기는 공유 잠금 아래에서 스냅샷(`Arc<View>`)을
//! 가져가고, DML은 업그레이드 가능한 읽기 잠금으로 새 값을 모두 계산한 뒤 쓰기
//! 잠금으로 승격하여 적용합니다. 잠금 대기가 `wait_timeout`을 넘기면 실패합니다.

use crate::error::{QueryError, QueryResult};
use crate::value::Value;
use crate::view::View;
use ahash::AHashMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::sync::Arc;
use std::time::Duration;

type TableSlot = Arc<RwLock<Arc<View>>>;

/// 테이블 카탈로그
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<AHashMap<String, TableSlot>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table from a header and decoded rows.
    pub fn register<S: AsRef<str>>(&self, name: &str, columns: &[S], rows: Vec<Vec<Value>>) -> QueryResult<()> {
        let view = View::from_rows(name, columns, rows)?;
        self.register_view(name, view)
    }

    /// Register an existing view under `name`; its table fields are requalified.
    pub fn register_view(&self, name: &str, mut view: View) -> QueryResult<()> {
        let key = name.to_lowercase();
        let mut tables = self.tables.write();
        if tables.contains_key(&key) {
            return Err(QueryError::TableAlreadyExists(name.to_string()));
        }
        view.header.update_qualifier(name);
        view.set_source(name);
        tracing::debug!(table = name, records = view.len(), fields = view.field_count(), "table registered");
        tables.insert(key, Arc::new(RwLock::new(Arc::new(view))));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(&name.to_lowercase())
    }

    /// Registered table names (lower-cased), sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn drop_table(&self, name: &str) -> QueryResult<()> {
        self.tables
            .write()
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    fn slot(&self, name: &str) -> QueryResult<TableSlot> {
        self.tables
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    /// Current contents of a table, waiting at most `timeout` for a writer.
    pub fn snapshot(&self, name: &str, timeout: Duration) -> QueryResult<Arc<View>> {
        let slot = self.slot(name)?;
        let guard = slot.try_read_for(timeout).ok_or_else(|| QueryError::Timeout {
            resource: format!("table {name}"),
            waited_ms: timeout.as_millis(),
        })?;
        Ok(Arc::clone(&*guard))
    }

    /// Mutate a table in two phases.
    ///
    /// `plan` runs under an upgradable read lock (other readers, including
    /// subqueries of the same statement, may still snapshot the table) and
    /// computes every change. Only when it succeeds is the lock upgraded and
    /// `apply` run, so a failed plan leaves the table untouched.
    pub fn update<P, R>(
        &self,
        name: &str,
        timeout: Duration,
        plan: impl FnOnce(&View) -> QueryResult<P>,
        apply: impl FnOnce(&mut View, P) -> R,
    ) -> QueryResult<R> {
        let slot = self.slot(name)?;
        let conflict = || QueryError::WriteConflict {
            table: name.to_string(),
            waited_ms: timeout.as_millis(),
        };

        let guard = slot.try_upgradable_read_for(timeout).ok_or_else(conflict)?;
        let changes = plan(&guard)?;
        let mut guard = RwLockUpgradableReadGuard::try_upgrade_for(guard, timeout).map_err(|_| conflict())?;
        Ok(apply(Arc::make_mut(&mut *guard), changes))
    }
}
