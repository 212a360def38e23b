//! SQL Statement Executor Module
//!
//! 한 문장을 실행하는 단위. 실행 전에 문장 안의 모든 함수 호출 지점을 한 번
//! 바인딩하고, 문장마다 고정된 타임스탬프를 가진 [`QueryContext`]를 만든 뒤
//! SELECT 파이프라인([`select`]) 또는 DML([`mutation`])로 넘깁니다.

mod mutation;
pub mod parallel_query;
pub mod select;

pub use parallel_query::ParallelQueryExecutor;

use crate::catalog::Catalog;
use crate::config::ExecutionConfig;
use crate::engine::ParallelExecutionEngine;
use crate::error::QueryResult;
use crate::sql::ast::{SelectQuery, Statement, visit};
use crate::sql::eval::evaluate;
use crate::sql::filter::{Filter, QueryContext, Variables};
use crate::sql::functions::FunctionRegistry;
use crate::view::View;
use std::sync::Arc;
use tracing::instrument;

/// 문장 실행 결과
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// Result of a SELECT
    View(View),
    /// DML / ALTER outcome with the table as it is after the change
    Affected { table: String, count: usize, view: View },
    /// DECLARE / SET
    Declared,
}

impl StatementResult {
    pub fn view(&self) -> Option<&View> {
        match self {
            StatementResult::View(view) | StatementResult::Affected { view, .. } => Some(view),
            StatementResult::Declared => None,
        }
    }

    pub fn affected(&self) -> Option<usize> {
        match self {
            StatementResult::Affected { count, .. } => Some(*count),
            _ => None,
        }
    }
}

/// Statement executor
///
/// Owns the session state that outlives one statement: the user variables.
/// The catalog and the function registry may be shared between executors.
///
/// ```rust
/// use std::sync::Arc;
/// use tabq_core::sql::ast::{SelectEntity, col, lit};
/// use tabq_core::{Catalog, Executor, Value};
///
/// # fn main() -> tabq_core::QueryResult<()> {
/// let catalog = Arc::new(Catalog::new());
/// catalog.register("t", &["c1"], vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]])?;
///
/// let executor = Executor::new(catalog)?;
/// let query = SelectEntity::new().field(col("c1")).from_table("t").filter(col("c1").gt(lit(1))).into_query();
/// let view = executor.query(&query)?;
/// assert_eq!(view.to_rows(), vec![vec![Value::from(2)], vec![Value::from(3)]]);
/// # Ok(())
/// # }
/// ```
pub struct Executor {
    config: ExecutionConfig,
    catalog: Arc<Catalog>,
    functions: Arc<FunctionRegistry>,
    engine: ParallelExecutionEngine,
    variables: Variables,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("tables", &self.catalog.table_names())
            .field("threads", &self.engine.thread_count())
            .field("variables", &self.variables.len())
            .finish()
    }
}

impl Executor {
    /// Executor with the default configuration.
    pub fn new(catalog: Arc<Catalog>) -> QueryResult<Self> {
        Self::with_config(ExecutionConfig::default(), catalog)
    }

    pub fn with_config(config: ExecutionConfig, catalog: Arc<Catalog>) -> QueryResult<Self> {
        config.validate()?;
        let engine = ParallelExecutionEngine::new_fixed(config.cpu)?;
        Ok(Self {
            config,
            catalog,
            functions: Arc::new(FunctionRegistry::new()),
            engine,
            variables: Variables::new(),
        })
    }

    /// Use a shared function registry (user-defined functions).
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    fn context(&self) -> QueryContext {
        let parallel = ParallelQueryExecutor::from_engine(&self.engine).with_min_rows(self.config.min_rows_for_parallel);
        QueryContext::new(
            self.config.clone(),
            Arc::clone(&self.catalog),
            Arc::clone(&self.functions),
            parallel,
        )
    }

    /// Run a SELECT query.
    #[instrument(skip_all)]
    pub fn query(&self, query: &SelectQuery) -> QueryResult<View> {
        visit::try_for_each_in_query(query, &mut |e| self.functions.bind_node(e))?;
        let ctx = self.context();
        select::run_query(query, &Filter::new(&ctx, &self.variables))
    }

    /// Execute one statement.
    #[instrument(skip_all)]
    pub fn execute(&mut self, statement: &Statement) -> QueryResult<StatementResult> {
        visit::try_for_each_in_statement(statement, &mut |e| self.functions.bind_node(e))?;
        let ctx = self.context();

        match statement {
            Statement::Select(query) => {
                let view = select::run_query(query, &Filter::new(&ctx, &self.variables))?;
                tracing::debug!(target: "tabq::select", records = view.len(), fields = view.field_count(), "select");
                Ok(StatementResult::View(view))
            }
            Statement::Insert(insert) => mutation::insert(insert, &Filter::new(&ctx, &self.variables)),
            Statement::Update(update) => mutation::update(update, &Filter::new(&ctx, &self.variables)),
            Statement::Delete(delete) => mutation::delete(delete, &Filter::new(&ctx, &self.variables)),
            Statement::AlterTable(alter) => mutation::alter(alter, &Filter::new(&ctx, &self.variables)),
            Statement::DeclareVariable(declarations) => {
                // all or nothing: a failing declaration leaves the session untouched
                let mut variables = self.variables.clone();
                for (name, expr) in declarations {
                    let value = match expr {
                        Some(expr) => evaluate(expr, &Filter::new(&ctx, &variables))?,
                        None => crate::value::Value::Null,
                    };
                    variables.declare(name, value)?;
                }
                self.variables = variables;
                Ok(StatementResult::Declared)
            }
            Statement::SetVariable { name, value } => {
                let value = evaluate(value, &Filter::new(&ctx, &self.variables))?;
                self.variables.set(name, value)?;
                Ok(StatementResult::Declared)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::sql::ast::{SelectEntity, func, lit, var};
    use crate::value::Value;

    fn executor() -> Executor {
        let catalog = Arc::new(Catalog::new());
        Executor::with_config(ExecutionConfig::default().with_cpu(2), catalog).unwrap()
    }

    #[test]
    fn declare_and_set_variables() {
        let mut executor = executor();
        executor
            .execute(&Statement::DeclareVariable(vec![
                ("a".to_string(), Some(lit(1))),
                ("b".to_string(), Some(var("a") + lit(1))),
            ]))
            .unwrap();
        executor
            .execute(&Statement::SetVariable {
                name: "a".to_string(),
                value: var("b") * lit(10),
            })
            .unwrap();

        let query = SelectEntity::new().field(var("a")).field(var("b")).into_query();
        assert_eq!(
            executor.query(&query).unwrap().to_rows(),
            vec![vec![Value::from(20), Value::from(2)]]
        );
    }

    #[test]
    fn failed_declaration_keeps_session_state() {
        let mut executor = executor();
        let result = executor.execute(&Statement::DeclareVariable(vec![
            ("x".to_string(), None),
            ("x".to_string(), None),
        ]));
        assert!(matches!(result, Err(QueryError::VariableRedeclared(_))));
        assert!(executor.variables().is_empty());
    }

    #[test]
    fn unknown_function_fails_before_execution() {
        let mut executor = executor();
        let query = SelectEntity::new().field(func("nope", vec![])).into_query();
        assert_eq!(
            executor.execute(&Statement::Select(query)).unwrap_err(),
            QueryError::FunctionNotExist("NOPE".to_string())
        );
    }

    #[test]
    fn zero_cpu_is_rejected() {
        let catalog = Arc::new(Catalog::new());
        assert!(matches!(
            Executor::with_config(ExecutionConfig::default().with_cpu(0), catalog),
            Err(QueryError::Configuration(_))
        ));
    }
}
