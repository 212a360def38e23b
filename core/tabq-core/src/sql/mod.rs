//! SQL 모듈 진입점
//!
//! 구문 트리([`ast`])는 외부 파서가 만들어 넘겨줍니다. 이 모듈은 트리를 평가하고
//! ([`eval`], [`filter`], [`functions`]) 문장을 실행합니다([`executor`]).

pub mod ast;
pub mod eval;
pub mod executor;
pub mod filter;
pub mod functions;

pub use eval::{evaluate, evaluate_condition};
pub use executor::{Executor, ParallelQueryExecutor, StatementResult};
pub use filter::{Filter, QueryContext, Variables};
pub use functions::{AggregateUdf, Arity, FunctionRegistry, ScalarUdf};
