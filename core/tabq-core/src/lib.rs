//! # tabq: in-memory relational execution core
//!
//! tabq는 CSV/TSV/JSON/고정폭 파일을 데이터베이스 테이블처럼 다루는 SQL 실행 코어입니다.
//! 파일 리더가 넘겨준 헤더와 디코딩된 행을 [`Catalog`]에 등록하고, 외부 파서가 만든
//! 구문 트리([`sql::ast`])를 [`Executor`]로 실행하면 다시 질의할 수 있는 [`View`]가 나옵니다.
//!
//! ## 빠른 시작
//!
//! ```rust
//! use std::sync::Arc;
//! use tabq_core::sql::ast::{OrderItem, SelectEntity, col, count_all};
//! use tabq_core::{Catalog, Executor, Value};
//!
//! # fn main() -> tabq_core::QueryResult<()> {
//! let catalog = Arc::new(Catalog::new());
//! catalog.register(
//!     "sales",
//!     &["region", "amount"],
//!     vec![
//!         vec![Value::from("east"), Value::from("10")],
//!         vec![Value::from("west"), Value::from("20")],
//!         vec![Value::from("east"), Value::from("5")],
//!     ],
//! )?;
//!
//! let executor = Executor::new(catalog)?;
//! let query = SelectEntity::new()
//!     .field(col("region"))
//!     .field(count_all().alias("n"))
//!     .from_table("sales")
//!     .group_by(vec![col("region")])
//!     .into_query()
//!     .order_by(vec![OrderItem::desc(col("n"))]);
//!
//! let view = executor.query(&query)?;
//! assert_eq!(view.column_names(), vec!["region", "n"]);
//! assert_eq!(view.to_rows()[0], vec![Value::from("east"), Value::from(2)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## 실행 파이프라인
//!
//! ```text
//! Statement → bind functions → WITH → FROM/JOIN → WHERE → GROUP BY → HAVING
//!           → analytic → SELECT → DISTINCT → set op → ORDER BY → OFFSET/LIMIT → View
//! ```
//!
//! 레코드 단위 평가(WHERE, SELECT, 정렬 키, 조인 조건, 분석 함수 인자)는
//! 공유 rayon 풀에서 연속 청크로 병렬 수행되며 결과 순서는 순차 실행과 같습니다.
//!
//! ## 모듈 구조
//!
//! - [`value`] - 스칼라 값, 변환, 삼치 논리
//! - [`view`] - Header / Record / View 와 변환 연산
//! - [`sql`] - 구문 트리, 평가기, 함수, 실행기
//! - [`catalog`] - 등록된 원본 테이블
//! - [`engine`] - 병렬 실행 엔진
//! - [`config`] - 실행 설정

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod sql;
pub mod value;
pub mod view;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::ExecutionConfig;
pub use error::{QueryError, QueryResult};
pub use sql::executor::{Executor, StatementResult};
pub use value::{Ternary, Value};
pub use view::{FieldNameMatch, Header, HeaderField, Record, View};
