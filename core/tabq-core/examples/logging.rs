//! 로깅 시스템 사용 예제
//!
//! 실행: RUST_LOG=tabq=debug cargo run --example logging --features logging

use std::sync::Arc;
use tabq_core::sql::ast::*;
use tabq_core::{Catalog, ExecutionConfig, Executor, QueryResult, Value};

fn main() -> QueryResult<()> {
    // 로깅 초기화
    tabq_core::logging::init()?;

    println!("=== tabq 로깅 예제 ===\n");
    println!("로그 대상(target):");
    println!("  tabq::select   - 파이프라인 단계 (debug)");
    println!("  tabq::parallel - 병렬 분할 (debug)");
    println!("  tabq::dml      - INSERT / UPDATE / DELETE / ALTER 결과 (info)\n");

    let catalog = Arc::new(Catalog::new());
    let rows = (0..5_000i64).map(|i| vec![Value::from(i), Value::from(i % 10)]).collect();
    catalog.register("numbers", &["n", "bucket"], rows)?;

    let config = ExecutionConfig::default().with_cpu(4).with_min_rows_for_parallel(500);
    let mut executor = Executor::with_config(config, catalog)?;

    println!("GROUP BY 실행 중...");
    let query = SelectEntity::new()
        .field(col("bucket"))
        .field(func("sum", vec![col("n")]))
        .from_table("numbers")
        .group_by(vec![col("bucket")])
        .into_query();
    executor.execute(&Statement::Select(query))?;

    println!("DELETE 실행 중...");
    executor.execute(&Statement::Delete(DeleteStatement {
        table: "numbers".to_string(),
        alias: None,
        where_clause: Some(col("bucket").equal(lit(0))),
    }))?;

    println!("\n=== 예제 완료 ===");
    println!("\n주의: logging feature가 활성화되어야 로그가 출력됩니다.");
    Ok(())
}
