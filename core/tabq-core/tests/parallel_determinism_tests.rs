// Parallel determinism tests
//
// 같은 질의를 단일 스레드와 멀티 스레드로 실행해 결과가 완전히 같은지 검증

use std::sync::Arc;
use tabq_core::sql::ast::*;
use tabq_core::{Catalog, ExecutionConfig, Executor, QueryError, Value};

const ROWS: i64 = 10_000;

fn catalog() -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new());
    let rows = (0..ROWS)
        .map(|i| {
            vec![
                Value::from(i),
                Value::from(i % 37),
                if i % 11 == 0 { Value::Null } else { Value::from((i * 7919) % 1000) },
                Value::from(format!("name-{}", i % 101)),
            ]
        })
        .collect();
    catalog.register("big", &["id", "k", "v", "s"], rows).unwrap();
    let small = (0..37).map(|k| vec![Value::from(k), Value::from(format!("bucket-{k}"))]).collect();
    catalog.register("buckets", &["k", "label"], small).unwrap();
    catalog
}

fn executors() -> (Executor, Executor) {
    let catalog = catalog();
    let serial = Executor::with_config(ExecutionConfig::default().with_cpu(1), Arc::clone(&catalog)).unwrap();
    let parallel = Executor::with_config(
        ExecutionConfig::default().with_cpu(4).with_min_rows_for_parallel(16),
        catalog,
    )
    .unwrap();
    (serial, parallel)
}

fn assert_same(query: &SelectQuery) {
    let (serial, parallel) = executors();
    let expected = serial.query(query).unwrap();
    let actual = parallel.query(query).unwrap();
    assert_eq!(expected.column_names(), actual.column_names());
    assert_eq!(expected.to_rows(), actual.to_rows());
}

#[test]
fn test_where_is_deterministic() {
    let query = SelectEntity::new()
        .field(col("id"))
        .field(col("v"))
        .from_table("big")
        .filter(col("v").gt(lit(500)).or(col("s").like(lit("name-1%"))))
        .into_query();
    assert_same(&query);
}

#[test]
fn test_group_by_is_deterministic() {
    let query = SelectEntity::new()
        .field(col("k"))
        .field(count_all().alias("n"))
        .field(func("sum", vec![col("v")]).alias("total"))
        .field(func("avg", vec![col("v")]).alias("mean"))
        .field(func("median", vec![col("v")]).alias("mid"))
        .from_table("big")
        .group_by(vec![col("k")])
        .into_query();
    assert_same(&query);
}

#[test]
fn test_order_by_is_stable_across_threads() {
    let query = SelectEntity::new()
        .field(col("id"))
        .field(col("s"))
        .from_table("big")
        .into_query()
        .order_by(vec![OrderItem::desc(col("v")), OrderItem::asc(col("s"))])
        .limit(500);
    assert_same(&query);
}

#[test]
fn test_analytic_is_deterministic() {
    let query = SelectEntity::new()
        .field(col("id"))
        .field(analytic("row_number", vec![], vec![col("k")], vec![OrderItem::asc(col("v"))]).alias("rn"))
        .field(analytic("sum", vec![col("v")], vec![col("k")], vec![OrderItem::asc(col("id"))]).alias("running"))
        .field(analytic("lead", vec![col("id")], vec![col("k")], vec![OrderItem::asc(col("id"))]).alias("next"))
        .from_table("big")
        .into_query();
    assert_same(&query);
}

#[test]
fn test_join_is_deterministic() {
    let query = SelectEntity::new()
        .field(col("id"))
        .field(col("label"))
        .from(TableExpr::table("big").join(
            JoinKind::Inner,
            TableExpr::table("buckets"),
            JoinConstraint::Using(vec!["k".to_string()]),
        ))
        .filter(col("id").lt(lit(2_000)))
        .into_query();
    assert_same(&query);
}

/// The first error in record order wins regardless of the thread count.
#[test]
fn test_error_is_deterministic() {
    let (serial, parallel) = executors();
    let query = SelectEntity::new()
        .field(col("id") + lit(true))
        .from_table("big")
        .into_query();
    let expected = serial.query(&query).unwrap_err();
    let actual = parallel.query(&query).unwrap_err();
    assert!(matches!(expected, QueryError::TypeMismatch { .. }));
    assert_eq!(expected, actual);
}
