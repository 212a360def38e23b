//! Query Builder API 사용 예제
//!
//! 실행: cargo run --example query_builder

use std::sync::Arc;
use tabq_core::sql::ast::*;
use tabq_core::{Catalog, Executor, QueryResult, Value, View};

fn print_view(view: &View) {
    println!("   {}", view.column_names().join(" | "));
    for row in view.to_rows() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("   {}", cells.join(" | "));
    }
    println!();
}

fn main() -> QueryResult<()> {
    println!("=== tabq Query Builder 예제 ===\n");

    let catalog = Arc::new(Catalog::new());
    catalog.register(
        "products",
        &["id", "name", "category", "price"],
        vec![
            vec![Value::from(1), Value::from("Laptop"), Value::from("pc"), Value::from(1200)],
            vec![Value::from(2), Value::from("Mouse"), Value::from("accessory"), Value::from(25)],
            vec![Value::from(3), Value::from("Keyboard"), Value::from("accessory"), Value::from(70)],
            vec![Value::from(4), Value::from("Desktop"), Value::from("pc"), Value::from(900)],
        ],
    )?;
    let mut executor = Executor::new(Arc::clone(&catalog))?;

    // 1. WHERE + ORDER BY
    println!("1. price > 50 ORDER BY price DESC");
    let query = SelectEntity::new()
        .field(col("name"))
        .field(col("price"))
        .from_table("products")
        .filter(col("price").gt(lit(50)))
        .into_query()
        .order_by(vec![OrderItem::desc(col("price"))]);
    print_view(&executor.query(&query)?);

    // 2. GROUP BY + 집계
    println!("2. GROUP BY category");
    let query = SelectEntity::new()
        .field(col("category"))
        .field(count_all().alias("n"))
        .field(func("avg", vec![col("price")]).alias("avg_price"))
        .from_table("products")
        .group_by(vec![col("category")])
        .into_query();
    print_view(&executor.query(&query)?);

    // 3. 분석 함수
    println!("3. RANK() OVER (PARTITION BY category ORDER BY price DESC)");
    let query = SelectEntity::new()
        .field(col("name"))
        .field(analytic("rank", vec![], vec![col("category")], vec![OrderItem::desc(col("price"))]).alias("rank"))
        .from_table("products")
        .into_query();
    print_view(&executor.query(&query)?);

    // 4. UPDATE 후 재조회
    println!("4. UPDATE products SET price = price * 2 WHERE category = 'accessory'");
    let result = executor.execute(&Statement::Update(UpdateStatement {
        table: "products".to_string(),
        alias: None,
        assignments: vec![("price".to_string(), col("price") * lit(2))],
        where_clause: Some(col("category").equal(lit("accessory"))),
    }))?;
    println!("   ✓ {} rows updated", result.affected().unwrap_or_default());
    if let Some(view) = result.view() {
        print_view(view);
    }

    println!("=== 예제 완료 ===");
    Ok(())
}
