//! Fixtures shared by the repository tests.

use sqlx::SqliteConnection;

use crate::repository::stock::DeltaOutcome;
use crate::Database;
use folio_core::{Money, NewProduct, Product};

/// Fresh in-memory database with migrations applied.
pub async fn db() -> Database {
    Database::in_memory().await.unwrap()
}

pub async fn warehouse(db: &Database, conn: &mut SqliteConnection, name: &str) -> i64 {
    db.warehouses().insert(conn, name, None).await.unwrap().id
}

pub async fn product(db: &Database, conn: &mut SqliteConnection, sku: &str, price: Money) -> Product {
    db.products()
        .insert(conn, &NewProduct::new(sku, format!("Product {}", sku), price))
        .await
        .unwrap()
}

/// A "Main" warehouse and one product holding `qty` units there.
pub async fn product_in_warehouse(db: &Database, conn: &mut SqliteConnection, qty: i64) -> (Product, i64) {
    let wh = warehouse(db, conn, "Main").await;
    let product = product(db, conn, "P-001", Money::from_major(20)).await;

    if qty > 0 {
        let outcome = db.stock().apply_delta(conn, product.id, wh, qty).await.unwrap();
        assert!(matches!(outcome, DeltaOutcome::Applied { .. }));
    }

    (product, wh)
}
