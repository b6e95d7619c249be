//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Insert and lookup (by id, by SKU)
//! - Low-stock listing
//! - Resync of the cached `stock` aggregate
//!
//! ## Cached Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.stock is NOT authoritative.                                   │
//! │                                                                         │
//! │  stock_levels (per warehouse) ──SUM──► products.stock                  │
//! │                                                                         │
//! │  Only `resync_stock` writes it, and only the stock repository calls    │
//! │  that, right after it changes a level in the same transaction.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use folio_core::{NewProduct, Product};

/// Repository for product database operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductRepository;

impl ProductRepository {
    /// Inserts a product with zero stock.
    ///
    /// Initial stock is credited through the ledger, never written here.
    pub async fn insert(&self, conn: &mut SqliteConnection, product: &NewProduct) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        let now = Utc::now();

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?9)
            RETURNING
                id, sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            "#,
        )
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(&product.category)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.tax_rate)
        .bind(product.tax_included)
        .bind(product.stock_min)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, conn: &mut SqliteConnection, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Lists products by name.
    pub async fn list(&self, conn: &mut SqliteConnection, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            FROM products
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(products)
    }

    /// Products at or below their reorder threshold.
    pub async fn low_stock(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category, price, cost, tax_rate, tax_included,
                stock, stock_min, created_at, updated_at
            FROM products
            WHERE stock <= stock_min
            ORDER BY stock ASC, name
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(products)
    }

    /// Recomputes `products.stock` from the per-warehouse levels.
    ///
    /// Returns the new aggregate.
    pub async fn resync_stock(&self, conn: &mut SqliteConnection, product_id: i64) -> DbResult<i64> {
        let now = Utc::now();

        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                stock = (SELECT COALESCE(SUM(qty), 0) FROM stock_levels WHERE product_id = ?1),
                updated_at = ?2
            WHERE id = ?1
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        let stock = stock.ok_or_else(|| DbError::not_found("Product", product_id))?;
        debug!(product_id, stock, "Resynced product stock");
        Ok(stock)
    }

    /// Counts total products (for diagnostics and seeding).
    pub async fn count(&self, conn: &mut SqliteConnection) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use folio_core::{Money, TaxRate};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let mut new = NewProduct::new("BK-001", "Notebook", Money::from_cents(1250));
        new.tax_rate = TaxRate::from_percent(18);
        new.stock_min = 3;
        let product = db.products().insert(&mut conn, &new).await.unwrap();

        assert_eq!(product.stock, 0);
        assert_eq!(product.price, Money::from_cents(1250));

        let by_id = db.products().get_by_id(&mut conn, product.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "BK-001");
        assert_eq!(by_id.tax_rate, TaxRate::from_percent(18));

        let by_sku = db.products().get_by_sku(&mut conn, "BK-001").await.unwrap();
        assert_eq!(by_sku.map(|p| p.id), Some(product.id));
        assert!(db.products().get_by_id(&mut conn, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let new = NewProduct::new("DUP", "First", Money::from_major(1));
        db.products().insert(&mut conn, &new).await.unwrap();
        let err = db.products().insert(&mut conn, &new).await.unwrap_err();

        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_low_stock_lists_products_at_threshold() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let mut new = NewProduct::new("LOW", "Low", Money::from_major(1));
        new.stock_min = 5;
        db.products().insert(&mut conn, &new).await.unwrap();

        let low = db.products().low_stock(&mut conn).await.unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].is_low_stock());
    }

    #[tokio::test]
    async fn test_resync_unknown_product() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let err = db.products().resync_stock(&mut conn, 404).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
