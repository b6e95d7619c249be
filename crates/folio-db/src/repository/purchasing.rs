//! # Purchasing Repository
//!
//! Suppliers, purchase orders and realized purchases.
//!
//! ## Receiving Against an Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  purchase_order_items                                                   │
//! │    qty = 10, received_qty = 7                                           │
//! │         │                                                               │
//! │         │ add_received(item, 3)                                         │
//! │         │   UPDATE ... WHERE received_qty + 3 <= qty                    │
//! │         ▼                                                               │
//! │    qty = 10, received_qty = 10                                          │
//! │         │                                                               │
//! │         │ close_if_fully_received(order)                                │
//! │         │   UPDATE ... WHERE NOT EXISTS (line with received < qty)      │
//! │         ▼                                                               │
//! │  purchase_orders.status = CLOSED                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::{Money, Purchase, PurchaseItem, PurchaseOrder, PurchaseOrderItem, Supplier};

/// Repository for suppliers, purchase orders and purchases.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurchasingRepository;

impl PurchasingRepository {
    // =========================================================================
    // Suppliers
    // =========================================================================

    pub async fn insert_supplier(&self, conn: &mut SqliteConnection, name: &str) -> DbResult<Supplier> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "INSERT INTO suppliers (name, created_at) VALUES (?1, ?2) RETURNING id, name, created_at",
        )
        .bind(name.trim())
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(supplier)
    }

    pub async fn get_supplier(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT id, name, created_at FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(supplier)
    }

    // =========================================================================
    // Purchase Orders
    // =========================================================================

    pub async fn insert_order(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
        total: Money,
    ) -> DbResult<PurchaseOrder> {
        debug!(supplier_id, total = %total, "Inserting purchase order");

        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (supplier_id, status, total, created_at, closed_at)
            VALUES (?1, 'OPEN', ?2, ?3, NULL)
            RETURNING id, supplier_id, status, total, created_at, closed_at
            "#,
        )
        .bind(supplier_id)
        .bind(total)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(order)
    }

    pub async fn insert_order_item(
        &self,
        conn: &mut SqliteConnection,
        order_id: i64,
        product_id: i64,
        qty: i64,
        unit_cost: Money,
    ) -> DbResult<PurchaseOrderItem> {
        let item = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            INSERT INTO purchase_order_items (order_id, product_id, qty, received_qty, unit_cost)
            VALUES (?1, ?2, ?3, 0, ?4)
            RETURNING id, order_id, product_id, qty, received_qty, unit_cost
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(qty)
        .bind(unit_cost)
        .fetch_one(&mut *conn)
        .await?;

        Ok(item)
    }

    pub async fn get_order(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT id, supplier_id, status, total, created_at, closed_at FROM purchase_orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(order)
    }

    /// Lines of an order in insertion order.
    pub async fn order_items(&self, conn: &mut SqliteConnection, order_id: i64) -> DbResult<Vec<PurchaseOrderItem>> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT id, order_id, product_id, qty, received_qty, unit_cost
            FROM purchase_order_items
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Adds to a line's received quantity, never past the ordered quantity.
    ///
    /// Returns `false` when the increment would overshoot.
    pub async fn add_received(&self, conn: &mut SqliteConnection, item_id: i64, qty: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_order_items
            SET received_qty = received_qty + ?2
            WHERE id = ?1 AND received_qty + ?2 <= qty
            "#,
        )
        .bind(item_id)
        .bind(qty)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Flips an OPEN order to CLOSED when every line is fully received.
    pub async fn close_if_fully_received(&self, conn: &mut SqliteConnection, order_id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = 'CLOSED', closed_at = ?2
            WHERE id = ?1
              AND status = 'OPEN'
              AND NOT EXISTS (
                  SELECT 1 FROM purchase_order_items
                  WHERE order_id = ?1 AND received_qty < qty
              )
            "#,
        )
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        let closed = result.rows_affected() == 1;
        if closed {
            debug!(order_id, "Purchase order closed");
        }
        Ok(closed)
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Inserts a purchase header with a zero total.
    pub async fn insert_purchase(
        &self,
        conn: &mut SqliteConnection,
        supplier_id: i64,
        order_id: Option<i64>,
        user_id: i64,
    ) -> DbResult<Purchase> {
        debug!(supplier_id, ?order_id, "Inserting purchase");

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (supplier_id, order_id, user_id, total, created_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            RETURNING id, supplier_id, order_id, user_id, total, created_at
            "#,
        )
        .bind(supplier_id)
        .bind(order_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(purchase)
    }

    pub async fn insert_purchase_item(
        &self,
        conn: &mut SqliteConnection,
        purchase_id: i64,
        product_id: i64,
        qty: i64,
        unit_cost: Money,
    ) -> DbResult<PurchaseItem> {
        let item = sqlx::query_as::<_, PurchaseItem>(
            r#"
            INSERT INTO purchase_items (purchase_id, product_id, qty, unit_cost, line_total)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, purchase_id, product_id, qty, unit_cost, line_total
            "#,
        )
        .bind(purchase_id)
        .bind(product_id)
        .bind(qty)
        .bind(unit_cost)
        .bind(unit_cost.multiply_quantity(qty))
        .fetch_one(&mut *conn)
        .await?;

        Ok(item)
    }

    /// Sets the purchase total to Σ line totals and returns it.
    pub async fn refresh_purchase_total(&self, conn: &mut SqliteConnection, purchase_id: i64) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            r#"
            UPDATE purchases
            SET total = (SELECT COALESCE(SUM(line_total), 0.0) FROM purchase_items WHERE purchase_id = ?1)
            WHERE id = ?1
            RETURNING total
            "#,
        )
        .bind(purchase_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    pub async fn get_purchase(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(
            "SELECT id, supplier_id, order_id, user_id, total, created_at FROM purchases WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(purchase)
    }

    pub async fn purchase_items(&self, conn: &mut SqliteConnection, purchase_id: i64) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT id, purchase_id, product_id, qty, unit_cost, line_total
            FROM purchase_items
            WHERE purchase_id = ?1
            ORDER BY id
            "#,
        )
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    pub async fn count_purchases(&self, conn: &mut SqliteConnection) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
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
    use folio_core::PurchaseOrderStatus;

    #[tokio::test]
    async fn test_received_qty_cannot_overshoot() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();
        let product = testing::product(&db, &mut conn, "P-1", Money::from_major(5)).await;
        let supplier = db.purchasing().insert_supplier(&mut conn, "Acme").await.unwrap();

        let order = db.purchasing().insert_order(&mut conn, supplier.id, Money::from_major(30)).await.unwrap();
        let line = db
            .purchasing()
            .insert_order_item(&mut conn, order.id, product.id, 10, Money::from_major(3))
            .await
            .unwrap();

        assert!(db.purchasing().add_received(&mut conn, line.id, 7).await.unwrap());
        assert!(!db.purchasing().add_received(&mut conn, line.id, 5).await.unwrap());
        assert!(!db.purchasing().close_if_fully_received(&mut conn, order.id).await.unwrap());

        assert!(db.purchasing().add_received(&mut conn, line.id, 3).await.unwrap());
        assert!(db.purchasing().close_if_fully_received(&mut conn, order.id).await.unwrap());

        let order = db.purchasing().get_order(&mut conn, order.id).await.unwrap().unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Closed);
        assert!(order.closed_at.is_some());
    }

    #[tokio::test]
    async fn test_purchase_total_from_lines() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();
        let product = testing::product(&db, &mut conn, "P-1", Money::from_major(5)).await;
        let supplier = db.purchasing().insert_supplier(&mut conn, "Acme").await.unwrap();

        let purchase = db.purchasing().insert_purchase(&mut conn, supplier.id, None, 1).await.unwrap();
        db.purchasing()
            .insert_purchase_item(&mut conn, purchase.id, product.id, 4, Money::from_cents(250))
            .await
            .unwrap();

        let total = db.purchasing().refresh_purchase_total(&mut conn, purchase.id).await.unwrap();
        assert_eq!(total, Money::from_major(10));
        assert_eq!(db.purchasing().purchase_items(&mut conn, purchase.id).await.unwrap().len(), 1);
        assert_eq!(db.purchasing().count_purchases(&mut conn).await.unwrap(), 1);
    }
}
