//! # Stock Repository
//!
//! Per-warehouse stock levels, the append-only movement log, transfers and
//! received lots.
//!
//! ## Delta Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply_delta(product, warehouse, delta)               │
//! │                                                                         │
//! │  delta >= 0                                                            │
//! │    INSERT ... ON CONFLICT(product_id, warehouse_id)                     │
//! │      DO UPDATE SET qty = qty + excluded.qty                             │
//! │    (level row created lazily on first credit)                           │
//! │                                                                         │
//! │  delta < 0                                                             │
//! │    UPDATE stock_levels SET qty = qty + delta                            │
//! │      WHERE ... AND qty + delta >= 0                                     │
//! │    no row updated ──► Rejected { available }   (nothing written)       │
//! │                                                                         │
//! │  then resync products.stock = Σ levels         (same transaction)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional UPDATE is the authoritative gate: whatever a caller read
//! earlier, two transactions draining the same level serialize here and the
//! loser sees `Rejected`. The `CHECK (qty >= 0)` constraint backs it up.

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::product::ProductRepository;
use folio_core::{StockBatch, StockLevel, StockMovement, StockMovementType, StockTransferItem, StockTransferRecord};

/// Result of a delta attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Level updated; `product_stock` is the resynced aggregate.
    Applied { level: i64, product_stock: i64 },
    /// The level would have gone negative; nothing was written.
    Rejected { available: i64 },
}

/// Repository for the stock ledger tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockRepository;

impl StockRepository {
    // =========================================================================
    // Levels
    // =========================================================================

    /// Quantity on hand; 0 when no level row exists yet.
    pub async fn level(&self, conn: &mut SqliteConnection, product_id: i64, warehouse_id: i64) -> DbResult<i64> {
        let qty: Option<i64> = sqlx::query_scalar(
            "SELECT qty FROM stock_levels WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(qty.unwrap_or(0))
    }

    /// All level rows of a product.
    pub async fn levels(&self, conn: &mut SqliteConnection, product_id: i64) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_id, warehouse_id, qty
            FROM stock_levels
            WHERE product_id = ?1
            ORDER BY warehouse_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(levels)
    }

    /// Σ levels for a product, straight from the ledger.
    pub async fn total(&self, conn: &mut SqliteConnection, product_id: i64) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(qty), 0) FROM stock_levels WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    /// Applies a signed delta to one level and resyncs the product aggregate.
    pub async fn apply_delta(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        warehouse_id: i64,
        delta: i64,
    ) -> DbResult<DeltaOutcome> {
        debug!(product_id, warehouse_id, delta, "Applying stock delta");

        let level: Option<i64> = if delta >= 0 {
            sqlx::query_scalar(
                r#"
                INSERT INTO stock_levels (product_id, warehouse_id, qty)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(product_id, warehouse_id) DO UPDATE SET qty = qty + excluded.qty
                RETURNING qty
                "#,
            )
            .bind(product_id)
            .bind(warehouse_id)
            .bind(delta)
            .fetch_optional(&mut *conn)
            .await?
        } else {
            sqlx::query_scalar(
                r#"
                UPDATE stock_levels
                SET qty = qty + ?3
                WHERE product_id = ?1 AND warehouse_id = ?2 AND qty + ?3 >= 0
                RETURNING qty
                "#,
            )
            .bind(product_id)
            .bind(warehouse_id)
            .bind(delta)
            .fetch_optional(&mut *conn)
            .await?
        };

        let Some(level) = level else {
            let available = self.level(&mut *conn, product_id, warehouse_id).await?;
            debug!(product_id, warehouse_id, delta, available, "Stock delta rejected");
            return Ok(DeltaOutcome::Rejected { available });
        };

        let product_stock = ProductRepository.resync_stock(&mut *conn, product_id).await?;

        Ok(DeltaOutcome::Applied { level, product_stock })
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Appends a movement. `qty` is positive for IN/OUT and signed for ADJ.
    pub async fn record_movement(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        warehouse_id: i64,
        kind: StockMovementType,
        qty: i64,
        reference: &str,
    ) -> DbResult<StockMovement> {
        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements (product_id, warehouse_id, kind, qty, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, product_id, warehouse_id, kind, qty, reference, created_at
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .bind(kind)
        .bind(qty)
        .bind(reference)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        debug!(movement_id = movement.id, kind = %kind, qty, reference = %reference, "Recorded stock movement");
        Ok(movement)
    }

    /// Movements of a product, newest first.
    pub async fn movements(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, warehouse_id, kind, qty, reference, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    /// Movements carrying an exact reference, oldest first.
    pub async fn movements_by_reference(
        &self,
        conn: &mut SqliteConnection,
        reference: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, warehouse_id, kind, qty, reference, created_at
            FROM stock_movements
            WHERE reference = ?1
            ORDER BY id
            "#,
        )
        .bind(reference)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    pub async fn count_movements(&self, conn: &mut SqliteConnection) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    pub async fn insert_transfer(
        &self,
        conn: &mut SqliteConnection,
        from_warehouse_id: i64,
        to_warehouse_id: i64,
        created_by: i64,
    ) -> DbResult<StockTransferRecord> {
        let transfer = sqlx::query_as::<_, StockTransferRecord>(
            r#"
            INSERT INTO stock_transfers (from_warehouse_id, to_warehouse_id, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, from_warehouse_id, to_warehouse_id, created_by, created_at
            "#,
        )
        .bind(from_warehouse_id)
        .bind(to_warehouse_id)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(transfer)
    }

    pub async fn get_transfer(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<StockTransferRecord>> {
        let transfer = sqlx::query_as::<_, StockTransferRecord>(
            "SELECT id, from_warehouse_id, to_warehouse_id, created_by, created_at FROM stock_transfers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(transfer)
    }

    pub async fn insert_transfer_item(
        &self,
        conn: &mut SqliteConnection,
        transfer_id: i64,
        product_id: i64,
        qty: i64,
    ) -> DbResult<StockTransferItem> {
        let item = sqlx::query_as::<_, StockTransferItem>(
            r#"
            INSERT INTO stock_transfer_items (transfer_id, product_id, qty)
            VALUES (?1, ?2, ?3)
            RETURNING id, transfer_id, product_id, qty
            "#,
        )
        .bind(transfer_id)
        .bind(product_id)
        .bind(qty)
        .fetch_one(&mut *conn)
        .await?;

        debug!(transfer_id, product_id, qty, "Transfer item inserted");
        Ok(item)
    }

    pub async fn transfer_items(&self, conn: &mut SqliteConnection, transfer_id: i64) -> DbResult<Vec<StockTransferItem>> {
        let items = sqlx::query_as::<_, StockTransferItem>(
            "SELECT id, transfer_id, product_id, qty FROM stock_transfer_items WHERE transfer_id = ?1 ORDER BY id",
        )
        .bind(transfer_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_batch(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        warehouse_id: i64,
        lot: &str,
        expiry_date: Option<NaiveDate>,
        qty: i64,
        created_by: i64,
    ) -> DbResult<StockBatch> {
        let batch = sqlx::query_as::<_, StockBatch>(
            r#"
            INSERT INTO stock_batches (
                product_id, warehouse_id, lot, expiry_date, qty, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, product_id, warehouse_id, lot, expiry_date, qty, created_by, created_at
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .bind(lot)
        .bind(expiry_date)
        .bind(qty)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        debug!(batch_id = batch.id, product_id, warehouse_id, lot, qty, "Stock batch inserted");
        Ok(batch)
    }

    /// Lots of a product, soonest expiry first; undated lots last.
    pub async fn batches(&self, conn: &mut SqliteConnection, product_id: i64) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT id, product_id, warehouse_id, lot, expiry_date, qty, created_by, created_at
            FROM stock_batches
            WHERE product_id = ?1
            ORDER BY expiry_date IS NULL, expiry_date, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(batches)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
