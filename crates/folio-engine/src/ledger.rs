//! # Stock Ledger
//!
//! The only path by which stock changes.
//!
//! ## Delta Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         apply_delta(p, w, Δ)                            │
//! │                                                                         │
//! │   Δ >= 0 ──► upsert stock_levels(p, w) qty += Δ                        │
//! │   Δ <  0 ──► UPDATE ... WHERE qty + Δ >= 0                             │
//! │                  │                                                      │
//! │                  ├── no row ──► InsufficientStock (nothing written)    │
//! │                  ▼                                                      │
//! │   products.stock = Σ stock_levels.qty for p   (same transaction)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales, returns, receiving, lot receipts, transfers, counts and manual
//! adjustments all go through [`StockLedger::apply_delta`]. `Product.stock` is a cache and
//! is never written anywhere else.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use folio_core::validation::{validate_name, validate_not_empty, validate_quantity, validate_stock_movement};
use folio_core::{
    movement_ref, Actor, CoreError, Product, StockBatch, StockLevel, StockMovement, StockMovementType,
    StockTransferItem, StockTransferRecord, ValidationError, BATCH_REFERENCE, COUNT_REFERENCE, MANUAL_REFERENCE,
    TRANSFER_REFERENCE,
};
use folio_db::{Database, DeltaOutcome, SqliteConnection};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{fail, EngineResult};

// =============================================================================
// Requests
// =============================================================================

/// Manual stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: i64,
    /// Defaults to the store's default warehouse.
    pub warehouse_id: Option<i64>,
    pub kind: StockMovementType,
    /// Positive for IN / OUT, signed for ADJ.
    pub quantity: i64,
    /// Defaults to `MANUAL`.
    pub reference: Option<String>,
}

/// Move units of one or more products between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub items: Vec<TransferLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl TransferLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        TransferLine { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransferDetail {
    pub transfer: StockTransferRecord,
    pub items: Vec<StockTransferItem>,
}

/// A lot arriving into a warehouse outside the purchasing flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockBatch {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub lot: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
}

/// Physical count of one product in one warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCount {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub counted_qty: i64,
}

// =============================================================================
// Stock Ledger
// =============================================================================

pub struct StockLedger<'a> {
    db: &'a Database,
    audit: &'a dyn AuditSink,
}

impl<'a> StockLedger<'a> {
    pub fn new(db: &'a Database, audit: &'a dyn AuditSink) -> Self {
        StockLedger { db, audit }
    }

    // =========================================================================
    // Transaction Building Blocks
    // =========================================================================

    /// Applies a signed delta and returns the new level.
    ///
    /// Fails with `InsufficientStock` without writing anything when the
    /// level would go negative. Runs on the caller's connection so the
    /// change commits or rolls back with the rest of the workflow.
    pub async fn apply_delta(
        &self,
        conn: &mut SqliteConnection,
        product_id: i64,
        warehouse_id: i64,
        delta: i64,
    ) -> EngineResult<i64> {
        match self.db.stock().apply_delta(conn, product_id, warehouse_id, delta).await? {
            DeltaOutcome::Applied { level, .. } => Ok(level),
            DeltaOutcome::Rejected { available } => {
                warn!(product_id, warehouse_id, delta, available, "Stock delta rejected");
                fail(CoreError::InsufficientStock {
                    product_id,
                    warehouse_id,
                    available,
                    requested: delta.saturating_neg(),
                })
            }
        }
    }

    /// Level of one product in one warehouse; 0 when never stocked.
    pub async fn level(&self, conn: &mut SqliteConnection, product_id: i64, warehouse_id: i64) -> EngineResult<i64> {
        Ok(self.db.stock().level(conn, product_id, warehouse_id).await?)
    }

    /// The configured default warehouse.
    pub async fn require_default_warehouse(&self, conn: &mut SqliteConnection) -> EngineResult<i64> {
        let settings = self.db.settings().get(conn).await?;
        match settings.default_warehouse_id {
            Some(id) => Ok(id),
            None => fail(CoreError::DefaultWarehouseMissing),
        }
    }

    pub(crate) async fn require_product(&self, conn: &mut SqliteConnection, product_id: i64) -> EngineResult<Product> {
        match self.db.products().get_by_id(conn, product_id).await? {
            Some(product) => Ok(product),
            None => fail(CoreError::ProductNotFound(product_id)),
        }
    }

    pub(crate) async fn require_warehouse(&self, conn: &mut SqliteConnection, warehouse_id: i64) -> EngineResult<()> {
        match self.db.warehouses().get_by_id(conn, warehouse_id).await? {
            Some(_) => Ok(()),
            None => fail(CoreError::WarehouseNotFound(warehouse_id)),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Standalone read of one level.
    pub async fn get_level(&self, product_id: i64, warehouse_id: i64) -> EngineResult<i64> {
        let mut conn = self.db.acquire().await?;
        self.level(&mut conn, product_id, warehouse_id).await
    }

    /// Records a manual IN / OUT / ADJ movement.
    pub async fn adjust(&self, actor: Actor, adjustment: StockAdjustment) -> EngineResult<StockMovement> {
        validate_stock_movement(adjustment.kind, adjustment.quantity).map_err(CoreError::from)?;

        let mut tx = self.db.begin().await?;

        self.require_product(&mut tx, adjustment.product_id).await?;
        let warehouse_id = match adjustment.warehouse_id {
            Some(id) => {
                self.require_warehouse(&mut tx, id).await?;
                id
            }
            None => self.require_default_warehouse(&mut tx).await?,
        };

        let delta = adjustment.kind.delta(adjustment.quantity);
        let level = self.apply_delta(&mut tx, adjustment.product_id, warehouse_id, delta).await?;

        let reference = adjustment
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(MANUAL_REFERENCE);

        let movement = self
            .db
            .stock()
            .record_movement(
                &mut tx,
                adjustment.product_id,
                warehouse_id,
                adjustment.kind,
                adjustment.quantity,
                reference,
            )
            .await?;

        self.db.commit(tx).await?;

        info!(movement_id = movement.id, product_id = adjustment.product_id, warehouse_id, level, "Stock adjusted");
        self.audit.record(AuditEvent::new(
            actor,
            "inventory_movement",
            "product",
            adjustment.product_id,
            json!({
                "warehouse_id": warehouse_id,
                "kind": adjustment.kind,
                "quantity": adjustment.quantity,
                "reference": reference,
            }),
        ));

        Ok(movement)
    }

    /// Moves units from one warehouse to another. Every line applies or
    /// none does.
    pub async fn transfer(&self, actor: Actor, transfer: StockTransfer) -> EngineResult<StockTransferDetail> {
        if transfer.from_warehouse_id == transfer.to_warehouse_id {
            return fail(ValidationError::SameWarehouse.into());
        }
        validate_not_empty("items", &transfer.items).map_err(CoreError::from)?;
        for line in &transfer.items {
            validate_quantity(line.quantity).map_err(CoreError::from)?;
        }

        let mut tx = self.db.begin().await?;

        self.require_warehouse(&mut tx, transfer.from_warehouse_id).await?;
        self.require_warehouse(&mut tx, transfer.to_warehouse_id).await?;

        let record = self
            .db
            .stock()
            .insert_transfer(&mut tx, transfer.from_warehouse_id, transfer.to_warehouse_id, actor.user_id)
            .await?;
        let reference = movement_ref(TRANSFER_REFERENCE, record.id);

        let mut items = Vec::with_capacity(transfer.items.len());
        for line in &transfer.items {
            self.require_product(&mut tx, line.product_id).await?;

            self.apply_delta(&mut tx, line.product_id, transfer.from_warehouse_id, -line.quantity)
                .await?;
            self.apply_delta(&mut tx, line.product_id, transfer.to_warehouse_id, line.quantity)
                .await?;

            items.push(
                self.db
                    .stock()
                    .insert_transfer_item(&mut tx, record.id, line.product_id, line.quantity)
                    .await?,
            );
            self.db
                .stock()
                .record_movement(
                    &mut tx,
                    line.product_id,
                    transfer.from_warehouse_id,
                    StockMovementType::Out,
                    line.quantity,
                    &reference,
                )
                .await?;
            self.db
                .stock()
                .record_movement(
                    &mut tx,
                    line.product_id,
                    transfer.to_warehouse_id,
                    StockMovementType::In,
                    line.quantity,
                    &reference,
                )
                .await?;
            debug!(transfer_id = record.id, product_id = line.product_id, qty = line.quantity, "Transfer line applied");
        }

        self.db.commit(tx).await?;

        info!(transfer_id = record.id, lines = items.len(), "Stock transferred");
        self.audit.record(AuditEvent::new(
            actor,
            "warehouse_transfer",
            "stock_transfer",
            record.id,
            json!({
                "from_warehouse_id": transfer.from_warehouse_id,
                "to_warehouse_id": transfer.to_warehouse_id,
                "lines": items.len(),
                "units": items.iter().map(|i| i.qty).sum::<i64>(),
            }),
        ));

        Ok(StockTransferDetail { transfer: record, items })
    }

    /// Records a received lot and credits its warehouse.
    pub async fn receive_batch(&self, actor: Actor, batch: NewStockBatch) -> EngineResult<StockBatch> {
        validate_name("lot", &batch.lot).map_err(CoreError::from)?;
        validate_quantity(batch.quantity).map_err(CoreError::from)?;

        let mut tx = self.db.begin().await?;

        self.require_product(&mut tx, batch.product_id).await?;
        self.require_warehouse(&mut tx, batch.warehouse_id).await?;

        let record = self
            .db
            .stock()
            .insert_batch(
                &mut tx,
                batch.product_id,
                batch.warehouse_id,
                batch.lot.trim(),
                batch.expiry_date,
                batch.quantity,
                actor.user_id,
            )
            .await?;

        let level = self.apply_delta(&mut tx, batch.product_id, batch.warehouse_id, batch.quantity).await?;
        self.db
            .stock()
            .record_movement(
                &mut tx,
                batch.product_id,
                batch.warehouse_id,
                StockMovementType::In,
                batch.quantity,
                &movement_ref(BATCH_REFERENCE, record.id),
            )
            .await?;

        self.db.commit(tx).await?;

        info!(batch_id = record.id, product_id = record.product_id, lot = %record.lot, level, "Stock batch received");
        self.audit.record(AuditEvent::new(
            actor,
            "warehouse_batch",
            "stock_batch",
            record.id,
            json!({
                "product_id": record.product_id,
                "warehouse_id": record.warehouse_id,
                "lot": record.lot,
                "expiry_date": record.expiry_date,
                "quantity": record.qty,
            }),
        ));

        Ok(record)
    }

    /// Sets a level to a physically counted quantity. Returns the applied
    /// difference (0 when the count matched).
    pub async fn count(&self, actor: Actor, count: InventoryCount) -> EngineResult<i64> {
        if count.counted_qty < 0 {
            return fail(ValidationError::must_not_be_negative("counted_qty").into());
        }

        let mut tx = self.db.begin().await?;

        self.require_product(&mut tx, count.product_id).await?;
        self.require_warehouse(&mut tx, count.warehouse_id).await?;

        let current = self.level(&mut tx, count.product_id, count.warehouse_id).await?;
        let diff = count.counted_qty - current;

        if diff != 0 {
            self.apply_delta(&mut tx, count.product_id, count.warehouse_id, diff).await?;
            self.db
                .stock()
                .record_movement(
                    &mut tx,
                    count.product_id,
                    count.warehouse_id,
                    StockMovementType::Adj,
                    diff,
                    COUNT_REFERENCE,
                )
                .await?;
        }

        self.db.commit(tx).await?;

        info!(product_id = count.product_id, warehouse_id = count.warehouse_id, diff, "Inventory counted");
        self.audit.record(AuditEvent::new(
            actor,
            "inventory_count",
            "product",
            count.product_id,
            json!({
                "warehouse_id": count.warehouse_id,
                "previous_qty": current,
                "counted_qty": count.counted_qty,
                "diff": diff,
            }),
        ));

        Ok(diff)
    }

    /// Per-warehouse levels of a product.
    pub async fn levels(&self, product_id: i64) -> EngineResult<Vec<StockLevel>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.stock().levels(&mut conn, product_id).await?)
    }

    /// Movement history of a product, newest first.
    pub async fn movements(&self, product_id: i64, limit: u32) -> EngineResult<Vec<StockMovement>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.stock().movements(&mut conn, product_id, limit).await?)
    }

    /// Received lots of a product, soonest expiry first.
    pub async fn batches(&self, product_id: i64) -> EngineResult<Vec<StockBatch>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.stock().batches(&mut conn, product_id).await?)
    }

    /// A transfer with its lines.
    pub async fn get_transfer(&self, transfer_id: i64) -> EngineResult<StockTransferDetail> {
        let mut conn = self.db.acquire().await?;
        let Some(transfer) = self.db.stock().get_transfer(&mut conn, transfer_id).await? else {
            return fail(CoreError::TransferNotFound(transfer_id));
        };
        let items = self.db.stock().transfer_items(&mut conn, transfer_id).await?;
        Ok(StockTransferDetail { transfer, items })
    }

    /// Products at or below their minimum stock.
    pub async fn low_stock(&self) -> EngineResult<Vec<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.products().low_stock(&mut conn).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Fixture};
    use crate::EngineError;

    fn adjustment(product_id: i64, kind: StockMovementType, quantity: i64) -> StockAdjustment {
        StockAdjustment {
            product_id,
            warehouse_id: None,
            kind,
            quantity,
            reference: None,
        }
    }

    #[tokio::test]
    async fn test_adjust_in_out_adj() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 0).await;
        let ledger = fx.engine.ledger();

        let m = ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::In, 10)).await.unwrap();
        assert_eq!(m.reference, MANUAL_REFERENCE);
        assert_eq!(m.warehouse_id, fx.warehouse_id);

        ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Out, 4)).await.unwrap();
        ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Adj, -1)).await.unwrap();

        assert_eq!(ledger.get_level(p.id, fx.warehouse_id).await.unwrap(), 5);
        assert_eq!(fx.product_stock(p.id).await, 5);
        assert_eq!(
            fx.audit.actions(),
            vec!["inventory_movement", "inventory_movement", "inventory_movement"]
        );
    }

    #[tokio::test]
    async fn test_adjust_rejects_zero_and_negative_out() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 3).await;
        let ledger = fx.engine.ledger();

        let err = ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Adj, 0)).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Out, -2)).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_out_below_zero_writes_nothing() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 3).await;
        let movements_before = fx.movement_count().await;

        let err = fx
            .engine
            .ledger()
            .adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Out, 5))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));
        assert_eq!(fx.engine.ledger().get_level(p.id, fx.warehouse_id).await.unwrap(), 3);
        assert_eq!(fx.movement_count().await, movements_before);
    }

    #[tokio::test]
    async fn test_adjust_requires_default_warehouse() {
        let fx = Fixture::without_default_warehouse().await;
        let p = fx.product_unstocked("P-1", 20).await;

        let err = fx
            .engine
            .ledger()
            .adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::In, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::DefaultWarehouseMissing)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_adjust_unknown_product() {
        let fx = Fixture::new().await;
        let err = fx
            .engine
            .ledger()
            .adjust(fx.stock_clerk(), adjustment(999, StockMovementType::In, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::ProductNotFound(999))));
    }

    #[tokio::test]
    async fn test_adjust_rejects_out_of_range_quantity() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 3).await;
        let ledger = fx.engine.ledger();

        let err = ledger
            .adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Adj, i64::MIN))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(fx.product_stock(p.id).await, 3);
    }

    #[tokio::test]
    async fn test_transfer_moves_all_lines() {
        let fx = Fixture::new().await;
        let a = fx.product("P-1", 20, 10).await;
        let b = fx.product("P-2", 15, 6).await;
        let back = fx.warehouse("Back").await;
        let ledger = fx.engine.ledger();

        let detail = ledger
            .transfer(
                fx.stock_clerk(),
                StockTransfer {
                    from_warehouse_id: fx.warehouse_id,
                    to_warehouse_id: back,
                    items: vec![TransferLine::new(a.id, 4), TransferLine::new(b.id, 6)],
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.items.len(), 2);
        assert!(detail.items.iter().all(|i| i.transfer_id == detail.transfer.id));
        assert_eq!(ledger.get_level(a.id, fx.warehouse_id).await.unwrap(), 6);
        assert_eq!(ledger.get_level(a.id, back).await.unwrap(), 4);
        assert_eq!(ledger.get_level(b.id, fx.warehouse_id).await.unwrap(), 0);
        assert_eq!(ledger.get_level(b.id, back).await.unwrap(), 6);
        assert_eq!(fx.product_stock(a.id).await, 10);
        assert_eq!(fx.product_stock(b.id).await, 6);

        let reference = movement_ref(TRANSFER_REFERENCE, detail.transfer.id);
        let movements = fx.movements_by_reference(&reference).await;
        assert_eq!(movements.len(), 4);
        assert_eq!(movements[0].kind, StockMovementType::Out);
        assert_eq!(movements[1].kind, StockMovementType::In);

        let fetched = ledger.get_transfer(detail.transfer.id).await.unwrap();
        assert_eq!(fetched, detail);
        assert_eq!(fx.audit.actions(), vec!["warehouse_transfer"]);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_transfer_short_line_rolls_back_every_line() {
        let fx = Fixture::new().await;
        let a = fx.product("P-1", 20, 10).await;
        let b = fx.product("P-2", 15, 1).await;
        let back = fx.warehouse("Back").await;
        let ledger = fx.engine.ledger();
        let movements_before = fx.movement_count().await;

        let err = ledger
            .transfer(
                fx.stock_clerk(),
                StockTransfer {
                    from_warehouse_id: fx.warehouse_id,
                    to_warehouse_id: back,
                    items: vec![TransferLine::new(a.id, 4), TransferLine::new(b.id, 2)],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Core(CoreError::InsufficientStock { available: 1, requested: 2, .. })));
        assert_eq!(ledger.get_level(a.id, fx.warehouse_id).await.unwrap(), 10);
        assert_eq!(ledger.get_level(a.id, back).await.unwrap(), 0);
        assert_eq!(fx.movement_count().await, movements_before);
        assert!(fx.audit.actions().is_empty());
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_transfer_validation() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 2).await;
        let back = fx.warehouse("Back").await;
        let ledger = fx.engine.ledger();

        let same = StockTransfer {
            from_warehouse_id: fx.warehouse_id,
            to_warehouse_id: fx.warehouse_id,
            items: vec![TransferLine::new(p.id, 1)],
        };
        let err = ledger.transfer(fx.stock_clerk(), same.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(ValidationError::SameWarehouse))));

        let missing = StockTransfer {
            to_warehouse_id: 404,
            ..same.clone()
        };
        let err = ledger.transfer(fx.stock_clerk(), missing).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::WarehouseNotFound(404))));

        let empty = StockTransfer {
            to_warehouse_id: back,
            items: vec![],
            ..same.clone()
        };
        assert_eq!(ledger.transfer(fx.stock_clerk(), empty).await.unwrap_err().status_code(), 400);

        let zero = StockTransfer {
            to_warehouse_id: back,
            items: vec![TransferLine::new(p.id, 0)],
            ..same
        };
        assert_eq!(ledger.transfer(fx.stock_clerk(), zero).await.unwrap_err().status_code(), 400);

        let err = ledger.get_transfer(77).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::TransferNotFound(77))));
        assert_eq!(fx.product_stock(p.id).await, 2);
    }

    #[tokio::test]
    async fn test_receive_batch_credits_warehouse() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 2).await;
        let back = fx.warehouse("Back").await;
        let ledger = fx.engine.ledger();

        let batch = ledger
            .receive_batch(
                fx.stock_clerk(),
                NewStockBatch {
                    product_id: p.id,
                    warehouse_id: back,
                    lot: " L-2027-01 ".to_string(),
                    expiry_date: NaiveDate::from_ymd_opt(2027, 1, 31),
                    quantity: 12,
                },
            )
            .await
            .unwrap();

        assert_eq!(batch.lot, "L-2027-01");
        assert_eq!(batch.qty, 12);
        assert_eq!(ledger.get_level(p.id, back).await.unwrap(), 12);
        assert_eq!(fx.product_stock(p.id).await, 14);

        let movements = fx.movements_by_reference(&movement_ref(BATCH_REFERENCE, batch.id)).await;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, StockMovementType::In);
        assert_eq!(movements[0].warehouse_id, back);

        assert_eq!(ledger.batches(p.id).await.unwrap(), vec![batch]);
        assert_eq!(fx.audit.actions(), vec!["warehouse_batch"]);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_receive_batch_validation() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 0).await;
        let ledger = fx.engine.ledger();
        let batch = |lot: &str, quantity: i64| NewStockBatch {
            product_id: p.id,
            warehouse_id: fx.warehouse_id,
            lot: lot.to_string(),
            expiry_date: None,
            quantity,
        };

        assert_eq!(ledger.receive_batch(fx.stock_clerk(), batch("  ", 5)).await.unwrap_err().status_code(), 400);
        assert_eq!(ledger.receive_batch(fx.stock_clerk(), batch("L-1", 0)).await.unwrap_err().status_code(), 400);

        let unknown = NewStockBatch {
            warehouse_id: 404,
            ..batch("L-1", 5)
        };
        let err = ledger.receive_batch(fx.stock_clerk(), unknown).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::WarehouseNotFound(404))));

        assert_eq!(fx.product_stock(p.id).await, 0);
        assert!(ledger.batches(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_applies_difference() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        let ledger = fx.engine.ledger();

        let count = InventoryCount {
            product_id: p.id,
            warehouse_id: fx.warehouse_id,
            counted_qty: 7,
        };
        assert_eq!(ledger.count(fx.stock_clerk(), count).await.unwrap(), -3);
        assert_eq!(ledger.get_level(p.id, fx.warehouse_id).await.unwrap(), 7);

        let adj = fx.movements_by_reference(COUNT_REFERENCE).await;
        assert_eq!(adj.len(), 1);
        assert_eq!(adj[0].kind, StockMovementType::Adj);
        assert_eq!(adj[0].qty, -3);

        // Matching count writes no movement.
        assert_eq!(ledger.count(fx.stock_clerk(), count).await.unwrap(), 0);
        assert_eq!(fx.movements_by_reference(COUNT_REFERENCE).await.len(), 1);

        let negative = InventoryCount { counted_qty: -1, ..count };
        assert_eq!(ledger.count(fx.stock_clerk(), negative).await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_levels_movements_low_stock() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 5).await;
        let empty = fx.product_unstocked("P-2", 10).await;
        let ledger = fx.engine.ledger();

        let levels = ledger.levels(p.id).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].qty, 5);

        ledger.adjust(fx.stock_clerk(), adjustment(p.id, StockMovementType::Out, 1)).await.unwrap();
        let history = ledger.movements(p.id, 10).await.unwrap();
        assert_eq!(history[0].kind, StockMovementType::Out);

        let low: Vec<i64> = ledger.low_stock().await.unwrap().into_iter().map(|p| p.id).collect();
        assert!(low.contains(&empty.id));
        assert!(!low.contains(&p.id));
    }
}
