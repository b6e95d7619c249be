//! # Purchase Receiving
//!
//! Purchase orders, goods receipts against them, and direct purchases.
//!
//! ## Receiving Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      receive(order_id, lines)                           │
//! │                                                                         │
//! │  for each requested line:                                               │
//! │      accepted = min(requested, qty − received_qty)                     │
//! │      accepted <= 0 ──► skipped (duplicates and overshoot are no-ops)   │
//! │      accepted  > 0 ──► received_qty += accepted                        │
//! │                        apply_delta(+accepted)                          │
//! │                        movement IN "PURCHASE:{purchase_id}"            │
//! │                        purchase_item (purchase created on first use)   │
//! │                                                                         │
//! │  every line received_qty >= qty ──► order OPEN → CLOSED                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Receiving the same goods twice is safe: the second call finds nothing
//! remaining and changes nothing.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use folio_core::validation::{validate_not_empty, validate_price, validate_quantity};
use folio_core::{
    movement_ref, Actor, CoreError, Money, Purchase, PurchaseItem, PurchaseOrder, PurchaseOrderItem, StockMovementType,
    PURCHASE_REFERENCE,
};
use folio_db::{Database, SqliteConnection};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{fail, EngineResult};
use crate::ledger::StockLedger;

// =============================================================================
// Requests & Results
// =============================================================================

/// One ordered or purchased product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: i64,
    pub qty: i64,
    pub unit_cost: Money,
}

impl PurchaseLine {
    pub fn new(product_id: i64, qty: i64, unit_cost: Money) -> Self {
        PurchaseLine {
            product_id,
            qty,
            unit_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: i64,
    pub items: Vec<PurchaseLine>,
}

/// Goods received without an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier_id: i64,
    pub items: Vec<PurchaseLine>,
}

/// Quantity of a product arriving against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl ReceiveLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        ReceiveLine { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

/// Outcome of one receiving call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingResult {
    /// `None` when nothing was accepted.
    pub purchase_id: Option<i64>,
    pub received: Vec<PurchaseItem>,
    /// True when this call moved the order to CLOSED.
    pub order_closed: bool,
}

impl ReceivingResult {
    /// Units accepted across all lines.
    pub fn accepted_units(&self) -> i64 {
        self.received.iter().map(|item| item.qty).sum()
    }
}

// =============================================================================
// Workflow
// =============================================================================

pub struct PurchaseReceivingWorkflow<'a> {
    db: &'a Database,
    audit: &'a dyn AuditSink,
    ledger: StockLedger<'a>,
}

impl<'a> PurchaseReceivingWorkflow<'a> {
    pub fn new(db: &'a Database, audit: &'a dyn AuditSink) -> Self {
        PurchaseReceivingWorkflow {
            db,
            audit,
            ledger: StockLedger::new(db, audit),
        }
    }

    pub async fn create_order(&self, actor: Actor, order: NewPurchaseOrder) -> EngineResult<PurchaseOrderDetail> {
        validate_lines(&order.items)?;

        let mut tx = self.db.begin().await?;
        self.require_supplier(&mut tx, order.supplier_id).await?;
        for line in &order.items {
            self.ledger.require_product(&mut tx, line.product_id).await?;
        }

        let total: Money = order.items.iter().map(|l| l.unit_cost.multiply_quantity(l.qty)).sum();
        let header = self.db.purchasing().insert_order(&mut tx, order.supplier_id, total).await?;

        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            items.push(
                self.db
                    .purchasing()
                    .insert_order_item(&mut tx, header.id, line.product_id, line.qty, line.unit_cost)
                    .await?,
            );
        }

        self.db.commit(tx).await?;

        info!(order_id = header.id, supplier_id = order.supplier_id, total = %total, "Purchase order created");
        self.audit.record(AuditEvent::new(
            actor,
            "purchase_order_create",
            "purchase_order",
            header.id,
            json!({ "supplier_id": order.supplier_id, "lines": items.len(), "total": total.rounded() }),
        ));

        Ok(PurchaseOrderDetail { order: header, items })
    }

    /// Receives goods against an order. See the module docs for clamping.
    pub async fn receive(&self, actor: Actor, order_id: i64, lines: &[ReceiveLine]) -> EngineResult<ReceivingResult> {
        let mut tx = self.db.begin().await?;

        let Some(order) = self.db.purchasing().get_order(&mut tx, order_id).await? else {
            return fail(CoreError::PurchaseOrderNotFound(order_id));
        };
        let warehouse_id = self.ledger.require_default_warehouse(&mut tx).await?;

        let mut order_items = self.db.purchasing().order_items(&mut tx, order_id).await?;
        let mut purchase: Option<Purchase> = None;
        let mut received = Vec::new();

        for line in lines {
            let mut wanted = line.quantity;

            // A product may sit on several order lines; fill them in order.
            for item in order_items.iter_mut().filter(|i| i.product_id == line.product_id) {
                let accepted = self.claim(&mut tx, item, wanted).await?;
                if accepted == 0 {
                    continue;
                }
                wanted -= accepted;

                let purchase_id = match &purchase {
                    Some(p) => p.id,
                    None => {
                        let created = self
                            .db
                            .purchasing()
                            .insert_purchase(&mut tx, order.supplier_id, Some(order_id), actor.user_id)
                            .await?;
                        let id = created.id;
                        purchase = Some(created);
                        id
                    }
                };

                self.ledger.apply_delta(&mut tx, item.product_id, warehouse_id, accepted).await?;
                self.db
                    .stock()
                    .record_movement(
                        &mut tx,
                        item.product_id,
                        warehouse_id,
                        StockMovementType::In,
                        accepted,
                        &movement_ref(PURCHASE_REFERENCE, purchase_id),
                    )
                    .await?;
                received.push(
                    self.db
                        .purchasing()
                        .insert_purchase_item(&mut tx, purchase_id, item.product_id, accepted, item.unit_cost)
                        .await?,
                );
            }

            if wanted == line.quantity {
                debug!(order_id, product_id = line.product_id, requested = line.quantity, "Nothing receivable");
            }
        }

        let purchase_id = purchase.as_ref().map(|p| p.id);
        if let Some(id) = purchase_id {
            self.db.purchasing().refresh_purchase_total(&mut tx, id).await?;
        }
        let order_closed = self.db.purchasing().close_if_fully_received(&mut tx, order_id).await?;

        self.db.commit(tx).await?;

        let result = ReceivingResult {
            purchase_id,
            received,
            order_closed,
        };

        info!(order_id, ?purchase_id, units = result.accepted_units(), order_closed, "Goods received");
        self.audit.record(AuditEvent::new(
            actor,
            "purchase_receive",
            "purchase_order",
            order_id,
            json!({
                "purchase_id": purchase_id,
                "units": result.accepted_units(),
                "order_closed": order_closed,
            }),
        ));

        Ok(result)
    }

    /// Books up to `wanted` units against an order line and returns how many
    /// were taken. The guarded update re-checks the remaining quantity in the
    /// database, so a stale `item` credits nothing.
    async fn claim(&self, conn: &mut SqliteConnection, item: &mut PurchaseOrderItem, wanted: i64) -> EngineResult<i64> {
        let accepted = item.receivable(wanted);
        if accepted <= 0 {
            return Ok(0);
        }

        if !self.db.purchasing().add_received(conn, item.id, accepted).await? {
            warn!(item_id = item.id, accepted, "Order line already received; skipped");
            return Ok(0);
        }

        item.received_qty += accepted;
        Ok(accepted)
    }

    /// Records goods received without an order.
    pub async fn record_purchase(&self, actor: Actor, purchase: NewPurchase) -> EngineResult<PurchaseDetail> {
        validate_lines(&purchase.items)?;

        let mut tx = self.db.begin().await?;
        self.require_supplier(&mut tx, purchase.supplier_id).await?;
        let warehouse_id = self.ledger.require_default_warehouse(&mut tx).await?;

        let header = self
            .db
            .purchasing()
            .insert_purchase(&mut tx, purchase.supplier_id, None, actor.user_id)
            .await?;
        let reference = movement_ref(PURCHASE_REFERENCE, header.id);

        let mut items = Vec::with_capacity(purchase.items.len());
        for line in &purchase.items {
            self.ledger.require_product(&mut tx, line.product_id).await?;
            self.ledger.apply_delta(&mut tx, line.product_id, warehouse_id, line.qty).await?;
            self.db
                .stock()
                .record_movement(&mut tx, line.product_id, warehouse_id, StockMovementType::In, line.qty, &reference)
                .await?;
            items.push(
                self.db
                    .purchasing()
                    .insert_purchase_item(&mut tx, header.id, line.product_id, line.qty, line.unit_cost)
                    .await?,
            );
        }

        let total = self.db.purchasing().refresh_purchase_total(&mut tx, header.id).await?;
        self.db.commit(tx).await?;

        info!(purchase_id = header.id, supplier_id = purchase.supplier_id, total = %total, "Purchase recorded");
        self.audit.record(AuditEvent::new(
            actor,
            "purchase",
            "purchase",
            header.id,
            json!({ "supplier_id": purchase.supplier_id, "lines": items.len(), "total": total.rounded() }),
        ));

        Ok(PurchaseDetail {
            purchase: Purchase { total, ..header },
            items,
        })
    }

    pub async fn get_order(&self, order_id: i64) -> EngineResult<PurchaseOrderDetail> {
        let mut conn = self.db.acquire().await?;

        let Some(order) = self.db.purchasing().get_order(&mut conn, order_id).await? else {
            return fail(CoreError::PurchaseOrderNotFound(order_id));
        };
        let items = self.db.purchasing().order_items(&mut conn, order_id).await?;

        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn get_purchase(&self, purchase_id: i64) -> EngineResult<Option<PurchaseDetail>> {
        let mut conn = self.db.acquire().await?;

        let Some(purchase) = self.db.purchasing().get_purchase(&mut conn, purchase_id).await? else {
            return Ok(None);
        };
        let items = self.db.purchasing().purchase_items(&mut conn, purchase_id).await?;

        Ok(Some(PurchaseDetail { purchase, items }))
    }

    async fn require_supplier(&self, conn: &mut SqliteConnection, supplier_id: i64) -> EngineResult<()> {
        match self.db.purchasing().get_supplier(conn, supplier_id).await? {
            Some(_) => Ok(()),
            None => fail(CoreError::SupplierNotFound(supplier_id)),
        }
    }
}

fn validate_lines(lines: &[PurchaseLine]) -> EngineResult<()> {
    validate_not_empty("items", lines).map_err(CoreError::from)?;
    for line in lines {
        validate_quantity(line.qty).map_err(CoreError::from)?;
        validate_price("unit_cost", line.unit_cost).map_err(CoreError::from)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Fixture};
    use crate::EngineError;
    use folio_core::PurchaseOrderStatus;

    async fn order(fx: &Fixture, product_id: i64, qty: i64) -> PurchaseOrderDetail {
        let supplier = fx.engine.catalog().create_supplier("Acme Wholesale").await.unwrap();
        fx.engine
            .receiving()
            .create_order(
                fx.stock_clerk(),
                NewPurchaseOrder {
                    supplier_id: supplier.id,
                    items: vec![PurchaseLine::new(product_id, qty, Money::from_major(4))],
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_order() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;

        let detail = order(&fx, p.id, 10).await;
        assert_eq!(detail.order.status, PurchaseOrderStatus::Open);
        assert_eq!(detail.order.total, Money::from_major(40));
        assert_eq!(detail.items[0].received_qty, 0);

        let fetched = fx.engine.receiving().get_order(detail.order.id).await.unwrap();
        assert_eq!(fetched.items, detail.items);
    }

    #[tokio::test]
    async fn test_create_order_validation() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;
        let supplier = fx.engine.catalog().create_supplier("Acme").await.unwrap();
        let receiving = fx.engine.receiving();

        let empty = NewPurchaseOrder {
            supplier_id: supplier.id,
            items: vec![],
        };
        assert_eq!(receiving.create_order(fx.stock_clerk(), empty).await.unwrap_err().status_code(), 400);

        let zero = NewPurchaseOrder {
            supplier_id: supplier.id,
            items: vec![PurchaseLine::new(p.id, 0, Money::from_major(1))],
        };
        assert_eq!(receiving.create_order(fx.stock_clerk(), zero).await.unwrap_err().status_code(), 400);

        let no_supplier = NewPurchaseOrder {
            supplier_id: 404,
            items: vec![PurchaseLine::new(p.id, 1, Money::from_major(1))],
        };
        let err = receiving.create_order(fx.stock_clerk(), no_supplier).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SupplierNotFound(404))));

        let no_product = NewPurchaseOrder {
            supplier_id: supplier.id,
            items: vec![PurchaseLine::new(999, 1, Money::from_major(1))],
        };
        let err = receiving.create_order(fx.stock_clerk(), no_product).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::ProductNotFound(999))));
    }

    #[tokio::test]
    async fn test_receive_clamps_and_closes() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;
        let detail = order(&fx, p.id, 10).await;
        let receiving = fx.engine.receiving();

        let first = receiving
            .receive(fx.stock_clerk(), detail.order.id, &[ReceiveLine::new(p.id, 7)])
            .await
            .unwrap();
        assert_eq!(first.accepted_units(), 7);
        assert!(!first.order_closed);
        assert_eq!(fx.product_stock(p.id).await, 7);

        let second = receiving
            .receive(fx.stock_clerk(), detail.order.id, &[ReceiveLine::new(p.id, 5)])
            .await
            .unwrap();
        assert_eq!(second.accepted_units(), 3);
        assert!(second.order_closed);
        assert_eq!(fx.product_stock(p.id).await, 10);

        let purchase_id = second.purchase_id.unwrap();
        let movements = fx.movements_by_reference(&movement_ref(PURCHASE_REFERENCE, purchase_id)).await;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].qty, 3);

        let purchase = receiving.get_purchase(purchase_id).await.unwrap().unwrap();
        assert_eq!(purchase.purchase.order_id, Some(detail.order.id));
        assert_eq!(purchase.purchase.total, Money::from_major(12));

        let fetched = receiving.get_order(detail.order.id).await.unwrap();
        assert_eq!(fetched.order.status, PurchaseOrderStatus::Closed);
        assert_eq!(fetched.items[0].received_qty, 10);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_receive_again_changes_nothing() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;
        let detail = order(&fx, p.id, 4).await;
        let receiving = fx.engine.receiving();
        let lines = [ReceiveLine::new(p.id, 4)];

        receiving.receive(fx.stock_clerk(), detail.order.id, &lines).await.unwrap();
        let movements = fx.movement_count().await;

        let again = receiving.receive(fx.stock_clerk(), detail.order.id, &lines).await.unwrap();
        assert_eq!(again.purchase_id, None);
        assert!(again.received.is_empty());
        assert!(!again.order_closed);
        assert_eq!(fx.product_stock(p.id).await, 4);
        assert_eq!(fx.movement_count().await, movements);
        assert_eq!(fx.purchase_count().await, 1);
    }

    #[tokio::test]
    async fn test_claim_with_stale_line_takes_nothing() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;
        let detail = order(&fx, p.id, 3).await;
        let receiving = fx.engine.receiving();
        receiving
            .receive(fx.stock_clerk(), detail.order.id, &[ReceiveLine::new(p.id, 3)])
            .await
            .unwrap();

        // As read before the receipt above: nothing received yet.
        let mut stale = detail.items[0].clone();
        assert_eq!(stale.received_qty, 0);

        let db = fx.engine.db();
        let mut tx = db.begin().await.unwrap();
        let taken = receiving.claim(&mut tx, &mut stale, 3).await.unwrap();
        db.commit(tx).await.unwrap();

        assert_eq!(taken, 0);
        assert_eq!(stale.received_qty, 0);
        let order = receiving.get_order(detail.order.id).await.unwrap();
        assert_eq!(order.items[0].received_qty, 3);
        assert_eq!(fx.product_stock(p.id).await, 3);
    }

    #[tokio::test]
    async fn test_receive_skips_unknown_and_non_positive_lines() {
        let fx = Fixture::new().await;
        let p = fx.product_unstocked("P-1", 10).await;
        let other = fx.product_unstocked("P-2", 10).await;
        let detail = order(&fx, p.id, 5).await;

        let result = fx
            .engine
            .receiving()
            .receive(
                fx.stock_clerk(),
                detail.order.id,
                &[ReceiveLine::new(p.id, -2), ReceiveLine::new(other.id, 3), ReceiveLine::new(p.id, 0)],
            )
            .await
            .unwrap();

        assert_eq!(result.purchase_id, None);
        assert_eq!(fx.product_stock(p.id).await, 0);
        assert_eq!(fx.product_stock(other.id).await, 0);
        assert_eq!(fx.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_receive_errors() {
        let fx = Fixture::new().await;
        let err = fx
            .engine
            .receiving()
            .receive(fx.stock_clerk(), 404, &[ReceiveLine::new(1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::PurchaseOrderNotFound(404))));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_record_purchase_credits_stock() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 10, 2).await;
        let supplier = fx.engine.catalog().create_supplier("Acme").await.unwrap();

        let detail = fx
            .engine
            .receiving()
            .record_purchase(
                fx.stock_clerk(),
                NewPurchase {
                    supplier_id: supplier.id,
                    items: vec![PurchaseLine::new(p.id, 6, Money::from_major(3))],
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.purchase.order_id, None);
        assert_eq!(detail.purchase.total, Money::from_major(18));
        assert_eq!(fx.product_stock(p.id).await, 8);
        assert_eq!(
            fx.movements_by_reference(&movement_ref(PURCHASE_REFERENCE, detail.purchase.id)).await.len(),
            1
        );
        assert!(fx.audit.actions().contains(&"purchase".to_string()));
    }
}
