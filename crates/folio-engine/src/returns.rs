//! # Return Workflow
//!
//! Full reversal of a PAID sale.
//!
//! ```text
//! return_sale(sale_id, reason)              one transaction
//!   ├── sale exists                         ──► SaleNotFound
//!   ├── UPDATE sales SET status = 'VOID'
//!   │     WHERE id = ? AND status = 'PAID'  ──► AlreadyVoided when 0 rows
//!   ├── INSERT sale_returns
//!   └── per original line:
//!         apply_delta(+qty) on the sale's warehouse
//!         movement IN "RETURN:{return_id}", INSERT sale_return_items
//! ```
//!
//! The conditional status flip is what serializes two concurrent returns
//! of the same sale; the loser sees zero rows updated.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use folio_core::{
    movement_ref, Actor, CoreError, SaleReturn, SaleReturnItem, StockMovementType, ValidationError, RETURN_REFERENCE,
};
use folio_db::Database;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{fail, EngineResult};
use crate::ledger::StockLedger;

/// A persisted return with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub sale_return: SaleReturn,
    pub items: Vec<SaleReturnItem>,
}

pub struct ReturnWorkflow<'a> {
    db: &'a Database,
    audit: &'a dyn AuditSink,
    ledger: StockLedger<'a>,
}

impl<'a> ReturnWorkflow<'a> {
    pub fn new(db: &'a Database, audit: &'a dyn AuditSink) -> Self {
        ReturnWorkflow {
            db,
            audit,
            ledger: StockLedger::new(db, audit),
        }
    }

    /// Voids the sale and puts every line back into the warehouse it left.
    pub async fn return_sale(&self, actor: Actor, sale_id: i64, reason: &str) -> EngineResult<ReturnReceipt> {
        let reason = reason.trim();
        if reason.is_empty() {
            return fail(ValidationError::required("reason").into());
        }

        let mut tx = self.db.begin().await?;

        let Some(sale) = self.db.sales().get_by_id(&mut tx, sale_id).await? else {
            return fail(CoreError::SaleNotFound(sale_id));
        };

        if sale.is_void() || !self.db.sales().mark_void(&mut tx, sale_id).await? {
            warn!(sale_id, "Return rejected: sale already voided");
            return fail(CoreError::AlreadyVoided(sale_id));
        }

        let sale_return = self.db.returns().insert_return(&mut tx, sale_id, actor.user_id, reason).await?;
        let reference = movement_ref(RETURN_REFERENCE, sale_return.id);

        let lines = self.db.sales().items(&mut tx, sale_id).await?;
        let mut items = Vec::with_capacity(lines.len());

        for line in &lines {
            self.ledger
                .apply_delta(&mut tx, line.product_id, sale.warehouse_id, line.qty)
                .await?;
            self.db
                .stock()
                .record_movement(
                    &mut tx,
                    line.product_id,
                    sale.warehouse_id,
                    StockMovementType::In,
                    line.qty,
                    &reference,
                )
                .await?;
            items.push(
                self.db
                    .returns()
                    .insert_item(&mut tx, sale_return.id, line.product_id, line.qty)
                    .await?,
            );
        }

        self.db.commit(tx).await?;

        info!(sale_id, return_id = sale_return.id, lines = items.len(), "Sale returned");
        self.audit.record(AuditEvent::new(
            actor,
            "sale_return",
            "sale",
            sale_id,
            json!({
                "return_id": sale_return.id,
                "invoice_number": sale.invoice_number,
                "reason": reason,
            }),
        ));

        Ok(ReturnReceipt { sale_return, items })
    }

    /// The return recorded against a sale, if any.
    pub async fn get_return(&self, sale_id: i64) -> EngineResult<Option<ReturnReceipt>> {
        let mut conn = self.db.acquire().await?;

        let Some(sale_return) = self.db.returns().get_by_sale(&mut conn, sale_id).await? else {
            return Ok(None);
        };
        let items = self.db.returns().items(&mut conn, sale_return.id).await?;

        Ok(Some(ReturnReceipt { sale_return, items }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sales::{SaleLine, SaleRequest};
    use crate::testing::{self, Fixture};
    use crate::EngineError;
    use folio_core::{Money, SaleStatus, Tender};

    #[tokio::test]
    async fn test_return_restores_levels() {
        let fx = Fixture::new().await;
        let a = fx.product("A-1", 20, 10).await;
        let b = fx.product("B-1", 5, 4).await;
        fx.open_session(fx.cashier(), 0).await;

        let receipt = fx
            .engine
            .sales()
            .create_sale(
                fx.cashier(),
                SaleRequest::new(
                    vec![SaleLine::new(a.id, 3), SaleLine::new(b.id, 4)],
                    vec![Tender::cash(Money::from_major(80))],
                ),
            )
            .await
            .unwrap();
        assert_eq!(fx.product_stock(b.id).await, 0);

        let returned = fx
            .engine
            .returns()
            .return_sale(fx.manager(), receipt.sale.id, "customer changed mind")
            .await
            .unwrap();

        assert_eq!(returned.items.len(), 2);
        assert_eq!(fx.product_stock(a.id).await, 10);
        assert_eq!(fx.product_stock(b.id).await, 4);

        let sale = fx.engine.sales().get_sale(receipt.sale.id).await.unwrap().sale;
        assert_eq!(sale.status, SaleStatus::Void);

        let movements = fx
            .movements_by_reference(&movement_ref(RETURN_REFERENCE, returned.sale_return.id))
            .await;
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.kind == StockMovementType::In));

        let fetched = fx.engine.returns().get_return(receipt.sale.id).await.unwrap();
        assert_eq!(fetched, Some(returned));
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_return_credits_the_sale_warehouse() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 10, 5).await;
        fx.open_session(fx.cashier(), 0).await;

        let receipt = fx
            .engine
            .sales()
            .create_sale(
                fx.cashier(),
                SaleRequest::new(vec![SaleLine::new(p.id, 2)], vec![Tender::cash(Money::from_major(20))]),
            )
            .await
            .unwrap();

        // Default moves after the sale; the return still goes back to the original warehouse.
        let other = fx.warehouse("Annex").await;
        fx.engine.catalog().set_default_warehouse(other).await.unwrap();

        fx.engine.returns().return_sale(fx.manager(), receipt.sale.id, "damaged box").await.unwrap();

        let ledger = fx.engine.ledger();
        assert_eq!(ledger.get_level(p.id, fx.warehouse_id).await.unwrap(), 5);
        assert_eq!(ledger.get_level(p.id, other).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_return_is_rejected() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 10, 5).await;
        fx.open_session(fx.cashier(), 0).await;

        let receipt = fx
            .engine
            .sales()
            .create_sale(
                fx.cashier(),
                SaleRequest::new(vec![SaleLine::new(p.id, 1)], vec![Tender::cash(Money::from_major(10))]),
            )
            .await
            .unwrap();

        let returns = fx.engine.returns();
        returns.return_sale(fx.manager(), receipt.sale.id, "first").await.unwrap();
        let err = returns.return_sale(fx.manager(), receipt.sale.id, "second").await.unwrap_err();

        assert!(matches!(err, EngineError::Core(CoreError::AlreadyVoided(_))));
        assert_eq!(err.status_code(), 409);
        assert_eq!(fx.product_stock(p.id).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_sale_and_missing_reason() {
        let fx = Fixture::new().await;
        let returns = fx.engine.returns();

        let err = returns.return_sale(fx.manager(), 404, "gone").await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SaleNotFound(404))));

        let err = returns.return_sale(fx.manager(), 404, "  ").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert_eq!(returns.get_return(404).await.unwrap(), None);
    }
}
