//! # Sale Transaction Service
//!
//! Registers a paid sale in one transaction.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale(actor, request)                      │
//! │                                                                         │
//! │  VALIDATING                                                             │
//! │  ├── items / payments not empty                                        │
//! │  ├── operator has an open cash session      ──► CashSessionRequired    │
//! │  ├── default warehouse configured           ──► DefaultWarehouseMissing│
//! │  ├── customer → price list, active promotion                           │
//! │  └── per line: qty > 0, product exists, level >= qty (pre-check)       │
//! │                                                                         │
//! │  PRICING RESOLVED                                                       │
//! │  ├── PricingResolver::totals (system tax policy)                       │
//! │  └── tender: accepted methods, Σ paid >= total, exact without cash     │
//! │                                                                         │
//! │  STOCK RESERVED / PERSISTED (PAID)                                      │
//! │  ├── allocate invoice number (counter += 1)                            │
//! │  ├── INSERT sale header                                                │
//! │  ├── per line: apply_delta(−qty)  ◄── authoritative stock gate         │
//! │  │             INSERT sale_item, movement OUT "SALE:{id}"              │
//! │  ├── INSERT payments                                                   │
//! │  └── COMMIT ──► audit "sale"                                           │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: no rows, no counter.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The invoice number is drawn after every check has passed, inside the
//! same transaction, so a failed sale never consumes a number.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use folio_core::pricing::{PriceLine, SaleTotals};
use folio_core::validation::{validate_not_empty, validate_quantity, validate_tender};
use folio_core::{
    movement_ref, Actor, CoreError, Money, Payment, PricingResolver, Promotion, Sale, SaleItem, StockMovementType,
    Tender, ValidationError, SALE_REFERENCE,
};
use folio_db::{Database, NewSale};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{fail, EngineResult};
use crate::ledger::StockLedger;

// =============================================================================
// Requests & Receipts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl SaleLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        SaleLine { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleRequest {
    pub items: Vec<SaleLine>,
    pub payments: Vec<Tender>,
    pub customer_id: Option<i64>,
    pub promotion_id: Option<i64>,
    /// Used only when no promotion is given.
    pub discount: Money,
}

impl SaleRequest {
    pub fn new(items: Vec<SaleLine>, payments: Vec<Tender>) -> Self {
        SaleRequest {
            items,
            payments,
            ..Default::default()
        }
    }
}

/// A sale as persisted, with its lines and payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    /// Cash to hand back: Σ paid − total, never negative.
    pub change: Money,
}

impl SaleReceipt {
    fn new(sale: Sale, items: Vec<SaleItem>, payments: Vec<Payment>) -> Self {
        let paid: Money = payments.iter().map(|p| p.amount).sum();
        let change = (paid - sale.total.rounded()).non_negative();
        SaleReceipt {
            sale,
            items,
            payments,
            change,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct SaleTransactionService<'a> {
    db: &'a Database,
    audit: &'a dyn AuditSink,
    ledger: StockLedger<'a>,
}

impl<'a> SaleTransactionService<'a> {
    pub fn new(db: &'a Database, audit: &'a dyn AuditSink) -> Self {
        SaleTransactionService {
            db,
            audit,
            ledger: StockLedger::new(db, audit),
        }
    }

    /// Registers a PAID sale. See the module docs for the exact sequence.
    pub async fn create_sale(&self, actor: Actor, request: SaleRequest) -> EngineResult<SaleReceipt> {
        debug!(user_id = actor.user_id, lines = request.items.len(), "create_sale");

        validate_not_empty("items", &request.items).map_err(CoreError::from)?;
        validate_not_empty("payments", &request.payments).map_err(CoreError::from)?;

        let mut tx = self.db.begin().await?;

        if self.db.cash().open_session_for(&mut tx, actor.user_id).await?.is_none() {
            warn!(user_id = actor.user_id, "Sale rejected: no open cash session");
            return fail(CoreError::CashSessionRequired);
        }

        let settings = self.db.settings().get(&mut tx).await?;
        let Some(warehouse_id) = settings.default_warehouse_id else {
            return fail(CoreError::DefaultWarehouseMissing);
        };

        // Customer price list and promotion.
        let price_list_id = match request.customer_id {
            Some(id) => match self.db.catalog().get_customer(&mut tx, id).await? {
                Some(customer) => customer.price_list_id,
                None => return fail(CoreError::CustomerNotFound(id)),
            },
            None => None,
        };

        let promotion: Option<Promotion> = match request.promotion_id {
            Some(id) => match self.db.catalog().active_promotion(&mut tx, id).await? {
                Some(promotion) => Some(promotion),
                None => return fail(CoreError::PromotionNotFound(id)),
            },
            None => None,
        };

        // Lines: existence, stock pre-check, unit price.
        let resolver = PricingResolver::new(settings.tax_policy());
        let mut lines = Vec::with_capacity(request.items.len());

        for item in &request.items {
            validate_quantity(item.quantity).map_err(CoreError::from)?;
            let product = self.ledger.require_product(&mut tx, item.product_id).await?;

            let available = self.ledger.level(&mut tx, product.id, warehouse_id).await?;
            if available < item.quantity {
                warn!(product_id = product.id, available, requested = item.quantity, "Sale rejected: insufficient stock");
                return fail(CoreError::InsufficientStock {
                    product_id: product.id,
                    warehouse_id,
                    available,
                    requested: item.quantity,
                });
            }

            let list_price = match price_list_id {
                Some(list_id) => self.db.catalog().list_price(&mut tx, list_id, product.id).await?,
                None => None,
            };

            lines.push(PriceLine::new(product.id, item.quantity, resolver.unit_price(product.price, list_price)));
        }

        let totals = resolver.totals(&lines, promotion.as_ref().map(Promotion::rule), request.discount);

        // Tender.
        for tender in &request.payments {
            if !settings.accepts(&tender.method) {
                return fail(
                    ValidationError::NotAllowed {
                        field: "payment method".to_string(),
                        allowed: settings
                            .accepted_payment_methods()
                            .iter()
                            .map(|m| m.as_str().to_string())
                            .collect(),
                    }
                    .into(),
                );
            }
        }
        validate_tender(&request.payments, totals.total)?;

        // Persist.
        let invoice_number = self.db.settings().allocate_invoice_number(&mut tx).await?;
        let sale = self
            .db
            .sales()
            .insert_sale(
                &mut tx,
                &NewSale {
                    invoice_number,
                    user_id: actor.user_id,
                    customer_id: request.customer_id,
                    promotion_id: promotion.as_ref().map(|p| p.id),
                    price_list_id,
                    warehouse_id,
                    totals,
                    tax_rate: settings.tax_rate,
                    tax_included: settings.tax_included,
                },
            )
            .await?;

        let reference = movement_ref(SALE_REFERENCE, sale.id);
        let mut items = Vec::with_capacity(lines.len());

        for line in &lines {
            self.ledger
                .apply_delta(&mut tx, line.product_id, warehouse_id, -line.quantity)
                .await?;
            items.push(
                self.db
                    .sales()
                    .insert_item(&mut tx, sale.id, line.product_id, line.quantity, line.unit_price)
                    .await?,
            );
            self.db
                .stock()
                .record_movement(
                    &mut tx,
                    line.product_id,
                    warehouse_id,
                    StockMovementType::Out,
                    line.quantity,
                    &reference,
                )
                .await?;
        }

        let mut payments = Vec::with_capacity(request.payments.len());
        for tender in &request.payments {
            payments.push(self.db.sales().insert_payment(&mut tx, sale.id, tender).await?);
        }

        self.db.commit(tx).await?;

        log_committed(&sale, &totals);
        self.audit.record(AuditEvent::new(
            actor,
            "sale",
            "sale",
            sale.id,
            json!({
                "invoice_number": sale.invoice_number,
                "total": sale.total.rounded(),
                "items": items.len(),
            }),
        ));

        Ok(SaleReceipt::new(sale, items, payments))
    }

    /// Reads a sale back with its lines and payments.
    pub async fn get_sale(&self, sale_id: i64) -> EngineResult<SaleReceipt> {
        let mut conn = self.db.acquire().await?;

        let Some(sale) = self.db.sales().get_by_id(&mut conn, sale_id).await? else {
            return fail(CoreError::SaleNotFound(sale_id));
        };
        let items = self.db.sales().items(&mut conn, sale_id).await?;
        let payments = self.db.sales().payments(&mut conn, sale_id).await?;

        Ok(SaleReceipt::new(sale, items, payments))
    }
}

fn log_committed(sale: &Sale, totals: &SaleTotals) {
    info!(
        sale_id = sale.id,
        invoice = %sale.invoice_number,
        total = %totals.total,
        discount = %totals.discount,
        "Sale registered"
    );
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Fixture};
    use crate::EngineError;
    use folio_core::{PromotionKind, Role, SaleStatus, TaxRate};
    use rust_decimal::Decimal;

    fn cash_sale(product_id: i64, qty: i64, paid: i64) -> SaleRequest {
        SaleRequest::new(vec![SaleLine::new(product_id, qty)], vec![Tender::cash(Money::from_major(paid))])
    }

    #[tokio::test]
    async fn test_two_units_cash_sale() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 100).await;

        let receipt = fx.engine.sales().create_sale(fx.cashier(), cash_sale(p.id, 2, 40)).await.unwrap();

        assert_eq!(receipt.sale.total, Money::from_major(40));
        assert_eq!(receipt.sale.status, SaleStatus::Paid);
        assert_eq!(receipt.sale.invoice_number, "B001-000001");
        assert_eq!(receipt.sale.warehouse_id, fx.warehouse_id);
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.payments.len(), 1);
        assert_eq!(receipt.change, Money::ZERO);

        assert_eq!(fx.product_stock(p.id).await, 8);
        let movements = fx.movements_by_reference(&movement_ref(SALE_REFERENCE, receipt.sale.id)).await;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, StockMovementType::Out);
        assert_eq!(movements[0].qty, 2);

        assert_eq!(fx.audit.actions(), vec!["cash_open", "sale"]);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_rows() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 3).await;
        fx.open_session(fx.cashier(), 0).await;
        let movements_before = fx.movement_count().await;

        let err = fx
            .engine
            .sales()
            .create_sale(fx.cashier(), cash_sale(p.id, 5, 100))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));
        assert_eq!(fx.sale_count().await, 0);
        assert_eq!(fx.movement_count().await, movements_before);
        assert_eq!(fx.product_stock(p.id).await, 3);
        assert_eq!(fx.engine.catalog().settings().await.unwrap().invoice_next, 1);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_hit_the_write_gate() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 10, 5).await;
        fx.open_session(fx.cashier(), 0).await;

        // Each line passes the pre-check on its own; together they exceed the level.
        let request = SaleRequest::new(
            vec![SaleLine::new(p.id, 3), SaleLine::new(p.id, 3)],
            vec![Tender::cash(Money::from_major(60))],
        );
        let err = fx.engine.sales().create_sale(fx.cashier(), request).await.unwrap_err();

        assert!(matches!(err, EngineError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(fx.sale_count().await, 0);
        assert_eq!(fx.product_stock(p.id).await, 5);
        assert_eq!(fx.engine.catalog().settings().await.unwrap().invoice_next, 1);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test]
    async fn test_requires_open_cash_session() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;

        let err = fx
            .engine
            .sales()
            .create_sale(fx.cashier(), cash_sale(p.id, 1, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::CashSessionRequired)));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_requires_default_warehouse() {
        let fx = Fixture::without_default_warehouse().await;
        let p = fx.product_unstocked("P-1", 20).await;
        fx.open_session(fx.cashier(), 0).await;

        let err = fx
            .engine
            .sales()
            .create_sale(fx.cashier(), cash_sale(p.id, 1, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::DefaultWarehouseMissing)));
    }

    #[tokio::test]
    async fn test_empty_items_or_payments() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let sales = fx.engine.sales();

        let no_items = SaleRequest::new(vec![], vec![Tender::cash(Money::from_major(1))]);
        assert_eq!(sales.create_sale(fx.cashier(), no_items).await.unwrap_err().status_code(), 400);

        let no_payments = SaleRequest::new(vec![SaleLine::new(p.id, 1)], vec![]);
        assert_eq!(sales.create_sale(fx.cashier(), no_payments).await.unwrap_err().status_code(), 400);

        let zero_qty = cash_sale(p.id, 0, 20);
        assert_eq!(sales.create_sale(fx.cashier(), zero_qty).await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_unknown_product_customer_promotion() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let sales = fx.engine.sales();

        let err = sales.create_sale(fx.cashier(), cash_sale(999, 1, 20)).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::ProductNotFound(999))));

        let mut request = cash_sale(p.id, 1, 20);
        request.customer_id = Some(77);
        let err = sales.create_sale(fx.cashier(), request).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::CustomerNotFound(77))));

        let promo = fx
            .engine
            .catalog()
            .create_promotion("Off", PromotionKind::Percent, Decimal::from(10), false)
            .await
            .unwrap();
        let mut request = cash_sale(p.id, 1, 20);
        request.promotion_id = Some(promo.id);
        let err = sales.create_sale(fx.cashier(), request).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::PromotionNotFound(_))));
        assert_eq!(err.status_code(), 404);

        assert_eq!(fx.sale_count().await, 0);
    }

    #[tokio::test]
    async fn test_price_list_and_promotion() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let catalog = fx.engine.catalog();

        let list = catalog.create_price_list("Wholesale").await.unwrap();
        catalog.set_list_price(list.id, p.id, Money::from_major(15)).await.unwrap();
        let customer = catalog.create_customer("Bodega", Some(list.id)).await.unwrap();
        let promo = catalog
            .create_promotion("Ten", PromotionKind::Percent, Decimal::from(10), true)
            .await
            .unwrap();

        let mut request = cash_sale(p.id, 2, 50);
        request.customer_id = Some(customer.id);
        request.promotion_id = Some(promo.id);
        request.discount = Money::from_major(25);

        let receipt = fx.engine.sales().create_sale(fx.cashier(), request).await.unwrap();

        assert_eq!(receipt.items[0].unit_price, Money::from_major(15));
        assert_eq!(receipt.sale.discount, Money::from_major(3));
        assert_eq!(receipt.sale.total, Money::from_major(27));
        assert_eq!(receipt.sale.price_list_id, Some(list.id));
        assert_eq!(receipt.sale.promotion_id, Some(promo.id));
        assert_eq!(receipt.change, Money::from_major(23));
    }

    #[tokio::test]
    async fn test_full_percent_promotion_yields_zero_total() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let promo = fx
            .engine
            .catalog()
            .create_promotion("Free", PromotionKind::Percent, Decimal::from(100), true)
            .await
            .unwrap();

        let mut request = cash_sale(p.id, 2, 1);
        request.promotion_id = Some(promo.id);
        let receipt = fx.engine.sales().create_sale(fx.cashier(), request).await.unwrap();

        assert_eq!(receipt.sale.total, Money::ZERO);
        assert_eq!(receipt.sale.discount, Money::from_major(40));
    }

    #[tokio::test]
    async fn test_inclusive_tax_from_settings() {
        let fx = Fixture::new().await;
        fx.engine.catalog().set_tax_policy(TaxRate::from_percent(18), true).await.unwrap();
        let p = fx.product("P-1", 118, 10).await;
        fx.open_session(fx.cashier(), 0).await;

        let receipt = fx.engine.sales().create_sale(fx.cashier(), cash_sale(p.id, 1, 118)).await.unwrap();

        assert_eq!(receipt.sale.tax, Money::from_major(18));
        assert_eq!(receipt.sale.subtotal, Money::from_major(100));
        assert_eq!(receipt.sale.total, Money::from_major(118));
        assert!(receipt.sale.tax_included);
    }

    #[tokio::test]
    async fn test_tender_rules() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let sales = fx.engine.sales();

        let short = cash_sale(p.id, 2, 30);
        let err = sales.create_sale(fx.cashier(), short).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InsufficientPayment { .. })));

        let overpaid_card = SaleRequest::new(vec![SaleLine::new(p.id, 2)], vec![Tender::new("card", Money::from_major(50))]);
        let err = sales.create_sale(fx.cashier(), overpaid_card).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::PaymentMismatch { .. })));

        let unknown = SaleRequest::new(vec![SaleLine::new(p.id, 2)], vec![Tender::new("crypto", Money::from_major(40))]);
        let err = sales.create_sale(fx.cashier(), unknown).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(ValidationError::NotAllowed { .. }))));

        let split = SaleRequest::new(
            vec![SaleLine::new(p.id, 2)],
            vec![Tender::new("card", Money::from_major(25)), Tender::cash(Money::from_major(20))],
        );
        let receipt = sales.create_sale(fx.cashier(), split).await.unwrap();
        assert_eq!(receipt.payments.len(), 2);
        assert_eq!(receipt.change, Money::from_major(5));

        assert_eq!(fx.sale_count().await, 1);
        assert_eq!(fx.product_stock(p.id).await, 8);
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_gapless() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;
        let sales = fx.engine.sales();

        let first = sales.create_sale(fx.cashier(), cash_sale(p.id, 1, 20)).await.unwrap();
        assert!(sales.create_sale(fx.cashier(), cash_sale(p.id, 50, 1000)).await.is_err());
        let second = sales.create_sale(fx.cashier(), cash_sale(p.id, 1, 20)).await.unwrap();

        assert_eq!(first.sale.invoice_number, "B001-000001");
        assert_eq!(second.sale.invoice_number, "B001-000002");
    }

    #[tokio::test]
    async fn test_get_sale() {
        let fx = Fixture::new().await;
        let p = fx.product("P-1", 20, 10).await;
        fx.open_session(fx.cashier(), 0).await;

        let created = fx.engine.sales().create_sale(fx.cashier(), cash_sale(p.id, 1, 50)).await.unwrap();
        let fetched = fx.engine.sales().get_sale(created.sale.id).await.unwrap();

        assert_eq!(fetched.sale, created.sale);
        assert_eq!(fetched.items, created.items);
        assert_eq!(fetched.change, Money::from_major(30));

        let err = fx.engine.sales().get_sale(999).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::SaleNotFound(999))));
    }
    // =========================================================================
    // Concurrency
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_cashiers_all_commit() {
        let fx = Fixture::on_disk().await;
        let mut tasks = tokio::task::JoinSet::new();

        for n in 0..4 {
            let cashier = Actor::new(100 + n, Role::Cashier);
            let product = fx.product(&format!("P-{}", n), 5, 20).await;
            fx.open_session(cashier, 0).await;

            let engine = fx.engine.clone();
            tasks.spawn(async move {
                for _ in 0..10 {
                    engine.sales().create_sale(cashier, cash_sale(product.id, 1, 5)).await?;
                }
                Ok::<_, EngineError>(product.id)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let product_id = joined.unwrap().unwrap();
            assert_eq!(fx.product_stock(product_id).await, 10);
        }

        assert_eq!(fx.sale_count().await, 40);
        assert_eq!(fx.engine.catalog().settings().await.unwrap().invoice_next, 41);
        testing::assert_stock_invariants(&fx.engine).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_race_for_last_unit() {
        let fx = Fixture::on_disk().await;
        let p = fx.product("LAST", 10, 1).await;
        let first = Actor::new(100, Role::Cashier);
        let second = Actor::new(101, Role::Cashier);
        fx.open_session(first, 0).await;
        fx.open_session(second, 0).await;

        let a = fx.engine.clone();
        let b = fx.engine.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.sales().create_sale(first, cash_sale(p.id, 1, 10)).await }),
            tokio::spawn(async move { b.sales().create_sale(second, cash_sale(p.id, 1, 10)).await }),
        );
        let results = [ra.unwrap(), rb.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EngineError::Core(CoreError::InsufficientStock { .. })))));

        assert_eq!(fx.product_stock(p.id).await, 0);
        assert_eq!(fx.sale_count().await, 1);
        testing::assert_stock_invariants(&fx.engine).await;
    }
}
