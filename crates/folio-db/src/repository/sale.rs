//! # Sale Repository
//!
//! Database operations for sales, sale items and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. INSERT HEADER                                                      │
//! │     └── insert_sale() → Sale { status: PAID }                          │
//! │                                                                         │
//! │  2. LINES (one per product line, after the stock debit)               │
//! │     └── insert_item() → SaleItem                                       │
//! │                                                                         │
//! │  3. PAYMENTS                                                           │
//! │     └── insert_payment() → Payment                                     │
//! │                                                                         │
//! │  4. (OPTIONAL) VOID, through a return                                  │
//! │     └── mark_void() → PAID → VOID, at most once                        │
//! │                                                                         │
//! │  1-3 run inside the same transaction; nothing else mutates a sale.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::pricing::SaleTotals;
use folio_core::{Money, Payment, Sale, SaleItem, TaxRate, Tender};

/// Header values for a new sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub invoice_number: String,
    pub user_id: i64,
    pub customer_id: Option<i64>,
    pub promotion_id: Option<i64>,
    pub price_list_id: Option<i64>,
    pub warehouse_id: i64,
    pub totals: SaleTotals,
    pub tax_rate: TaxRate,
    pub tax_included: bool,
}

/// Repository for sale database operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaleRepository;

impl SaleRepository {
    /// Inserts a PAID sale header.
    pub async fn insert_sale(&self, conn: &mut SqliteConnection, sale: &NewSale) -> DbResult<Sale> {
        debug!(invoice = %sale.invoice_number, user_id = sale.user_id, "Inserting sale");

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (
                invoice_number, user_id, customer_id, promotion_id, price_list_id,
                warehouse_id, status, subtotal, tax, discount, total,
                tax_rate, tax_included, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PAID', ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING
                id, invoice_number, user_id, customer_id, promotion_id, price_list_id,
                warehouse_id, status, subtotal, tax, discount, total,
                tax_rate, tax_included, created_at
            "#,
        )
        .bind(&sale.invoice_number)
        .bind(sale.user_id)
        .bind(sale.customer_id)
        .bind(sale.promotion_id)
        .bind(sale.price_list_id)
        .bind(sale.warehouse_id)
        .bind(sale.totals.subtotal)
        .bind(sale.totals.tax)
        .bind(sale.totals.discount)
        .bind(sale.totals.total)
        .bind(sale.tax_rate)
        .bind(sale.tax_included)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Adds a line item.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        sale_id: i64,
        product_id: i64,
        qty: i64,
        unit_price: Money,
    ) -> DbResult<SaleItem> {
        let item = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (sale_id, product_id, qty, unit_price, line_total)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, sale_id, product_id, qty, unit_price, line_total
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .bind(qty)
        .bind(unit_price)
        .bind(unit_price.multiply_quantity(qty))
        .fetch_one(&mut *conn)
        .await?;

        Ok(item)
    }

    /// Records a payment.
    pub async fn insert_payment(&self, conn: &mut SqliteConnection, sale_id: i64, tender: &Tender) -> DbResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (sale_id, method, amount, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, sale_id, method, amount, created_at
            "#,
        )
        .bind(sale_id)
        .bind(&tender.method)
        .bind(tender.amount)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(payment)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, invoice_number, user_id, customer_id, promotion_id, price_list_id,
                warehouse_id, status, subtotal, tax, discount, total,
                tax_rate, tax_included, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale.
    pub async fn items(&self, conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, qty, unit_price, line_total
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Gets all payments for a sale.
    pub async fn payments(&self, conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, sale_id, method, amount, created_at
            FROM payments
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(payments)
    }

    /// Flips a PAID sale to VOID.
    ///
    /// Returns `false` when the sale was not PAID (already void or missing),
    /// so a concurrent second void cannot also succeed.
    pub async fn mark_void(&self, conn: &mut SqliteConnection, sale_id: i64) -> DbResult<bool> {
        debug!(sale_id, "Voiding sale");

        let result = sqlx::query("UPDATE sales SET status = 'VOID' WHERE id = ?1 AND status = 'PAID'")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts sales (for diagnostics and rollback checks).
    pub async fn count(&self, conn: &mut SqliteConnection) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
