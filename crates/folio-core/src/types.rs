//! # Domain Types
//!
//! Core entities for the stock ledger and the commerce workflows.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Product ──┬── StockLevel (per warehouse, qty >= 0) ── Warehouse       │
//! │            │        ▲                                                   │
//! │            │        │ every change goes through the ledger             │
//! │            │        ▼                                                   │
//! │            └── StockMovement (append-only: IN / OUT / ADJ)             │
//! │                                                                         │
//! │  Sale ──┬── SaleItem ──► Product                                       │
//! │         ├── Payment                                                    │
//! │         └── SaleReturn ── SaleReturnItem   (status PAID → VOID)        │
//! │                                                                         │
//! │  PurchaseOrder ── PurchaseOrderItem (qty vs received_qty)              │
//! │        │                                                                │
//! │        └──► Purchase ── PurchaseItem   (one per receiving call)        │
//! │                                                                         │
//! │  Customer ──► PriceList ── PriceListItem (per-product override)        │
//! │  Promotion (PERCENT | AMOUNT)                                          │
//! │  SystemSettings (single row: tax, invoice counter, default warehouse)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cash drawer types live in [`crate::cash`].
//!
//! ## Identifiers
//! All entities use surrogate `i64` ids assigned by the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::pricing::{DiscountRule, TaxPolicy};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate expressed as a percentage (18 = 18%).
///
/// ## Example
/// ```rust
/// use folio_core::types::TaxRate;
///
/// let igv = TaxRate::from_percent(18);
/// assert_eq!(igv.to_string(), "18%");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Creates a rate from a whole percentage.
    pub fn from_percent(percent: i64) -> Self {
        TaxRate(Decimal::from(percent))
    }

    /// Creates a rate from an exact percentage (e.g. `8.25`).
    pub const fn from_percentage(percent: Decimal) -> Self {
        TaxRate(percent)
    }

    /// Creates a rate from a stored REAL percentage.
    pub fn from_f64(percent: f64) -> Self {
        TaxRate(Decimal::from_f64(percent).unwrap_or(Decimal::ZERO))
    }

    /// Zero rate (tax exempt).
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    /// Percentage value (18 for 18%).
    pub const fn percentage(&self) -> Decimal {
        self.0
    }

    /// Fractional value (0.18 for 18%).
    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// Checks if this is a zero rate.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Role supplied by the identity collaborator. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
    Stock,
}

/// The authenticated operator performing a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Actor { user_id, role }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product.
///
/// ## Cached Stock
/// `stock` is a cache of `Σ StockLevel.qty` across warehouses. The ledger
/// recomputes it inside every mutating transaction; nothing else writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub cost: Money,
    /// Informational in the sale flow; the system rate applies.
    pub tax_rate: TaxRate,
    pub tax_included: bool,
    pub stock: i64,
    /// Reorder threshold.
    pub stock_min: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when the cached stock is at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.stock_min
    }
}

/// Input for creating a product. Stock always starts at zero and is
/// credited through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price: Money,
    pub cost: Money,
    pub tax_rate: TaxRate,
    pub tax_included: bool,
    pub stock_min: i64,
}

impl NewProduct {
    /// Minimal product with a price; everything else defaulted.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        NewProduct {
            sku: sku.into(),
            name: name.into(),
            category: String::new(),
            price,
            cost: Money::ZERO,
            tax_rate: TaxRate::zero(),
            tax_included: false,
            stock_min: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub price_list_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PriceList {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Promotions
// =============================================================================

/// Kind of flat promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum PromotionKind {
    /// `value` is a percentage of the base total.
    Percent,
    /// `value` is a flat amount.
    Amount,
}

/// A whole-sale discount rule, applied at most once per sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub kind: PromotionKind,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "f64"))]
    pub value: Decimal,
    pub is_active: bool,
}

impl Promotion {
    /// The discount rule this promotion applies.
    pub fn rule(&self) -> DiscountRule {
        match self.kind {
            PromotionKind::Percent => DiscountRule::Percent(self.value),
            PromotionKind::Amount => DiscountRule::Amount(Money::from_decimal(self.value)),
        }
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Quantity of one product in one warehouse. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub qty: i64,
}

/// Direction of a stock movement.
///
/// ## Sign Convention
/// `IN` and `OUT` carry a positive quantity. `ADJ` carries the signed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum StockMovementType {
    In,
    Out,
    Adj,
}

impl StockMovementType {
    /// Ledger delta for a movement of `qty` of this type.
    pub fn delta(&self, qty: i64) -> i64 {
        match self {
            StockMovementType::In | StockMovementType::Adj => qty,
            StockMovementType::Out => -qty,
        }
    }
}

impl fmt::Display for StockMovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockMovementType::In => "IN",
            StockMovementType::Out => "OUT",
            StockMovementType::Adj => "ADJ",
        };
        f.write_str(s)
    }
}

/// Append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub kind: StockMovementType,
    pub qty: i64,
    /// Free-text reference, e.g. `SALE:42`, `RETURN:7`, `PURCHASE:3`.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Header of a warehouse-to-warehouse transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransferRecord {
    pub id: i64,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// One product moved by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransferItem {
    pub id: i64,
    pub transfer_id: i64,
    pub product_id: i64,
    pub qty: i64,
}

/// A received lot of one product, optionally with an expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub lot: String,
    pub expiry_date: Option<NaiveDate>,
    pub qty: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Builds the movement reference for a ledger change caused by an entity.
pub fn movement_ref(prefix: &str, id: i64) -> String {
    format!("{}:{}", prefix, id)
}

// =============================================================================
// Sales
// =============================================================================

/// Sale status. Sales are created `PAID`; a return flips them to `VOID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum SaleStatus {
    Paid,
    Void,
}

/// Payment method code, normalized to upper case (`CASH`, `CARD`, ...).
///
/// The accepted set is configured in settings, so this is an open code
/// rather than an enum. Only `CASH` has special meaning: it is the one
/// method that can make change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(from = "String", into = "String")]
pub struct PaymentMethod(String);

impl PaymentMethod {
    pub const CASH: &'static str = "CASH";

    pub fn new(code: impl AsRef<str>) -> Self {
        PaymentMethod(code.as_ref().trim().to_uppercase())
    }

    pub fn cash() -> Self {
        PaymentMethod(Self::CASH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cash(&self) -> bool {
        self.0 == Self::CASH
    }
}

impl From<String> for PaymentMethod {
    fn from(code: String) -> Self {
        PaymentMethod::new(code)
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.0
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment offered against a sale, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tender {
    pub method: PaymentMethod,
    pub amount: Money,
}

impl Tender {
    pub fn new(method: impl AsRef<str>, amount: Money) -> Self {
        Tender {
            method: PaymentMethod::new(method),
            amount,
        }
    }

    pub fn cash(amount: Money) -> Self {
        Tender {
            method: PaymentMethod::cash(),
            amount,
        }
    }
}

/// A completed sale header.
///
/// ## Snapshot Pattern
/// Tax rate, inclusive flag, price list and warehouse are copied onto the
/// sale so later settings changes don't rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    pub invoice_number: String,
    pub user_id: i64,
    pub customer_id: Option<i64>,
    pub promotion_id: Option<i64>,
    pub price_list_id: Option<i64>,
    /// Warehouse the lines were debited from.
    pub warehouse_id: i64,
    pub status: SaleStatus,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub tax_rate: TaxRate,
    pub tax_included: bool,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn is_void(&self) -> bool {
        self.status == SaleStatus::Void
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub qty: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub sale_id: i64,
    pub method: PaymentMethod,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleReturn {
    pub id: i64,
    pub sale_id: i64,
    pub user_id: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleReturnItem {
    pub id: i64,
    pub return_id: i64,
    pub product_id: i64,
    pub qty: i64,
}

// =============================================================================
// Purchasing
// =============================================================================

/// Purchase order status. `OPEN → CLOSED` once every line is fully received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum PurchaseOrderStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: i64,
    pub supplier_id: i64,
    pub status: PurchaseOrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub qty: i64,
    pub received_qty: i64,
    pub unit_cost: Money,
}

impl PurchaseOrderItem {
    /// Quantity still expected on this line.
    pub fn remaining(&self) -> i64 {
        (self.qty - self.received_qty).max(0)
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_qty >= self.qty
    }

    /// How much of `requested` this line can accept right now.
    ///
    /// ```rust
    /// # use folio_core::types::PurchaseOrderItem;
    /// # use folio_core::Money;
    /// let line = PurchaseOrderItem {
    ///     id: 1, order_id: 1, product_id: 1,
    ///     qty: 10, received_qty: 7, unit_cost: Money::ZERO,
    /// };
    /// assert_eq!(line.receivable(5), 3);
    /// assert_eq!(line.receivable(-2), 0);
    /// ```
    pub fn receivable(&self, requested: i64) -> i64 {
        requested.min(self.remaining()).max(0)
    }
}

/// Realized receipt of goods; one per receiving call or direct purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: i64,
    pub supplier_id: i64,
    pub order_id: Option<i64>,
    pub user_id: i64,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub qty: i64,
    pub unit_cost: Money,
    pub line_total: Money,
}

// =============================================================================
// System Settings
// =============================================================================

/// The single settings row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SystemSettings {
    pub project_name: String,
    pub currency: String,
    pub tax_rate: TaxRate,
    pub tax_included: bool,
    /// Comma-separated method codes, e.g. `CASH,CARD,TRANSFER`.
    pub payment_methods: String,
    pub invoice_prefix: String,
    /// Next number to allocate.
    pub invoice_next: i64,
    pub default_warehouse_id: Option<i64>,
}

impl SystemSettings {
    /// Tax policy applied to every sale.
    pub fn tax_policy(&self) -> TaxPolicy {
        TaxPolicy {
            rate: self.tax_rate,
            included: self.tax_included,
        }
    }

    /// Parsed list of accepted payment methods.
    pub fn accepted_payment_methods(&self) -> Vec<PaymentMethod> {
        self.payment_methods
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(PaymentMethod::new)
            .collect()
    }

    pub fn accepts(&self, method: &PaymentMethod) -> bool {
        self.accepted_payment_methods().iter().any(|m| m == method)
    }
}

/// Formats an invoice number: `B001-000042`.
pub fn format_invoice_number(prefix: &str, number: i64) -> String {
    format!("{}-{:06}", prefix, number)
}

// =============================================================================
// Unit Tests
// =============================================================================
