//! # Error Types
//!
//! Domain-specific error types for folio-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  folio-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Status family (404 / 409 / 400 / 500)          │
//! │                                                                         │
//! │  folio-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  folio-engine errors                                                   │
//! │  └── EngineError      - What callers of a workflow see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                   │
//! │                          DbError ───┴→ EngineError → ErrorBody         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Messages are operator-facing and name only the entity id involved
//! 3. Every variant classifies into exactly one [`ErrorKind`]

use serde::Serialize;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Failure family. Maps 1:1 onto HTTP-equivalent status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing product, sale, order, warehouse, ... (404)
    NotFound,
    /// Business state forbids the operation: stock, session, void (409)
    Conflict,
    /// Malformed or out-of-range input (400)
    Validation,
    /// Store is not configured for the operation (500)
    Configuration,
    /// Storage or other unexpected failure (500)
    Internal,
}

impl ErrorKind {
    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 400,
            ErrorKind::Configuration | ErrorKind::Internal => 500,
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(i64),

    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// Missing, or exists but inactive.
    #[error("Promotion not found or inactive: {0}")]
    PromotionNotFound(i64),

    #[error("Supplier not found: {0}")]
    SupplierNotFound(i64),

    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(i64),

    #[error("Cash session not found: {0}")]
    CashSessionNotFound(i64),

    #[error("Stock transfer not found: {0}")]
    TransferNotFound(i64),

    /// A stock delta would drive a level negative.
    ///
    /// ## When This Occurs
    /// - Selling more than is on hand in the warehouse
    /// - A concurrent sale drained the level between the pre-check and the write
    /// - Transferring out more than the source warehouse holds
    /// - Manual OUT / negative ADJ below zero
    ///
    /// ```text
    /// Sale (qty: 5) ──► level = 3 ──► InsufficientStock { available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for product {product_id} in warehouse {warehouse_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        warehouse_id: i64,
        available: i64,
        requested: i64,
    },

    /// Sales require the operator's cash drawer to be open.
    #[error("An open cash session is required to register sales")]
    CashSessionRequired,

    #[error("A cash session is already open for this user")]
    SessionAlreadyOpen,

    #[error("No open cash session for this user")]
    NoOpenSession,

    /// Sessions close only through a Z audit.
    #[error("A Z audit is required to close the cash session")]
    ZAuditRequired,

    #[error("Sale {0} is already void")]
    AlreadyVoided(i64),

    #[error("Insufficient payment: total {total}, paid {paid}")]
    InsufficientPayment { total: Money, paid: Money },

    /// Without cash there is no change to give, so payments must match.
    #[error("Payments must equal the total when no cash is tendered: total {total}, paid {paid}")]
    PaymentMismatch { total: Money, paid: Money },

    #[error("No default warehouse is configured")]
    DefaultWarehouseMissing,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Status family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::WarehouseNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::PromotionNotFound(_)
            | CoreError::SupplierNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::PurchaseOrderNotFound(_)
            | CoreError::TransferNotFound(_)
            | CoreError::CashSessionNotFound(_) => ErrorKind::NotFound,

            CoreError::InsufficientStock { .. }
            | CoreError::CashSessionRequired
            | CoreError::SessionAlreadyOpen
            | CoreError::NoOpenSession
            | CoreError::ZAuditRequired
            | CoreError::AlreadyVoided(_)
            | CoreError::InsufficientPayment { .. }
            | CoreError::PaymentMismatch { .. } => ErrorKind::Conflict,

            CoreError::Validation(_) => ErrorKind::Validation,

            CoreError::DefaultWarehouseMissing => ErrorKind::Configuration,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any row is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A list must contain at least one entry.
    #[error("{field} must not be empty")]
    Empty { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Source and destination are the same warehouse.
    #[error("Source and destination warehouse must differ")]
    SameWarehouse,
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required { field: field.into() }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        ValidationError::Empty { field: field.into() }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive { field: field.into() }
    }

    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative { field: field.into() }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
