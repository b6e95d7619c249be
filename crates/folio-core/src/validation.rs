//! # Validation Module
//!
//! Input validation for the commerce workflows.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Workflow entry (THIS MODULE)                                 │
//! │  ├── Shape checks: empty lists, non-positive quantities / amounts      │
//! │  └── Tender rules: enough paid, exact when no cash                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Workflow body (folio-engine)                                 │
//! │  └── Existence and state: product, session, order, sale status         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (qty >= 0) on stock levels                                  │
//! │  ├── UNIQUE open cash session per user                                 │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Layer 3 is authoritative; layers 1-2 fail early with better messages  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use folio_core::validation::{validate_quantity, validate_sku};
//!
//! validate_sku("BK-0001").unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, MONEY_TOLERANCE};
use crate::types::{PromotionKind, StockMovementType, TaxRate, Tender};
use crate::MAX_MOVEMENT_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use folio_core::validation::validate_sku;
///
/// assert!(validate_sku("BK-0001").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, warehouse, customer, ...).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (must be positive).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    Ok(())
}

/// Validates a price or cost (zero allowed).
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::must_not_be_negative(field));
    }
    Ok(())
}

/// Validates an amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a tax rate (0% to 100%).
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    let pct = rate.percentage();
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates a promotion value for its kind.
///
/// ## Rules
/// - PERCENT: 0 to 100
/// - AMOUNT: not negative
pub fn validate_promotion_value(kind: PromotionKind, value: Decimal) -> ValidationResult<()> {
    match kind {
        PromotionKind::Percent if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED => {
            Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 0,
                max: 100,
            })
        }
        PromotionKind::Amount if value < Decimal::ZERO => {
            Err(ValidationError::must_not_be_negative("value"))
        }
        _ => Ok(()),
    }
}

/// Validates a manual stock movement.
///
/// ## Rules
/// - Quantity must not be zero
/// - IN / OUT carry a positive quantity (direction comes from the type)
/// - ADJ carries the signed delta
pub fn validate_stock_movement(kind: StockMovementType, qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustNotBeZero {
            field: "quantity".to_string(),
        });
    }
    if matches!(kind, StockMovementType::In | StockMovementType::Out) && qty < 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    if qty.unsigned_abs() > MAX_MOVEMENT_QUANTITY.unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_MOVEMENT_QUANTITY,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that a list has at least one entry.
pub fn validate_not_empty<T>(field: &str, items: &[T]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::empty(field));
    }
    Ok(())
}

// =============================================================================
// Tender Validation
// =============================================================================

/// Validates payments against a sale total and returns the amount paid.
///
/// ## Rules
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  every amount > 0                ──► else Validation                    │
/// │  Σ paid >= total                 ──► else InsufficientPayment           │
/// │  no CASH tender?                                                        │
/// │    |Σ paid − total| <= 0.01      ──► else PaymentMismatch               │
/// │    (only cash can make change)                                          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// The total is compared at presentation precision, since that is the
/// figure the operator collected against.
///
/// ```rust
/// use folio_core::money::Money;
/// use folio_core::types::Tender;
/// use folio_core::validation::validate_tender;
///
/// let total = Money::from_major(40);
/// assert!(validate_tender(&[Tender::cash(Money::from_major(50))], total).is_ok());
/// assert!(validate_tender(&[Tender::new("CARD", Money::from_major(50))], total).is_err());
/// ```
pub fn validate_tender(tenders: &[Tender], total: Money) -> CoreResult<Money> {
    validate_not_empty("payments", tenders)?;

    for tender in tenders {
        validate_positive_amount("payment amount", tender.amount)?;
    }

    let total = total.rounded();
    let paid: Money = tenders.iter().map(|t| t.amount).sum();

    if paid < total {
        return Err(CoreError::InsufficientPayment { total, paid });
    }

    let has_cash = tenders.iter().any(|t| t.method.is_cash());
    if !has_cash && !paid.approx_eq(total, MONEY_TOLERANCE) {
        return Err(CoreError::PaymentMismatch { total, paid });
    }

    Ok(paid)
}

// =============================================================================
// Unit Tests
// =============================================================================
