//! # folio-core: Pure Business Logic for Folio POS
//!
//! Domain types, money arithmetic, pricing, cash reconciliation math and
//! input validation. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Folio POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (register UI, back office, jobs)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    folio-engine (Workflows)                     │   │
//! │  │   sales, cash sessions, returns, receiving, stock ledger        │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────┐  ┌────────▼──────────────────┐    │
//! │  │   ★ folio-core (THIS CRATE) ★   │  │  folio-db (Database)      │    │
//! │  │                                 │  │  SQLite, migrations,      │    │
//! │  │  types · money · pricing        │◄─┤  repositories             │    │
//! │  │  cash · validation · error      │  │                           │    │
//! │  │                                 │  └───────────────────────────┘    │
//! │  │  NO I/O • NO DATABASE           │                                    │
//! │  └─────────────────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, Sale, PurchaseOrder, ...)
//! - [`money`] - Exact decimal Money
//! - [`pricing`] - Unit price, discount and tax split
//! - [`cash`] - Cash session types and reconciliation math
//! - [`error`] - Domain error types
//! - [`validation`] - Input and tender rules
//!
//! ## Features
//!
//! - `sqlx` - derives row mappings so folio-db can read these types directly
//!
//! ## Example Usage
//!
//! ```rust
//! use folio_core::money::Money;
//! use folio_core::pricing::{PriceLine, PricingResolver, TaxPolicy};
//! use folio_core::types::TaxRate;
//!
//! let resolver = PricingResolver::new(TaxPolicy {
//!     rate: TaxRate::from_percent(18),
//!     included: true,
//! });
//! let totals = resolver.totals(&[PriceLine::new(1, 1, Money::from_major(118))], None, Money::ZERO);
//! assert_eq!(totals.tax, Money::from_major(18));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

#[cfg(feature = "sqlx")]
mod sqlite;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::PricingResolver;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Invoice prefix used when settings have never been edited.
pub const DEFAULT_INVOICE_PREFIX: &str = "B001";

/// Payment methods accepted out of the box.
pub const DEFAULT_PAYMENT_METHODS: &str = "CASH,CARD,TRANSFER";

/// Largest quantity a single stock movement may carry, in either direction.
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000_000;

/// Stock reference recorded for manual adjustments with no reference given.
pub const MANUAL_REFERENCE: &str = "MANUAL";

/// Stock reference recorded for physical counts.
pub const COUNT_REFERENCE: &str = "COUNT";

/// Movement reference prefixes. A full reference is `{PREFIX}:{id}`
/// (see [`types::movement_ref`]).
pub const SALE_REFERENCE: &str = "SALE";
pub const RETURN_REFERENCE: &str = "RETURN";
pub const PURCHASE_REFERENCE: &str = "PURCHASE";
pub const TRANSFER_REFERENCE: &str = "TRANSFER";
pub const BATCH_REFERENCE: &str = "BATCH";
