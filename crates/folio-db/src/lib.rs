//! # folio-db: Database Layer for Folio POS
//!
//! SQLite storage for the stock ledger and the commerce workflows, through
//! sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Folio POS Data Flow                              │
//! │                                                                         │
//! │  folio-engine workflow (create_sale, receive, ...)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     folio-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ StockRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial  │  │   │
//! │  │   │ begin()       │    │ CashRepo ...  │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/folio.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let qty = db.stock().level(&mut tx, product_id, warehouse_id).await?;
//! db.commit(tx).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cash::{CashRepository, NewCashAudit};
pub use repository::catalog::CatalogRepository;
pub use repository::product::ProductRepository;
pub use repository::purchasing::PurchasingRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::{NewSale, SaleRepository};
pub use repository::settings::SettingsRepository;
pub use repository::stock::{DeltaOutcome, StockRepository};
pub use repository::warehouse::WarehouseRepository;

/// Re-exported so callers can name connection types without a direct sqlx dependency.
pub use sqlx::SqliteConnection;
