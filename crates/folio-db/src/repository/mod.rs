//! # Repository Module
//!
//! Database repository implementations for Folio POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Transactions                        │
//! │                                                                         │
//! │  Workflow (folio-engine)                                               │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       │  db.stock().apply_delta(&mut tx, product, warehouse, -2)       │
//! │       │  db.sales().insert_item(&mut tx, ...)                          │
//! │       │  db.commit(tx).await?;                                         │
//! │       ▼                                                                 │
//! │  Repositories are stateless. Every method takes the connection to run  │
//! │  on, so any number of them compose inside one transaction.             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SettingsRepository`](settings::SettingsRepository) - Settings row, invoice counter
//! - [`ProductRepository`](product::ProductRepository) - Products, cached stock resync
//! - [`WarehouseRepository`](warehouse::WarehouseRepository) - Warehouses
//! - [`StockRepository`](stock::StockRepository) - Levels, movements, transfers
//! - [`CatalogRepository`](catalog::CatalogRepository) - Customers, price lists, promotions
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items, payments
//! - [`ReturnRepository`](returns::ReturnRepository) - Sale returns
//! - [`CashRepository`](cash::CashRepository) - Cash sessions, movements, audits
//! - [`PurchasingRepository`](purchasing::PurchasingRepository) - Suppliers, orders, purchases

pub mod cash;
pub mod catalog;
pub mod product;
pub mod purchasing;
pub mod returns;
pub mod sale;
pub mod settings;
pub mod stock;
pub mod warehouse;
