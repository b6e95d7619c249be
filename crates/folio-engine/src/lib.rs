//! # folio-engine: Transactional Workflows for Folio POS
//!
//! Every operation that moves stock, cash or invoice numbers runs here as
//! one database transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Folio POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (register UI, back office, jobs)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Actor { user_id, role }                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ folio-engine (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  Engine ─┬─ ledger()     StockLedger                            │   │
//! │  │          ├─ sales()      SaleTransactionService                 │   │
//! │  │          ├─ cash()       CashSessionManager                     │   │
//! │  │          ├─ returns()    ReturnWorkflow                         │   │
//! │  │          ├─ receiving()  PurchaseReceivingWorkflow              │   │
//! │  │          └─ catalog()    master data and settings               │   │
//! │  │                                                                 │   │
//! │  │  AuditSink (after commit) · EngineConfig · init_tracing         │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────┐  ┌────────▼──────────────────┐    │
//! │  │   folio-core                    │  │  folio-db                 │    │
//! │  │   money, pricing, cash math     │  │  SQLite, repositories     │    │
//! │  └─────────────────────────────────┘  └───────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use folio_engine::{Engine, EngineConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::load_or_default(None);
//! folio_engine::init_tracing(&config.logging.filter);
//!
//! let engine = Engine::open(&config).await?;
//! let low = engine.ledger().low_stock().await?;
//! println!("{} products need restocking", low.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::info;

use folio_db::Database;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod cash;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod receiving;
pub mod returns;
pub mod sales;
pub mod telemetry;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use cash::CashSessionManager;
pub use catalog::Catalog;
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorBody, ErrorCode};
pub use ledger::{
    InventoryCount, NewStockBatch, StockAdjustment, StockLedger, StockTransfer, StockTransferDetail, TransferLine,
};
pub use receiving::{
    NewPurchase, NewPurchaseOrder, PurchaseDetail, PurchaseLine, PurchaseOrderDetail, PurchaseReceivingWorkflow,
    ReceiveLine, ReceivingResult,
};
pub use returns::{ReturnReceipt, ReturnWorkflow};
pub use sales::{SaleLine, SaleReceipt, SaleRequest, SaleTransactionService};
pub use telemetry::init_tracing;

// =============================================================================
// Engine
// =============================================================================

/// Entry point holding the pool and the audit sink. Workflow handles are
/// cheap borrows; create them per call. Clones share the pool.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    /// Opens the configured database (running migrations) with the tracing
    /// audit sink.
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = ?config.database.path, "Engine ready");
        Ok(Engine::new(db, Arc::new(TracingAuditSink)))
    }

    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        Engine { db, audit }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn ledger(&self) -> StockLedger<'_> {
        StockLedger::new(&self.db, self.audit.as_ref())
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.db)
    }

    pub fn sales(&self) -> SaleTransactionService<'_> {
        SaleTransactionService::new(&self.db, self.audit.as_ref())
    }

    pub fn cash(&self) -> CashSessionManager<'_> {
        CashSessionManager::new(&self.db, self.audit.as_ref())
    }

    pub fn returns(&self) -> ReturnWorkflow<'_> {
        ReturnWorkflow::new(&self.db, self.audit.as_ref())
    }

    pub fn receiving(&self) -> PurchaseReceivingWorkflow<'_> {
        PurchaseReceivingWorkflow::new(&self.db, self.audit.as_ref())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
