//! # Engine Error Type
//!
//! Unified error type returned by every workflow.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Folio POS                              │
//! │                                                                         │
//! │  Embedding layer (HTTP, desktop, CLI)      folio-engine                 │
//! │  ────────────────────────────────────      ────────────                 │
//! │                                                                         │
//! │  engine.sales().create_sale(..)                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Workflow                                                        │  │
//! │  │  EngineResult<T>                                                 │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed("...") ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Business Error? ─── CoreError::InsufficientStock ─ EngineError ►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  err.status_code()  → 409                                               │
//! │  err.body()         → { "code": "INSUFFICIENT_STOCK", "message": .. }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error returned from inside a workflow drops the open transaction,
//! so nothing the workflow wrote survives.

use serde::Serialize;
use thiserror::Error;

use folio_core::{CoreError, ErrorKind};
use folio_db::DbError;

/// Result type alias for workflows.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned from engine workflows.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule or input validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Database(#[from] DbError),
}

impl EngineError {
    /// Status family of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(err) => err.kind(),
            EngineError::Database(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } | DbError::CheckViolation { .. } => ErrorKind::Conflict,
                DbError::ForeignKeyViolation { .. } => ErrorKind::Validation,
                _ => ErrorKind::Internal,
            },
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(err) => match err {
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InsufficientPayment { .. } | CoreError::PaymentMismatch { .. } => {
                    ErrorCode::PaymentError
                }
                CoreError::CashSessionRequired
                | CoreError::SessionAlreadyOpen
                | CoreError::NoOpenSession
                | CoreError::ZAuditRequired => ErrorCode::CashSession,
                CoreError::AlreadyVoided(_) => ErrorCode::Conflict,
                CoreError::DefaultWarehouseMissing => ErrorCode::ConfigurationError,
                CoreError::Validation(_) => ErrorCode::ValidationError,
                _ => ErrorCode::NotFound,
            },
            EngineError::Database(err) => match err {
                DbError::NotFound { .. } => ErrorCode::NotFound,
                DbError::UniqueViolation { .. } | DbError::CheckViolation { .. } => ErrorCode::Conflict,
                DbError::ForeignKeyViolation { .. } => ErrorCode::ValidationError,
                _ => ErrorCode::DatabaseError,
            },
        }
    }

    /// Serializable body for the embedding layer.
    ///
    /// Storage faults are logged here and replaced by a generic message.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            EngineError::Core(err) => err.to_string(),
            EngineError::Database(err) => match err {
                DbError::NotFound { .. } => err.to_string(),
                DbError::UniqueViolation { field } => format!("{} already exists", field),
                DbError::ForeignKeyViolation { message } => {
                    tracing::error!("Foreign key violation: {}", message);
                    "Invalid reference".to_string()
                }
                DbError::CheckViolation { message } => {
                    tracing::error!("Constraint violation: {}", message);
                    "Operation violates a store constraint".to_string()
                }
                DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                    tracing::error!("Database unavailable: {}", err);
                    "Database unavailable".to_string()
                }
                _ => {
                    tracing::error!("Database operation failed: {}", err);
                    "Database operation failed".to_string()
                }
            },
        };

        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

/// Error codes carried in [`ErrorBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// State forbids the operation (409)
    Conflict,

    /// Stock would go negative (409)
    InsufficientStock,

    /// Tender does not cover or match the total (409)
    PaymentError,

    /// Cash drawer state forbids the operation (409)
    CashSession,

    /// Store is missing required settings (500)
    ConfigurationError,

    /// Storage failure (500)
    DatabaseError,
}

/// What the embedding layer sends back to its caller.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for product 7 in warehouse 1: available 3, requested 5"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

/// Shorthand for `Err(CoreError::..)?` inside workflows.
pub(crate) fn fail<T>(err: CoreError) -> EngineResult<T> {
    Err(EngineError::Core(err))
}

// =============================================================================
// Unit Tests
// =============================================================================
