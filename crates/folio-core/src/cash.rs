//! # Cash Drawer Reconciliation
//!
//! Types and pure math for cash sessions, movements and audits.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Closed ──open(amount)──► Open ──audit(Z, counted)──► Closed          │
//! │                             │  ▲                                        │
//! │                 movement IN/OUT│  audit(X, counted)  (interim, stays open)
//! │                             ▼  │                                        │
//! │                             Open                                        │
//! │                                                                         │
//! │   close() without a Z audit ──► ZAuditRequired (session stays open)    │
//! │   force_close(user)        ──► Closed, no audit (recovery only)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Expected Amount
//! ```text
//! expected = opening_amount
//!          + Σ movements IN
//!          − Σ movements OUT
//!          + Σ CASH payments on non-void sales by the session's user
//!              created between opened_at and (closed_at | now)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, MONEY_TOLERANCE};

// =============================================================================
// Enums
// =============================================================================

/// Direction of a manual cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum CashMovementType {
    In,
    Out,
}

/// Reconciliation snapshot type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditType {
    /// Interim count; the session stays open.
    X,
    /// Closing count; the only way to close a session.
    Z,
}

impl AuditType {
    pub fn closes_session(&self) -> bool {
        matches!(self, AuditType::Z)
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A cashier's drawer. At most one open per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashSession {
    pub id: i64,
    pub user_id: i64,
    pub opening_amount: Money,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_open: bool,
}

impl CashSession {
    /// End of the accounting window: `closed_at`, or `now` while open.
    pub fn period_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.closed_at.unwrap_or(now)
    }
}

/// Manual cash in/out. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashMovement {
    pub id: i64,
    pub session_id: i64,
    pub kind: CashMovementType,
    pub amount: Money,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Reconciliation snapshot. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashAudit {
    pub id: i64,
    pub session_id: i64,
    pub kind: AuditType,
    pub expected_amount: Money,
    pub counted_amount: Money,
    /// `counted − expected`
    pub difference: Money,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl CashAudit {
    pub fn is_validated(&self) -> bool {
        is_balanced_difference(self.difference)
    }
}

/// A difference within one cent counts as balanced.
pub fn is_balanced_difference(difference: Money) -> bool {
    difference.abs() <= MONEY_TOLERANCE
}

// =============================================================================
// Summary
// =============================================================================

/// Live expected-cash computation for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashSummary {
    pub opening_amount: Money,
    pub movements_in: Money,
    pub movements_out: Money,
    pub sales_cash: Money,
    pub expected_amount: Money,
}

impl CashSummary {
    /// ```rust
    /// use folio_core::cash::CashSummary;
    /// use folio_core::Money;
    ///
    /// let s = CashSummary::new(
    ///     Money::from_major(100),
    ///     Money::from_major(20),
    ///     Money::ZERO,
    ///     Money::from_major(40),
    /// );
    /// assert_eq!(s.expected_amount, Money::from_major(160));
    /// ```
    pub fn new(opening_amount: Money, movements_in: Money, movements_out: Money, sales_cash: Money) -> Self {
        CashSummary {
            opening_amount,
            movements_in,
            movements_out,
            sales_cash,
            expected_amount: opening_amount + movements_in - movements_out + sales_cash,
        }
    }

    /// `counted − expected`
    pub fn difference(&self, counted: Money) -> Money {
        counted - self.expected_amount
    }
}

// =============================================================================
// Session Report
// =============================================================================

/// An audit annotated with its balance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub audit: CashAudit,
    pub validated: bool,
}

/// Validation block of a session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportValidation {
    pub movement_count: usize,
    pub audit_count: usize,
    pub last_audit_type: Option<AuditType>,
    pub last_difference: Option<Money>,
    /// True only when the last audit is a validated Z.
    pub is_balanced: bool,
    pub notes: Vec<String>,
}

/// Read-only reconciliation document for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSessionReport {
    pub session: CashSession,
    pub summary: CashSummary,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Oldest first.
    pub movements: Vec<CashMovement>,
    /// Oldest first.
    pub audits: Vec<AuditEntry>,
    pub validation: ReportValidation,
}

impl CashSessionReport {
    /// Assembles the report. `movements` and `audits` must already be in
    /// chronological order.
    pub fn build(
        session: CashSession,
        summary: CashSummary,
        movements: Vec<CashMovement>,
        audits: Vec<CashAudit>,
        now: DateTime<Utc>,
    ) -> Self {
        let audits: Vec<AuditEntry> = audits
            .into_iter()
            .map(|audit| AuditEntry {
                validated: audit.is_validated(),
                audit,
            })
            .collect();

        let validation = validate_report(&session, &movements, &audits);

        CashSessionReport {
            period_start: session.opened_at,
            period_end: session.period_end(now),
            session,
            summary,
            movements,
            audits,
            validation,
        }
    }
}

fn validate_report(session: &CashSession, movements: &[CashMovement], audits: &[AuditEntry]) -> ReportValidation {
    let mut notes = Vec::new();

    if movements.is_empty() {
        notes.push("No manual cash movements recorded.".to_string());
    }
    if audits.is_empty() {
        notes.push("No cash audits recorded.".to_string());
    }
    if session.is_open {
        notes.push("Session is still open; this report is partial.".to_string());
    }

    let last = audits.last();
    let last_is_z = last.map(|e| e.audit.kind == AuditType::Z).unwrap_or(false);
    let is_balanced = last_is_z && last.map(|e| e.validated).unwrap_or(false);

    if is_balanced {
        notes.push("Z close validated with no difference.".to_string());
    } else if last_is_z {
        notes.push("Z close has a difference pending review.".to_string());
    }

    ReportValidation {
        movement_count: movements.len(),
        audit_count: audits.len(),
        last_audit_type: last.map(|e| e.audit.kind),
        last_difference: last.map(|e| e.audit.difference),
        is_balanced,
        notes,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
