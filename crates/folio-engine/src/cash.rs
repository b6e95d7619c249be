//! # Cash Session Manager
//!
//! Drawer lifecycle and reconciliation for one operator at a time.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   CLOSED ──open(amount)──► OPEN ──audit(Z, counted)──► CLOSED          │
//! │                             │  ▲                                        │
//! │                             │  └── record_movement(IN/OUT)             │
//! │                             │  └── audit(X, counted)  (stays open)     │
//! │                             │                                           │
//! │                             ├── close()        ──► ZAuditRequired      │
//! │                             └── force_close()  ──► CLOSED (no audit)   │
//! │                                                                         │
//! │   expected = opening + Σ IN − Σ OUT + Σ CASH payments of non-void      │
//! │              sales by the operator within [opened_at, closed_at|now]   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One open session per user is enforced by a partial unique index; the
//! application check before insert only produces the friendlier error.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use folio_core::cash::{AuditType, CashAudit, CashMovement, CashMovementType, CashSession, CashSessionReport, CashSummary};
use folio_core::validation::validate_positive_amount;
use folio_core::{Actor, CoreError, Money, ValidationError};
use folio_db::{Database, NewCashAudit, SqliteConnection};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{fail, EngineResult};

pub struct CashSessionManager<'a> {
    db: &'a Database,
    audit: &'a dyn AuditSink,
}

impl<'a> CashSessionManager<'a> {
    pub fn new(db: &'a Database, audit: &'a dyn AuditSink) -> Self {
        CashSessionManager { db, audit }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn open(&self, actor: Actor, opening_amount: Money) -> EngineResult<CashSession> {
        if opening_amount.is_negative() {
            return fail(ValidationError::must_not_be_negative("opening_amount").into());
        }

        let mut tx = self.db.begin().await?;

        if self.db.cash().open_session_for(&mut tx, actor.user_id).await?.is_some() {
            warn!(user_id = actor.user_id, "Cash session already open");
            return fail(CoreError::SessionAlreadyOpen);
        }

        let session = match self.db.cash().open_session(&mut tx, actor.user_id, opening_amount).await {
            Ok(session) => session,
            Err(e) if e.is_unique_violation() => return fail(CoreError::SessionAlreadyOpen),
            Err(e) => return Err(e.into()),
        };

        self.db.commit(tx).await?;

        info!(session_id = session.id, user_id = actor.user_id, opening_amount = %opening_amount, "Cash session opened");
        self.audit.record(AuditEvent::new(
            actor,
            "cash_open",
            "cash_session",
            session.id,
            json!({ "opening_amount": opening_amount.rounded() }),
        ));

        Ok(session)
    }

    /// Appends a manual IN / OUT to the operator's open session.
    pub async fn record_movement(
        &self,
        actor: Actor,
        kind: CashMovementType,
        amount: Money,
        reason: &str,
    ) -> EngineResult<CashMovement> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        let mut tx = self.db.begin().await?;
        let session = self.require_open(&mut tx, actor.user_id).await?;

        let movement = self
            .db
            .cash()
            .insert_movement(&mut tx, session.id, kind, amount, reason.trim())
            .await?;

        self.db.commit(tx).await?;

        info!(session_id = session.id, movement_id = movement.id, ?kind, amount = %amount, "Cash movement recorded");
        self.audit.record(AuditEvent::new(
            actor,
            "cash_movement",
            "cash_session",
            session.id,
            json!({
                "movement_id": movement.id,
                "kind": kind,
                "amount": amount.rounded(),
                "reason": movement.reason,
            }),
        ));

        Ok(movement)
    }

    /// Persists an X or Z reconciliation against the live summary. A Z
    /// audit closes the session in the same transaction.
    pub async fn audit(&self, actor: Actor, kind: AuditType, counted_amount: Money) -> EngineResult<CashAudit> {
        if counted_amount.is_negative() {
            return fail(ValidationError::must_not_be_negative("counted_amount").into());
        }

        let mut tx = self.db.begin().await?;
        let session = self.require_open(&mut tx, actor.user_id).await?;
        let summary = self.compute_summary(&mut tx, &session).await?;

        let audit = self
            .db
            .cash()
            .insert_audit(
                &mut tx,
                &NewCashAudit {
                    session_id: session.id,
                    kind,
                    expected_amount: summary.expected_amount,
                    counted_amount,
                    created_by: actor.user_id,
                },
            )
            .await?;

        if kind.closes_session() {
            self.db.cash().close_session(&mut tx, session.id).await?;
        }

        self.db.commit(tx).await?;

        info!(
            session_id = session.id,
            audit_id = audit.id,
            ?kind,
            expected = %audit.expected_amount,
            counted = %audit.counted_amount,
            difference = %audit.difference,
            "Cash audit recorded"
        );
        self.audit.record(AuditEvent::new(
            actor,
            "cash_audit",
            "cash_session",
            session.id,
            json!({
                "audit_id": audit.id,
                "kind": kind,
                "expected_amount": audit.expected_amount.rounded(),
                "counted_amount": audit.counted_amount.rounded(),
                "difference": audit.difference.rounded(),
                "closed": kind.closes_session(),
            }),
        ));

        Ok(audit)
    }

    /// Plain close. Always rejected: an open session closes only through a
    /// Z audit.
    pub async fn close(&self, user_id: i64) -> EngineResult<()> {
        let mut conn = self.db.acquire().await?;
        match self.db.cash().open_session_for(&mut conn, user_id).await? {
            Some(session) => {
                warn!(session_id = session.id, user_id, "Close rejected: Z audit required");
                fail(CoreError::ZAuditRequired)
            }
            None => fail(CoreError::NoOpenSession),
        }
    }

    /// Closes every open session of `user_id` without an audit. Returns how
    /// many were closed.
    pub async fn force_close(&self, actor: Actor, user_id: i64) -> EngineResult<u64> {
        let mut tx = self.db.begin().await?;
        let closed = self.db.cash().force_close(&mut tx, user_id).await?;
        self.db.commit(tx).await?;

        warn!(user_id, closed, by = actor.user_id, "Cash sessions force-closed");
        self.audit.record(AuditEvent::new(
            actor,
            "cash_force_close",
            "user",
            user_id,
            json!({ "closed_sessions": closed }),
        ));

        Ok(closed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn current_session(&self, user_id: i64) -> EngineResult<Option<CashSession>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.cash().open_session_for(&mut conn, user_id).await?)
    }

    /// Summary of the user's open session.
    pub async fn current_summary(&self, user_id: i64) -> EngineResult<CashSummary> {
        let mut conn = self.db.acquire().await?;
        let session = self.require_open(&mut conn, user_id).await?;
        self.compute_summary(&mut conn, &session).await
    }

    pub async fn summary(&self, session_id: i64) -> EngineResult<CashSummary> {
        let mut conn = self.db.acquire().await?;
        let session = self.require_session(&mut conn, session_id).await?;
        self.compute_summary(&mut conn, &session).await
    }

    /// Read-only reconciliation document for a session.
    pub async fn session_report(&self, session_id: i64) -> EngineResult<CashSessionReport> {
        let mut conn = self.db.acquire().await?;
        let session = self.require_session(&mut conn, session_id).await?;
        let summary = self.compute_summary(&mut conn, &session).await?;
        let movements = self.db.cash().movements(&mut conn, session_id).await?;
        let audits = self.db.cash().audits(&mut conn, session_id).await?;

        Ok(CashSessionReport::build(session, summary, movements, audits, Utc::now()))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn compute_summary(&self, conn: &mut SqliteConnection, session: &CashSession) -> EngineResult<CashSummary> {
        let (movements_in, movements_out) = self.db.cash().movement_totals(conn, session.id).await?;
        let sales_cash = self
            .db
            .cash()
            .cash_sales_total(conn, session.user_id, session.opened_at, session.period_end(Utc::now()))
            .await?;

        Ok(CashSummary::new(session.opening_amount, movements_in, movements_out, sales_cash))
    }

    async fn require_open(&self, conn: &mut SqliteConnection, user_id: i64) -> EngineResult<CashSession> {
        match self.db.cash().open_session_for(conn, user_id).await? {
            Some(session) => Ok(session),
            None => fail(CoreError::NoOpenSession),
        }
    }

    async fn require_session(&self, conn: &mut SqliteConnection, session_id: i64) -> EngineResult<CashSession> {
        match self.db.cash().get_session(conn, session_id).await? {
            Some(session) => Ok(session),
            None => fail(CoreError::CashSessionNotFound(session_id)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
