//! # Cash Repository
//!
//! Cash sessions, manual cash movements and reconciliation audits.
//!
//! ## Storage Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cash_sessions   UNIQUE (user_id) WHERE is_open = 1                    │
//! │                  → a racing second open fails with UniqueViolation     │
//! │                                                                         │
//! │  cash_movements  append-only (triggers)                                │
//! │  cash_audits     append-only (triggers)                                │
//! │                                                                         │
//! │  close_session   UPDATE ... WHERE id = ? AND is_open = 1               │
//! │                  → closes exactly once                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::cash::{AuditType, CashAudit, CashMovement, CashMovementType, CashSession};
use folio_core::Money;

/// Values of a new audit row.
#[derive(Debug, Clone, Copy)]
pub struct NewCashAudit {
    pub session_id: i64,
    pub kind: AuditType,
    pub expected_amount: Money,
    pub counted_amount: Money,
    pub created_by: i64,
}

/// Repository for the cash drawer tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CashRepository;

impl CashRepository {
    // =========================================================================
    // Sessions
    // =========================================================================

    /// Opens a session. A second open session for the same user violates the
    /// partial unique index.
    pub async fn open_session(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        opening_amount: Money,
    ) -> DbResult<CashSession> {
        debug!(user_id, opening_amount = %opening_amount, "Opening cash session");

        let session = sqlx::query_as::<_, CashSession>(
            r#"
            INSERT INTO cash_sessions (user_id, opening_amount, opened_at, closed_at, is_open)
            VALUES (?1, ?2, ?3, NULL, 1)
            RETURNING id, user_id, opening_amount, opened_at, closed_at, is_open
            "#,
        )
        .bind(user_id)
        .bind(opening_amount)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(session)
    }

    /// The user's open session, if any.
    pub async fn open_session_for(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT id, user_id, opening_amount, opened_at, closed_at, is_open
            FROM cash_sessions
            WHERE user_id = ?1 AND is_open = 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    pub async fn get_session(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT id, user_id, opening_amount, opened_at, closed_at, is_open
            FROM cash_sessions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Closes an open session. Returns `false` if it was not open.
    pub async fn close_session(&self, conn: &mut SqliteConnection, session_id: i64) -> DbResult<bool> {
        debug!(session_id, "Closing cash session");

        let result = sqlx::query(
            "UPDATE cash_sessions SET is_open = 0, closed_at = ?2 WHERE id = ?1 AND is_open = 1",
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Closes every open session of a user. Returns how many were closed.
    pub async fn force_close(&self, conn: &mut SqliteConnection, user_id: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE cash_sessions SET is_open = 0, closed_at = ?2 WHERE user_id = ?1 AND is_open = 1",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Movements
    // =========================================================================

    pub async fn insert_movement(
        &self,
        conn: &mut SqliteConnection,
        session_id: i64,
        kind: CashMovementType,
        amount: Money,
        reason: &str,
    ) -> DbResult<CashMovement> {
        let movement = sqlx::query_as::<_, CashMovement>(
            r#"
            INSERT INTO cash_movements (session_id, kind, amount, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, session_id, kind, amount, reason, created_at
            "#,
        )
        .bind(session_id)
        .bind(kind)
        .bind(amount)
        .bind(reason.trim())
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(movement)
    }

    /// Movements of a session, oldest first.
    pub async fn movements(&self, conn: &mut SqliteConnection, session_id: i64) -> DbResult<Vec<CashMovement>> {
        let movements = sqlx::query_as::<_, CashMovement>(
            r#"
            SELECT id, session_id, kind, amount, reason, created_at
            FROM cash_movements
            WHERE session_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    /// `(Σ IN, Σ OUT)` for a session.
    pub async fn movement_totals(&self, conn: &mut SqliteConnection, session_id: i64) -> DbResult<(Money, Money)> {
        let totals: (Money, Money) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'IN' THEN amount END), 0.0),
                COALESCE(SUM(CASE WHEN kind = 'OUT' THEN amount END), 0.0)
            FROM cash_movements
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(totals)
    }

    /// Σ CASH payments on non-void sales by `user_id` created in `[from, to]`.
    pub async fn cash_sales_total(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        let total: Money = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount), 0.0)
            FROM payments p
            JOIN sales s ON s.id = p.sale_id
            WHERE s.user_id = ?1
              AND s.status <> 'VOID'
              AND p.method = 'CASH'
              AND s.created_at >= ?2
              AND s.created_at <= ?3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    // =========================================================================
    // Audits
    // =========================================================================

    pub async fn insert_audit(&self, conn: &mut SqliteConnection, audit: &NewCashAudit) -> DbResult<CashAudit> {
        let difference = audit.counted_amount - audit.expected_amount;

        let audit = sqlx::query_as::<_, CashAudit>(
            r#"
            INSERT INTO cash_audits (
                session_id, kind, expected_amount, counted_amount, difference, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, session_id, kind, expected_amount, counted_amount, difference, created_by, created_at
            "#,
        )
        .bind(audit.session_id)
        .bind(audit.kind)
        .bind(audit.expected_amount)
        .bind(audit.counted_amount)
        .bind(difference)
        .bind(audit.created_by)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(audit)
    }

    /// Audits of a session, oldest first.
    pub async fn audits(&self, conn: &mut SqliteConnection, session_id: i64) -> DbResult<Vec<CashAudit>> {
        let audits = sqlx::query_as::<_, CashAudit>(
            r#"
            SELECT id, session_id, kind, expected_amount, counted_amount, difference, created_by, created_at
            FROM cash_audits
            WHERE session_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(audits)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing;

    #[tokio::test]
    async fn test_one_open_session_per_user() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        db.cash().open_session(&mut conn, 7, Money::from_major(100)).await.unwrap();
        let err = db.cash().open_session(&mut conn, 7, Money::from_major(50)).await.unwrap_err();
        assert!(err.is_unique_violation());

        // other users are unaffected
        db.cash().open_session(&mut conn, 8, Money::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let session = db.cash().open_session(&mut conn, 7, Money::from_major(100)).await.unwrap();
        assert!(db.cash().close_session(&mut conn, session.id).await.unwrap());
        assert!(!db.cash().close_session(&mut conn, session.id).await.unwrap());

        let closed = db.cash().get_session(&mut conn, session.id).await.unwrap().unwrap();
        assert!(!closed.is_open);
        assert!(closed.closed_at.is_some());

        db.cash().open_session(&mut conn, 7, Money::from_major(80)).await.unwrap();
        assert!(db.cash().open_session_for(&mut conn, 7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_force_close_counts_sessions() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        db.cash().open_session(&mut conn, 7, Money::ZERO).await.unwrap();
        assert_eq!(db.cash().force_close(&mut conn, 7).await.unwrap(), 1);
        assert_eq!(db.cash().force_close(&mut conn, 7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_movement_totals() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();
        let session = db.cash().open_session(&mut conn, 7, Money::from_major(100)).await.unwrap();

        assert_eq!(
            db.cash().movement_totals(&mut conn, session.id).await.unwrap(),
            (Money::ZERO, Money::ZERO)
        );

        db.cash()
            .insert_movement(&mut conn, session.id, CashMovementType::In, Money::from_major(20), "float")
            .await
            .unwrap();
        db.cash()
            .insert_movement(&mut conn, session.id, CashMovementType::Out, Money::from_cents(550), "courier")
            .await
            .unwrap();

        let (cash_in, cash_out) = db.cash().movement_totals(&mut conn, session.id).await.unwrap();
        assert_eq!(cash_in, Money::from_major(20));
        assert_eq!(cash_out, Money::from_cents(550));
        assert_eq!(db.cash().movements(&mut conn, session.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_audit_difference_and_append_only() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();
        let session = db.cash().open_session(&mut conn, 7, Money::from_major(100)).await.unwrap();

        let audit = db
            .cash()
            .insert_audit(
                &mut conn,
                &NewCashAudit {
                    session_id: session.id,
                    kind: AuditType::X,
                    expected_amount: Money::from_major(100),
                    counted_amount: Money::from_major(97),
                    created_by: 7,
                },
            )
            .await
            .unwrap();
        assert_eq!(audit.difference, Money::from_major(-3));
        assert!(!audit.is_validated());

        let delete = sqlx::query("DELETE FROM cash_audits WHERE id = ?1")
            .bind(audit.id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from);
        assert!(matches!(delete, Err(DbError::CheckViolation { .. })));
        assert_eq!(db.cash().audits(&mut conn, session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cash_sales_total_empty_window() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let now = Utc::now();
        let total = db
            .cash()
            .cash_sales_total(&mut conn, 7, now - chrono::Duration::hours(1), now)
            .await
            .unwrap();
        assert_eq!(total, Money::ZERO);
    }
}
