//! # Settings Repository
//!
//! The single `system_settings` row: tax policy, payment methods, invoice
//! counter and default warehouse.
//!
//! ## Invoice Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE system_settings SET invoice_next = invoice_next + 1            │
//! │  RETURNING invoice_prefix, invoice_next - 1                             │
//! │                                                                         │
//! │  One statement, inside the sale transaction:                           │
//! │  • the row write lock serializes concurrent sales                      │
//! │  • a rollback returns the number, so the sequence has no gaps          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use folio_core::{format_invoice_number, SystemSettings, TaxRate};

/// Repository for the settings row.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsRepository;

impl SettingsRepository {
    /// Loads the settings row.
    pub async fn get(&self, conn: &mut SqliteConnection) -> DbResult<SystemSettings> {
        let settings = sqlx::query_as::<_, SystemSettings>(
            r#"
            SELECT
                project_name,
                currency,
                tax_rate,
                tax_included,
                payment_methods,
                invoice_prefix,
                invoice_next,
                default_warehouse_id
            FROM system_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;

        settings.ok_or_else(|| DbError::not_found("Settings", 1))
    }

    /// Draws the next invoice number and advances the counter.
    pub async fn allocate_invoice_number(&self, conn: &mut SqliteConnection) -> DbResult<String> {
        let (prefix, number): (String, i64) = sqlx::query_as(
            r#"
            UPDATE system_settings
            SET invoice_next = invoice_next + 1
            WHERE id = 1
            RETURNING invoice_prefix, invoice_next - 1
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        let invoice = format_invoice_number(&prefix, number);
        debug!(invoice = %invoice, "Allocated invoice number");
        Ok(invoice)
    }

    pub async fn set_default_warehouse(
        &self,
        conn: &mut SqliteConnection,
        warehouse_id: i64,
    ) -> DbResult<()> {
        debug!(warehouse_id, "Setting default warehouse");

        sqlx::query("UPDATE system_settings SET default_warehouse_id = ?1 WHERE id = 1")
            .bind(warehouse_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn set_tax_policy(
        &self,
        conn: &mut SqliteConnection,
        rate: TaxRate,
        included: bool,
    ) -> DbResult<()> {
        debug!(rate = %rate, included, "Setting tax policy");

        sqlx::query("UPDATE system_settings SET tax_rate = ?1, tax_included = ?2 WHERE id = 1")
            .bind(rate)
            .bind(included)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Replaces the accepted payment methods (comma-separated codes).
    pub async fn set_payment_methods(
        &self,
        conn: &mut SqliteConnection,
        methods: &str,
    ) -> DbResult<()> {
        sqlx::query("UPDATE system_settings SET payment_methods = ?1 WHERE id = 1")
            .bind(methods.to_uppercase())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn set_invoice_prefix(&self, conn: &mut SqliteConnection, prefix: &str) -> DbResult<()> {
        sqlx::query("UPDATE system_settings SET invoice_prefix = ?1 WHERE id = 1")
            .bind(prefix)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
