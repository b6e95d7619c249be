//! # Catalog Repository
//!
//! Customers, price lists and promotions: the inputs the pricing resolver
//! reads during a sale.
//!
//! ```text
//! Customer ──price_list_id──► PriceList ──► PriceListItem (price_list_id, product_id) → price
//! Promotion (PERCENT | AMOUNT, is_active)
//! ```

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::{Customer, Money, PriceList, Promotion, PromotionKind};

/// Repository for customers, price lists and promotions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn insert_customer(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        price_list_id: Option<i64>,
    ) -> DbResult<Customer> {
        debug!(name = %name, ?price_list_id, "Inserting customer");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, price_list_id, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, price_list_id, created_at
            "#,
        )
        .bind(name.trim())
        .bind(price_list_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(customer)
    }

    pub async fn get_customer(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, price_list_id, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(customer)
    }

    // =========================================================================
    // Price Lists
    // =========================================================================

    pub async fn insert_price_list(&self, conn: &mut SqliteConnection, name: &str) -> DbResult<PriceList> {
        let list = sqlx::query_as::<_, PriceList>(
            "INSERT INTO price_lists (name) VALUES (?1) RETURNING id, name",
        )
        .bind(name.trim())
        .fetch_one(&mut *conn)
        .await?;

        Ok(list)
    }

    /// Sets (or replaces) the override price of a product in a list.
    pub async fn set_list_price(
        &self,
        conn: &mut SqliteConnection,
        price_list_id: i64,
        product_id: i64,
        price: Money,
    ) -> DbResult<()> {
        debug!(price_list_id, product_id, price = %price, "Setting list price");

        sqlx::query(
            r#"
            INSERT INTO price_list_items (price_list_id, product_id, price)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(price_list_id, product_id) DO UPDATE SET price = excluded.price
            "#,
        )
        .bind(price_list_id)
        .bind(product_id)
        .bind(price)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Override price for a product, if the list has one.
    pub async fn list_price(
        &self,
        conn: &mut SqliteConnection,
        price_list_id: i64,
        product_id: i64,
    ) -> DbResult<Option<Money>> {
        let price: Option<Money> = sqlx::query_scalar(
            "SELECT price FROM price_list_items WHERE price_list_id = ?1 AND product_id = ?2",
        )
        .bind(price_list_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(price)
    }

    // =========================================================================
    // Promotions
    // =========================================================================

    pub async fn insert_promotion(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        kind: PromotionKind,
        value: Decimal,
        is_active: bool,
    ) -> DbResult<Promotion> {
        debug!(name = %name, ?kind, %value, "Inserting promotion");

        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            INSERT INTO promotions (name, kind, value, is_active)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, kind, value, is_active
            "#,
        )
        .bind(name.trim())
        .bind(kind)
        .bind(value.to_f64().unwrap_or(0.0))
        .bind(is_active)
        .fetch_one(&mut *conn)
        .await?;

        Ok(promotion)
    }

    pub async fn get_promotion(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(
            "SELECT id, name, kind, value, is_active FROM promotions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(promotion)
    }

    /// The promotion, only when it exists and is active.
    pub async fn active_promotion(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Promotion>> {
        Ok(self.get_promotion(conn, id).await?.filter(|p| p.is_active))
    }

    pub async fn set_promotion_active(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        is_active: bool,
    ) -> DbResult<()> {
        sqlx::query("UPDATE promotions SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(is_active)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
