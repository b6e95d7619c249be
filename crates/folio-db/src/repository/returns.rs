//! # Return Repository
//!
//! Sale returns and their items. One return per sale, enforced by
//! `UNIQUE(sale_id)`.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::{SaleReturn, SaleReturnItem};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnRepository;

impl ReturnRepository {
    pub async fn insert_return(
        &self,
        conn: &mut SqliteConnection,
        sale_id: i64,
        user_id: i64,
        reason: &str,
    ) -> DbResult<SaleReturn> {
        debug!(sale_id, user_id, "Inserting sale return");

        let sale_return = sqlx::query_as::<_, SaleReturn>(
            r#"
            INSERT INTO sale_returns (sale_id, user_id, reason, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, sale_id, user_id, reason, created_at
            "#,
        )
        .bind(sale_id)
        .bind(user_id)
        .bind(reason.trim())
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(sale_return)
    }

    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        return_id: i64,
        product_id: i64,
        qty: i64,
    ) -> DbResult<SaleReturnItem> {
        let item = sqlx::query_as::<_, SaleReturnItem>(
            r#"
            INSERT INTO sale_return_items (return_id, product_id, qty)
            VALUES (?1, ?2, ?3)
            RETURNING id, return_id, product_id, qty
            "#,
        )
        .bind(return_id)
        .bind(product_id)
        .bind(qty)
        .fetch_one(&mut *conn)
        .await?;

        Ok(item)
    }

    pub async fn get_by_sale(&self, conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Option<SaleReturn>> {
        let sale_return = sqlx::query_as::<_, SaleReturn>(
            "SELECT id, sale_id, user_id, reason, created_at FROM sale_returns WHERE sale_id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale_return)
    }

    pub async fn items(&self, conn: &mut SqliteConnection, return_id: i64) -> DbResult<Vec<SaleReturnItem>> {
        let items = sqlx::query_as::<_, SaleReturnItem>(
            "SELECT id, return_id, product_id, qty FROM sale_return_items WHERE return_id = ?1 ORDER BY id",
        )
        .bind(return_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::sale::NewSale;
    use crate::testing;
    use folio_core::pricing::SaleTotals;
    use folio_core::{Money, TaxRate};

    #[tokio::test]
    async fn test_one_return_per_sale() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();
        let (product, wh) = testing::product_in_warehouse(&db, &mut conn, 0).await;

        let sale = db
            .sales()
            .insert_sale(
                &mut conn,
                &NewSale {
                    invoice_number: "B001-000009".into(),
                    user_id: 1,
                    customer_id: None,
                    promotion_id: None,
                    price_list_id: None,
                    warehouse_id: wh,
                    totals: SaleTotals {
                        base_total: Money::ZERO,
                        subtotal: Money::ZERO,
                        tax: Money::ZERO,
                        discount: Money::ZERO,
                        total: Money::ZERO,
                    },
                    tax_rate: TaxRate::zero(),
                    tax_included: false,
                },
            )
            .await
            .unwrap();

        let ret = db.returns().insert_return(&mut conn, sale.id, 1, "damaged").await.unwrap();
        db.returns().insert_item(&mut conn, ret.id, product.id, 2).await.unwrap();

        let err = db.returns().insert_return(&mut conn, sale.id, 1, "again").await.unwrap_err();
        assert!(err.is_unique_violation());

        let fetched = db.returns().get_by_sale(&mut conn, sale.id).await.unwrap().unwrap();
        assert_eq!(fetched.reason, "damaged");
        assert_eq!(db.returns().items(&mut conn, ret.id).await.unwrap()[0].qty, 2);
    }
}
