//! # Warehouse Repository

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use folio_core::Warehouse;

/// Repository for warehouses.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarehouseRepository;

impl WarehouseRepository {
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        location: Option<&str>,
    ) -> DbResult<Warehouse> {
        debug!(name = %name, "Inserting warehouse");

        let warehouse = sqlx::query_as::<_, Warehouse>(
            r#"
            INSERT INTO warehouses (name, location, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, location, created_at
            "#,
        )
        .bind(name.trim())
        .bind(location)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(warehouse)
    }

    pub async fn get_by_id(&self, conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, location, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(warehouse)
    }

    pub async fn get_by_name(&self, conn: &mut SqliteConnection, name: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, location, created_at FROM warehouses WHERE name = ?1",
        )
        .bind(name.trim())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(warehouse)
    }

    pub async fn list(&self, conn: &mut SqliteConnection) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, location, created_at FROM warehouses ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(warehouses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn test_insert_get_list() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        let main = db.warehouses().insert(&mut conn, "Main", Some("Front store")).await.unwrap();
        db.warehouses().insert(&mut conn, "Back", None).await.unwrap();

        let fetched = db.warehouses().get_by_id(&mut conn, main.id).await.unwrap().unwrap();
        assert_eq!(fetched.location.as_deref(), Some("Front store"));
        assert!(db.warehouses().get_by_name(&mut conn, "Back").await.unwrap().is_some());
        assert_eq!(db.warehouses().list(&mut conn).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = testing::db().await;
        let mut conn = db.acquire().await.unwrap();

        db.warehouses().insert(&mut conn, "Main", None).await.unwrap();
        let err = db.warehouses().insert(&mut conn, "Main", None).await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
