//! Fixtures shared by the workflow tests.

use std::sync::Arc;

use folio_core::{Actor, Money, NewProduct, Product, Role, StockMovement, StockMovementType, MANUAL_REFERENCE};
use folio_db::{Database, DbConfig, DeltaOutcome};
use tempfile::TempDir;

use crate::{Engine, MemoryAuditSink};

/// An engine on a fresh in-memory database with a "Main" warehouse.
pub struct Fixture {
    pub engine: Engine,
    pub audit: Arc<MemoryAuditSink>,
    /// "Main"; the default warehouse unless built with
    /// [`Fixture::without_default_warehouse`].
    pub warehouse_id: i64,
    /// Holds the database file of [`Fixture::on_disk`].
    _dir: Option<TempDir>,
}

impl Fixture {
    pub async fn new() -> Self {
        let fx = Self::without_default_warehouse().await;
        fx.engine.catalog().set_default_warehouse(fx.warehouse_id).await.unwrap();
        fx
    }

    pub async fn without_default_warehouse() -> Self {
        Self::with_database(Database::in_memory().await.unwrap(), None).await
    }

    /// A file-backed WAL database with a multi-connection pool, for tests
    /// that run workflows concurrently.
    pub async fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let config = DbConfig::new(dir.path().join("folio.db")).max_connections(8);
        let fx = Self::with_database(Database::new(config).await.unwrap(), Some(dir)).await;
        fx.engine.catalog().set_default_warehouse(fx.warehouse_id).await.unwrap();
        fx
    }

    async fn with_database(db: Database, dir: Option<TempDir>) -> Self {
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = Engine::new(db, audit.clone());
        let warehouse_id = engine.catalog().create_warehouse("Main", None).await.unwrap().id;

        Fixture {
            engine,
            audit,
            warehouse_id,
            _dir: dir,
        }
    }

    pub fn cashier(&self) -> Actor {
        Actor::new(10, Role::Cashier)
    }

    pub fn manager(&self) -> Actor {
        Actor::new(20, Role::Manager)
    }

    pub fn stock_clerk(&self) -> Actor {
        Actor::new(30, Role::Stock)
    }

    pub fn admin(&self) -> Actor {
        Actor::new(1, Role::Admin)
    }

    pub async fn warehouse(&self, name: &str) -> i64 {
        self.engine.catalog().create_warehouse(name, None).await.unwrap().id
    }

    pub async fn product_unstocked(&self, sku: &str, price: i64) -> Product {
        self.engine
            .catalog()
            .create_product(&NewProduct::new(sku, format!("Product {}", sku), Money::from_major(price)))
            .await
            .unwrap()
    }

    /// A product holding `qty` units in the fixture warehouse. Seeded below
    /// the workflows so no audit event is recorded.
    pub async fn product(&self, sku: &str, price: i64, qty: i64) -> Product {
        let product = self.product_unstocked(sku, price).await;
        if qty == 0 {
            return product;
        }

        let db = self.engine.db();
        let mut tx = db.begin().await.unwrap();
        let outcome = db.stock().apply_delta(&mut tx, product.id, self.warehouse_id, qty).await.unwrap();
        assert!(matches!(outcome, DeltaOutcome::Applied { .. }));
        db.stock()
            .record_movement(&mut tx, product.id, self.warehouse_id, StockMovementType::In, qty, MANUAL_REFERENCE)
            .await
            .unwrap();
        db.commit(tx).await.unwrap();

        self.engine.catalog().get_product(product.id).await.unwrap()
    }

    pub async fn open_session(&self, actor: Actor, opening: i64) {
        self.engine.cash().open(actor, Money::from_major(opening)).await.unwrap();
    }

    pub async fn product_stock(&self, product_id: i64) -> i64 {
        self.engine.catalog().get_product(product_id).await.unwrap().stock
    }

    pub async fn movement_count(&self) -> i64 {
        let mut conn = self.engine.db().acquire().await.unwrap();
        self.engine.db().stock().count_movements(&mut conn).await.unwrap()
    }

    pub async fn movements_by_reference(&self, reference: &str) -> Vec<StockMovement> {
        let mut conn = self.engine.db().acquire().await.unwrap();
        self.engine.db().stock().movements_by_reference(&mut conn, reference).await.unwrap()
    }

    pub async fn sale_count(&self) -> i64 {
        let mut conn = self.engine.db().acquire().await.unwrap();
        self.engine.db().sales().count(&mut conn).await.unwrap()
    }

    pub async fn purchase_count(&self) -> i64 {
        let mut conn = self.engine.db().acquire().await.unwrap();
        self.engine.db().purchasing().count_purchases(&mut conn).await.unwrap()
    }
}

/// `Product.stock == Σ levels` and no negative level, for every product.
pub async fn assert_stock_invariants(engine: &Engine) {
    let db = engine.db();
    let mut conn = db.acquire().await.unwrap();

    for product in db.products().list(&mut conn, 10_000).await.unwrap() {
        let levels = db.stock().levels(&mut conn, product.id).await.unwrap();
        let sum: i64 = levels.iter().map(|l| l.qty).sum();

        assert_eq!(product.stock, sum, "stock cache drifted for product {}", product.id);
        assert!(levels.iter().all(|l| l.qty >= 0), "negative level for product {}", product.id);
    }
}
