//! # Catalog
//!
//! Master data the workflows read: products, warehouses, price lists,
//! customers, promotions, suppliers and the settings row.
//!
//! Products are created with zero stock; initial stock goes through the
//! [`StockLedger`](crate::ledger::StockLedger).

use rust_decimal::Decimal;
use tracing::info;

use folio_core::validation::{validate_name, validate_price, validate_promotion_value, validate_sku, validate_tax_rate};
use folio_core::{
    CoreError, Customer, Money, NewProduct, PriceList, Product, Promotion, PromotionKind, Supplier, SystemSettings,
    TaxRate, Warehouse,
};
use folio_db::Database;

use crate::error::{fail, EngineResult};

pub struct Catalog<'a> {
    db: &'a Database,
}

impl<'a> Catalog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Catalog { db }
    }

    // =========================================================================
    // Products & Warehouses
    // =========================================================================

    pub async fn create_product(&self, product: &NewProduct) -> EngineResult<Product> {
        validate_sku(&product.sku).map_err(CoreError::from)?;
        validate_name("name", &product.name).map_err(CoreError::from)?;
        validate_price("price", product.price).map_err(CoreError::from)?;
        validate_price("cost", product.cost).map_err(CoreError::from)?;
        validate_tax_rate(product.tax_rate).map_err(CoreError::from)?;

        let mut conn = self.db.acquire().await?;
        let created = self.db.products().insert(&mut conn, product).await?;

        info!(product_id = created.id, sku = %created.sku, "Product created");
        Ok(created)
    }

    pub async fn get_product(&self, id: i64) -> EngineResult<Product> {
        let mut conn = self.db.acquire().await?;
        match self.db.products().get_by_id(&mut conn, id).await? {
            Some(product) => Ok(product),
            None => fail(CoreError::ProductNotFound(id)),
        }
    }

    pub async fn find_product(&self, sku: &str) -> EngineResult<Option<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.products().get_by_sku(&mut conn, sku).await?)
    }

    pub async fn product_count(&self) -> EngineResult<i64> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.products().count(&mut conn).await?)
    }

    pub async fn create_warehouse(&self, name: &str, location: Option<&str>) -> EngineResult<Warehouse> {
        validate_name("name", name).map_err(CoreError::from)?;

        let mut conn = self.db.acquire().await?;
        let warehouse = self.db.warehouses().insert(&mut conn, name, location).await?;

        info!(warehouse_id = warehouse.id, name = %warehouse.name, "Warehouse created");
        Ok(warehouse)
    }

    pub async fn warehouses(&self) -> EngineResult<Vec<Warehouse>> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.warehouses().list(&mut conn).await?)
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    pub async fn create_price_list(&self, name: &str) -> EngineResult<PriceList> {
        validate_name("name", name).map_err(CoreError::from)?;
        let mut conn = self.db.acquire().await?;
        Ok(self.db.catalog().insert_price_list(&mut conn, name).await?)
    }

    /// Sets (or replaces) a product's price on a list.
    pub async fn set_list_price(&self, price_list_id: i64, product_id: i64, price: Money) -> EngineResult<()> {
        validate_price("price", price).map_err(CoreError::from)?;

        let mut conn = self.db.acquire().await?;
        if self.db.products().get_by_id(&mut conn, product_id).await?.is_none() {
            return fail(CoreError::ProductNotFound(product_id));
        }
        self.db.catalog().set_list_price(&mut conn, price_list_id, product_id, price).await?;
        Ok(())
    }

    pub async fn create_customer(&self, name: &str, price_list_id: Option<i64>) -> EngineResult<Customer> {
        validate_name("name", name).map_err(CoreError::from)?;
        let mut conn = self.db.acquire().await?;
        Ok(self.db.catalog().insert_customer(&mut conn, name, price_list_id).await?)
    }

    pub async fn create_promotion(
        &self,
        name: &str,
        kind: PromotionKind,
        value: Decimal,
        is_active: bool,
    ) -> EngineResult<Promotion> {
        validate_name("name", name).map_err(CoreError::from)?;
        validate_promotion_value(kind, value).map_err(CoreError::from)?;

        let mut conn = self.db.acquire().await?;
        Ok(self.db.catalog().insert_promotion(&mut conn, name, kind, value, is_active).await?)
    }

    pub async fn set_promotion_active(&self, id: i64, is_active: bool) -> EngineResult<()> {
        let mut conn = self.db.acquire().await?;
        if self.db.catalog().get_promotion(&mut conn, id).await?.is_none() {
            return fail(CoreError::PromotionNotFound(id));
        }
        self.db.catalog().set_promotion_active(&mut conn, id, is_active).await?;
        Ok(())
    }

    pub async fn create_supplier(&self, name: &str) -> EngineResult<Supplier> {
        validate_name("name", name).map_err(CoreError::from)?;
        let mut conn = self.db.acquire().await?;
        Ok(self.db.purchasing().insert_supplier(&mut conn, name).await?)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn settings(&self) -> EngineResult<SystemSettings> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.settings().get(&mut conn).await?)
    }

    pub async fn set_default_warehouse(&self, warehouse_id: i64) -> EngineResult<()> {
        let mut conn = self.db.acquire().await?;
        if self.db.warehouses().get_by_id(&mut conn, warehouse_id).await?.is_none() {
            return fail(CoreError::WarehouseNotFound(warehouse_id));
        }
        self.db.settings().set_default_warehouse(&mut conn, warehouse_id).await?;
        Ok(())
    }

    pub async fn set_tax_policy(&self, rate: TaxRate, included: bool) -> EngineResult<()> {
        validate_tax_rate(rate).map_err(CoreError::from)?;
        let mut conn = self.db.acquire().await?;
        self.db.settings().set_tax_policy(&mut conn, rate, included).await?;
        Ok(())
    }

    /// Replaces the accepted payment methods (comma separated codes).
    pub async fn set_payment_methods(&self, methods: &[&str]) -> EngineResult<()> {
        let codes: Vec<&str> = methods.iter().map(|m| m.trim()).filter(|m| !m.is_empty()).collect();
        if codes.is_empty() {
            return fail(folio_core::ValidationError::empty("payment_methods").into());
        }
        let mut conn = self.db.acquire().await?;
        self.db.settings().set_payment_methods(&mut conn, &codes.join(",")).await?;
        Ok(())
    }
}
