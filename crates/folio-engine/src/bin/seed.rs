//! # Seed Data Generator
//!
//! Populates a database with a warehouse, products and pricing data for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p folio-engine --bin seed
//!
//! # Generate custom amount
//! cargo run -p folio-engine --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p folio-engine --bin seed -- --db ./data/folio.db
//! ```
//!
//! ## Generated Data
//! - Warehouse "Main", set as the default warehouse
//! - Products across categories, SKU `{CATEGORY}-{NAME}-{INDEX}`, with
//!   initial stock credited through the stock ledger (reference `SEED`)
//! - Price list "Wholesale" at 90% of list price for every fifth product
//! - Customer "Walk-in Wholesale" on that price list
//! - Promotion "Opening Week" (10% off, active)

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;

use folio_core::{Actor, Money, NewProduct, PromotionKind, Role, StockMovementType, TaxRate};
use folio_engine::{Engine, EngineConfig, StockAdjustment};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Sparkling Water",
            "Still Water",
            "Cola",
            "Lemon Soda",
            "Orange Juice",
            "Apple Juice",
            "Iced Tea",
            "Cold Brew",
            "Energy Drink",
            "Tonic Water",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Chips",
            "Corn Chips",
            "Pretzels",
            "Peanuts",
            "Chocolate Bar",
            "Gummy Bears",
            "Butter Cookies",
            "Crackers",
            "Popcorn",
            "Granola Bar",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk",
            "Skim Milk",
            "Oat Milk",
            "Cheddar",
            "Mozzarella",
            "Butter",
            "Greek Yogurt",
            "Cream Cheese",
            "Eggs Dozen",
            "Sour Cream",
        ],
    ),
    (
        "GRO",
        &[
            "White Bread",
            "Spaghetti",
            "Penne",
            "White Rice",
            "Brown Rice",
            "Canned Beans",
            "Canned Tuna",
            "Oatmeal",
            "Peanut Butter",
            "Honey",
        ],
    ),
];

/// Size variants and their price addon in cents
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 100), ("Large", 200), ("6-Pack", 400), ("12-Pack", 750)];

/// Product tax rates in percent
const TAX_RATES: &[i64] = &[0, 5, 10, 18];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Folio POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: from folio.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    folio_engine::init_tracing(&config.logging.filter);

    println!("🌱 Folio POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Products: {}", count);
    println!();

    let engine = Engine::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = engine.catalog();
    let existing = catalog.product_count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = Actor::new(1, Role::Admin);

    let warehouse = catalog.create_warehouse("Main", Some("Front store")).await?;
    catalog.set_default_warehouse(warehouse.id).await?;
    println!("✓ Default warehouse: {} (#{})", warehouse.name, warehouse.id);

    let wholesale = catalog.create_price_list("Wholesale").await?;

    println!();
    println!("Generating products...");

    let ledger = engine.ledger();
    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let new_product = generate_product(category, name, size, *addon, seed);

                let product = match catalog.create_product(&new_product).await {
                    Ok(product) => product,
                    Err(e) => {
                        eprintln!("Failed to insert {}: {}", new_product.sku, e);
                        continue;
                    }
                };

                let stock = (seed % 101) as i64;
                if stock > 0 {
                    ledger
                        .adjust(
                            admin,
                            StockAdjustment {
                                product_id: product.id,
                                warehouse_id: Some(warehouse.id),
                                kind: StockMovementType::In,
                                quantity: stock,
                                reference: Some("SEED".to_string()),
                            },
                        )
                        .await?;
                }

                if seed % 5 == 0 {
                    let price = product.price.percent(Decimal::from(90)).rounded();
                    catalog.set_list_price(wholesale.id, product.id, price).await?;
                }

                generated += 1;
                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!("  Rate: {:.0} products/second", generated as f64 / elapsed.as_secs_f64());

    let customer = catalog.create_customer("Walk-in Wholesale", Some(wholesale.id)).await?;
    let promotion = catalog
        .create_promotion("Opening Week", PromotionKind::Percent, Decimal::from(10), true)
        .await?;

    println!();
    println!("✓ Price list: {} (#{})", wholesale.name, wholesale.id);
    println!("✓ Customer: {} (#{})", customer.name, customer.id);
    println!("✓ Promotion: {} (#{})", promotion.name, promotion.id);

    let low = ledger.low_stock().await?;
    println!("  Products at or below minimum stock: {}", low.len());

    println!();
    println!("✓ Seed complete!");

    engine.close().await;
    Ok(())
}

/// Builds one product with deterministic pseudo-random data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    let short: String = name.chars().filter(|c| !c.is_whitespace()).take(3).collect();
    let sku = format!("{}-{}-{:04}", category, short.to_uppercase(), seed);

    // Base 1.99 - 9.98 plus size addon
    let price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;
    // Cost at 60-79% of price
    let cost_cents = price_cents * (60 + (seed % 20) as i64) / 100;

    NewProduct {
        sku,
        name: format!("{} {}", name, size),
        category: category.to_string(),
        price: Money::from_cents(price_cents),
        cost: Money::from_cents(cost_cents),
        tax_rate: TaxRate::from_percent(TAX_RATES[seed % TAX_RATES.len()]),
        tax_included: false,
        stock_min: 5,
    }
}
