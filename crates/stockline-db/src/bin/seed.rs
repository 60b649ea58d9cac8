//! # Seed Data Generator
//!
//! Creates a demo catalog and receives one purchase so a fresh database has
//! stock to sell.
//!
//! ## Usage
//! ```bash
//! # Database from STOCKLINE_DATABASE_PATH (default ./stockline.db)
//! cargo run -p stockline-db --bin seed
//!
//! # Specify database path
//! cargo run -p stockline-db --bin seed -- --db ./data/stockline.db
//! ```
//!
//! ## Generated Data
//! - One customer and one supplier
//! - A handful of products, some perishable
//! - One POSTED purchase: perishables arrive in two dated batches each,
//!   everything else in one implicit batch

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use stockline_core::{
    Actor, BatchSpec, Money, NewPurchase, NewPurchaseItem, PostPurchaseItem, PurchaseDocumentType,
};
use stockline_db::{Database, Engine, EngineConfig};

/// (name, price in cents, unit cost in cents, perishable, quantity received)
const PRODUCTS: &[(&str, i64, i64, bool, i64)] = &[
    ("Whole Milk 1L", 129, 85, true, 40),
    ("Greek Yogurt 500g", 349, 210, true, 24),
    ("Cheddar Cheese 200g", 499, 300, true, 18),
    ("White Rice 1kg", 219, 140, false, 60),
    ("Pasta Penne 500g", 159, 90, false, 80),
    ("Canned Beans 400g", 99, 55, false, 120),
    ("Olive Oil 750ml", 899, 610, false, 20),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stockline_db=info,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut config = EngineConfig::from_env()?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./stockline.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Stockline Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database_path.display());
    println!();

    let engine = Engine::connect(&config).await?;
    let db: &Database = engine.db();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let customer = db.catalog().create_customer("Walk-in Customer").await?;
    let supplier = db.catalog().create_supplier("Central Wholesale").await?;
    println!("✓ Customer {}", customer.id);
    println!("✓ Supplier {}", supplier.id);

    let mut items = Vec::with_capacity(PRODUCTS.len());
    let mut perishable = Vec::new();
    for (name, price, cost, is_perishable, qty) in PRODUCTS {
        let product = db
            .catalog()
            .create_product(name, Money::from_cents(*price), *is_perishable)
            .await?;
        if *is_perishable {
            perishable.push(product.id.clone());
        }
        items.push(NewPurchaseItem {
            product_id: product.id,
            quantity: *qty,
            unit_cost: Money::from_cents(*cost),
        });
    }
    println!("✓ Created {} products", items.len());

    let warehouse = Actor::warehouse("seed");
    let draft = engine
        .create_draft_purchase(
            &warehouse,
            &NewPurchase {
                supplier_id: Some(supplier.id.clone()),
                document_type: Some(PurchaseDocumentType::Invoice),
                document_number: Some("SEED-0001".to_string()),
                notes: Some("Opening stock".to_string()),
                items,
                ..Default::default()
            },
        )
        .await?;

    // Perishables arrive in two lots with different expiries so FEFO has
    // something to choose between.
    let now = Utc::now();
    let receipt: Vec<PostPurchaseItem> = draft
        .items
        .iter()
        .map(|line| {
            let item = &line.item;
            let batches = if perishable.contains(&item.product_id) {
                let first = item.quantity / 2;
                vec![
                    BatchSpec {
                        batch_code: Some(format!("L{}-A", item.line_no)),
                        expires_at: Some(now + Duration::days(7)),
                        quantity: first,
                    },
                    BatchSpec {
                        batch_code: Some(format!("L{}-B", item.line_no)),
                        expires_at: Some(now + Duration::days(21)),
                        quantity: item.quantity - first,
                    },
                ]
            } else {
                Vec::new()
            };
            PostPurchaseItem {
                purchase_item_id: item.id.clone(),
                batches,
            }
        })
        .collect();

    let posted = engine.post_purchase(&warehouse, draft.id(), &receipt).await?;
    let batches: usize = posted.items.iter().map(|i| i.batches.len()).sum();
    println!(
        "✓ Purchase {} posted: {} items, {} batches, total {}",
        posted.id(),
        posted.items.len(),
        batches,
        posted.purchase.total
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
