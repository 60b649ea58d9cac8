//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};

use stockline_core::{
    Actor, BatchSpec, Money, NewPurchase, NewPurchaseItem, PostPurchaseItem, PostSaleOptions,
    PurchaseView, SaleLine, SaleView,
};
use stockline_db::{Database, DbConfig, Engine};

pub struct Fixture {
    pub engine: Engine,
    pub admin: Actor,
    pub seller: Actor,
    pub warehouse: Actor,
    pub customer_id: String,
    pub supplier_id: String,
}

impl Fixture {
    pub fn db(&self) -> &Database {
        self.engine.db()
    }
}

/// Fresh in-memory engine with one customer and one supplier.
pub async fn setup() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    with_database(db).await
}

pub async fn with_database(db: Database) -> Fixture {
    let customer = db.catalog().create_customer("Ana Torres").await.unwrap();
    let supplier = db.catalog().create_supplier("Central Wholesale").await.unwrap();
    Fixture {
        engine: Engine::new(db),
        admin: Actor::admin("admin-1"),
        seller: Actor::seller("seller-1"),
        warehouse: Actor::warehouse("wh-1"),
        customer_id: customer.id,
        supplier_id: supplier.id,
    }
}

pub async fn product(f: &Fixture, name: &str, price_cents: i64, perishable: bool) -> String {
    f.db()
        .catalog()
        .create_product(name, Money::from_cents(price_cents), perishable)
        .await
        .unwrap()
        .id
}

pub fn days(n: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(n)
}

pub fn spec(quantity: i64, expires_at: Option<DateTime<Utc>>) -> BatchSpec {
    BatchSpec {
        batch_code: None,
        expires_at,
        quantity,
    }
}

/// Drafts and posts a one-item purchase received as the given batches.
pub async fn receive(f: &Fixture, product_id: &str, batches: Vec<BatchSpec>) -> PurchaseView {
    let quantity = batches.iter().map(|b| b.quantity).sum();
    receive_qty(f, product_id, quantity, batches).await
}

/// Like [`receive`] with an explicit ordered quantity (for implicit batches).
pub async fn receive_qty(
    f: &Fixture,
    product_id: &str,
    quantity: i64,
    batches: Vec<BatchSpec>,
) -> PurchaseView {
    let draft = draft_purchase(f, product_id, quantity).await;
    let items = vec![PostPurchaseItem {
        purchase_item_id: draft.items[0].item.id.clone(),
        batches,
    }];
    f.engine
        .post_purchase(&f.warehouse, draft.id(), &items)
        .await
        .unwrap()
}

pub async fn draft_purchase(f: &Fixture, product_id: &str, quantity: i64) -> PurchaseView {
    let request = NewPurchase {
        supplier_id: Some(f.supplier_id.clone()),
        items: vec![NewPurchaseItem {
            product_id: product_id.to_string(),
            quantity,
            unit_cost: Money::from_cents(100),
        }],
        ..Default::default()
    };
    f.engine
        .create_draft_purchase(&f.warehouse, &request)
        .await
        .unwrap()
}

pub async fn draft_sale(f: &Fixture, actor: &Actor, lines: &[(&str, i64)]) -> SaleView {
    let lines: Vec<SaleLine> = lines.iter().map(|(p, q)| SaleLine::new(*p, *q)).collect();
    f.engine
        .create_draft_sale(actor, &f.customer_id, &lines)
        .await
        .unwrap()
}

/// Drafts and posts a sale.
pub async fn active_sale(f: &Fixture, actor: &Actor, lines: &[(&str, i64)]) -> SaleView {
    let draft = draft_sale(f, actor, lines).await;
    f.engine
        .post_sale(actor, draft.id(), &PostSaleOptions::default())
        .await
        .unwrap()
}

pub async fn stock(f: &Fixture, product_id: &str) -> i64 {
    f.db()
        .catalog()
        .product(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

/// Asserts the product counter equals the sum over its batches.
pub async fn assert_stock_consistent(f: &Fixture, product_id: &str) {
    let counter = stock(f, product_id).await;
    let batches = f.db().batches().available_total(product_id).await.unwrap();
    assert_eq!(counter, batches, "stock counter out of step for {}", product_id);
}
