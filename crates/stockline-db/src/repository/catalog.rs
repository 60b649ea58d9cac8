//! # Catalog Repository
//!
//! Products, customers and suppliers as the inventory engine consumes them:
//! lookups by id and id-set, the stock counter, and the inserts needed to
//! seed and test a database. Catalog CRUD proper lives elsewhere.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use stockline_core::{Customer, Money, Product, Supplier};

use super::new_id;
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str =
    "id, name, price, stock, perishable, is_active, created_at, updated_at";

// =============================================================================
// Transaction Functions
// =============================================================================

/// Products with the given ids (active or not), in id order.
pub async fn fetch_products(conn: &mut SqliteConnection, ids: &[String]) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(PRODUCT_COLUMNS);
    qb.push(" FROM products WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY id");

    let products = qb.build_query_as::<Product>().fetch_all(&mut *conn).await?;
    Ok(products)
}

pub async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

pub async fn fetch_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT id, name, is_active, created_at FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(customer)
}

pub async fn fetch_supplier(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Supplier>> {
    let supplier = sqlx::query_as::<_, Supplier>(
        "SELECT id, name, is_active, created_at FROM suppliers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(supplier)
}

/// Writes a new stock counter value. The caller computed it with the ledger
/// primitives while holding the product lock.
pub async fn tx_set_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    new_stock: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(new_stock)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }
    Ok(())
}

pub async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, stock, perishable, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(product.perishable)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog lookups outside a unit of work.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn product(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    pub async fn products(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_products(&mut conn, ids).await
    }

    pub async fn customer(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    pub async fn supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let mut conn = self.pool.acquire().await?;
        fetch_supplier(&mut conn, id).await
    }

    /// Inserts a product with zero stock. Stock only arrives through posted
    /// purchases.
    pub async fn create_product(
        &self,
        name: &str,
        price: Money,
        perishable: bool,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            name: name.to_string(),
            price,
            stock: 0,
            perishable,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Creating product");
        let mut conn = self.pool.acquire().await?;
        insert_product(&mut conn, &product).await?;
        Ok(product)
    }

    pub async fn create_customer(&self, name: &str) -> DbResult<Customer> {
        let customer = Customer {
            id: new_id(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO customers (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&customer.id)
            .bind(&customer.name)
            .bind(customer.is_active)
            .bind(customer.created_at)
            .execute(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn create_supplier(&self, name: &str) -> DbResult<Supplier> {
        let supplier = Supplier {
            id: new_id(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO suppliers (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&supplier.id)
            .bind(&supplier.name)
            .bind(supplier.is_active)
            .bind(supplier.created_at)
            .execute(&self.pool)
            .await?;
        Ok(supplier)
    }

    /// Flips the `is_active` flag. Inactive entities are invisible to new
    /// sales and purchases.
    pub async fn set_active(&self, table: CatalogTable, id: &str, active: bool) -> DbResult<()> {
        let sql = match table {
            CatalogTable::Products => "UPDATE products SET is_active = ?2 WHERE id = ?1",
            CatalogTable::Customers => "UPDATE customers SET is_active = ?2 WHERE id = ?1",
            CatalogTable::Suppliers => "UPDATE suppliers SET is_active = ?2 WHERE id = ?1",
        };
        let result = sqlx::query(sql)
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(table.entity(), id));
        }
        Ok(())
    }

    /// Number of products. Used by the seed binary to avoid double seeding.
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Products,
    Customers,
    Suppliers,
}

impl CatalogTable {
    fn entity(&self) -> &'static str {
        match self {
            CatalogTable::Products => "Product",
            CatalogTable::Customers => "Customer",
            CatalogTable::Suppliers => "Supplier",
        }
    }
}
