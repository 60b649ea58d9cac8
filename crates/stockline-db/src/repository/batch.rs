//! # Batch Repository
//!
//! Product batches: the FEFO candidate query used by `post_sale`, batch
//! creation on purchase receipt, and quantity updates.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use stockline_core::types::BatchSpec;
use stockline_core::{ProductBatch, PurchaseItem};

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::unit_of_work::{lock_rows, LockSet, LockTable};

const BATCH_COLUMNS: &str = "id, product_id, purchase_item_id, batch_code, expires_at, \
     received_at, qty_initial, qty_available, unit_cost";

// =============================================================================
// Transaction Functions
// =============================================================================

/// Locks and returns every batch with stock left for the given products.
///
/// Candidate ids are locked in id order, then re-read so the quantities
/// reflect the locked state. The result is ordered by id; callers sort it
/// into FEFO order.
pub async fn tx_lock_available(
    conn: &mut SqliteConnection,
    product_ids: &[String],
) -> DbResult<Vec<ProductBatch>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id FROM product_batches WHERE qty_available > 0 AND product_id IN (");
    let mut separated = qb.separated(", ");
    for id in product_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let ids: Vec<String> = qb.build_query_scalar::<String>().fetch_all(&mut *conn).await?;
    let lock_set: LockSet = ids.into_iter().collect();
    lock_rows(&mut *conn, LockTable::ProductBatches, &lock_set).await?;

    fetch_by_ids(conn, lock_set.ids()).await
}

/// Batches with the given ids, in id order.
pub async fn fetch_by_ids(conn: &mut SqliteConnection, ids: &[String]) -> DbResult<Vec<ProductBatch>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(BATCH_COLUMNS);
    qb.push(" FROM product_batches WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY id");

    let batches = qb
        .build_query_as::<ProductBatch>()
        .fetch_all(&mut *conn)
        .await?;
    Ok(batches)
}

/// Every batch received for a purchase, ordered by id.
pub async fn fetch_for_purchase(
    conn: &mut SqliteConnection,
    purchase_id: &str,
) -> DbResult<Vec<ProductBatch>> {
    let sql = format!(
        "SELECT {} FROM product_batches \
         WHERE purchase_item_id IN (SELECT id FROM purchase_items WHERE purchase_id = ?1) \
         ORDER BY id",
        BATCH_COLUMNS
    );
    let batches = sqlx::query_as::<_, ProductBatch>(&sql)
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(batches)
}

pub async fn fetch_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<ProductBatch>> {
    let sql = format!(
        "SELECT {} FROM product_batches WHERE product_id = ?1 ORDER BY id",
        BATCH_COLUMNS
    );
    let batches = sqlx::query_as::<_, ProductBatch>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(batches)
}

pub async fn tx_set_available(
    conn: &mut SqliteConnection,
    batch_id: &str,
    qty_available: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE product_batches SET qty_available = ?2 WHERE id = ?1")
        .bind(batch_id)
        .bind(qty_available)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ProductBatch", batch_id));
    }
    Ok(())
}

/// Creates a full batch for one received spec of a purchase item.
pub async fn tx_insert_received(
    conn: &mut SqliteConnection,
    item: &PurchaseItem,
    spec: &BatchSpec,
    received_at: DateTime<Utc>,
) -> DbResult<ProductBatch> {
    let batch = ProductBatch {
        id: new_id(),
        product_id: item.product_id.clone(),
        purchase_item_id: Some(item.id.clone()),
        batch_code: spec.batch_code.clone(),
        expires_at: spec.expires_at,
        received_at,
        qty_initial: spec.quantity,
        qty_available: spec.quantity,
        unit_cost: item.unit_cost,
    };
    insert(conn, &batch).await?;
    Ok(batch)
}

pub async fn insert(conn: &mut SqliteConnection, batch: &ProductBatch) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO product_batches (
            id, product_id, purchase_item_id, batch_code, expires_at,
            received_at, qty_initial, qty_available, unit_cost
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.product_id)
    .bind(&batch.purchase_item_id)
    .bind(&batch.batch_code)
    .bind(batch.expires_at)
    .bind(batch.received_at)
    .bind(batch.qty_initial)
    .bind(batch.qty_available)
    .bind(batch.unit_cost)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// All batches of a product, including exhausted ones.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_product(&mut conn, product_id).await
    }

    pub async fn for_purchase(&self, purchase_id: &str) -> DbResult<Vec<ProductBatch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_purchase(&mut conn, purchase_id).await
    }

    /// Sum of `qty_available` over a product's batches.
    pub async fn available_total(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(qty_available), 0) FROM product_batches WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
