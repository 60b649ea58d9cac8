//! # Purchase Repository
//!
//! Purchase headers and items. Batches created on receipt live in
//! [`super::batch`]; `load_view` joins them back per item.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use stockline_core::{Purchase, PurchaseItem, PurchaseItemView, PurchaseStatus, PurchaseView};

use super::batch;
use crate::error::{DbError, DbResult};
use crate::unit_of_work::{lock_rows, LockSet, LockTable};

const PURCHASE_COLUMNS: &str = "id, status, supplier_id, purchase_date, document_type, \
     document_number, notes, total, created_at, created_by, posted_at, posted_by, \
     voided_at, voided_by, void_reason, updated_at";

// =============================================================================
// Transaction Functions
// =============================================================================

pub async fn fetch_purchase(
    conn: &mut SqliteConnection,
    purchase_id: &str,
) -> DbResult<Option<Purchase>> {
    let sql = format!("SELECT {} FROM purchases WHERE id = ?1", PURCHASE_COLUMNS);
    let purchase = sqlx::query_as::<_, Purchase>(&sql)
        .bind(purchase_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(purchase)
}

/// Locks the purchase row and returns it as seen under the lock.
pub async fn tx_lock_purchase(conn: &mut SqliteConnection, purchase_id: &str) -> DbResult<Purchase> {
    let locked = lock_rows(&mut *conn, LockTable::Purchases, &LockSet::single(purchase_id)).await?;
    if locked == 0 {
        return Err(DbError::not_found("Purchase", purchase_id));
    }
    fetch_purchase(conn, purchase_id)
        .await?
        .ok_or_else(|| DbError::not_found("Purchase", purchase_id))
}

pub async fn tx_insert_purchase(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO purchases (
            id, status, supplier_id, purchase_date, document_type, document_number, notes,
            total, created_at, created_by, posted_at, posted_by,
            voided_at, voided_by, void_reason, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&purchase.id)
    .bind(purchase.status)
    .bind(&purchase.supplier_id)
    .bind(purchase.purchase_date)
    .bind(purchase.document_type)
    .bind(&purchase.document_number)
    .bind(&purchase.notes)
    .bind(purchase.total)
    .bind(purchase.created_at)
    .bind(&purchase.created_by)
    .bind(purchase.posted_at)
    .bind(&purchase.posted_by)
    .bind(purchase.voided_at)
    .bind(&purchase.voided_by)
    .bind(&purchase.void_reason)
    .bind(purchase.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn tx_insert_item(conn: &mut SqliteConnection, item: &PurchaseItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO purchase_items (id, purchase_id, line_no, product_id, quantity, unit_cost, subtotal)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.purchase_id)
    .bind(item.line_no)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_cost)
    .bind(item.subtotal)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_items(
    conn: &mut SqliteConnection,
    purchase_id: &str,
) -> DbResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        r#"
        SELECT id, purchase_id, line_no, product_id, quantity, unit_cost, subtotal
        FROM purchase_items
        WHERE purchase_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(purchase_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

pub async fn tx_mark_posted(
    conn: &mut SqliteConnection,
    purchase_id: &str,
    actor_id: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE purchases SET status = ?2, posted_at = ?3, posted_by = ?4, updated_at = ?3 \
         WHERE id = ?1",
    )
    .bind(purchase_id)
    .bind(PurchaseStatus::Posted)
    .bind(at)
    .bind(actor_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn tx_mark_voided(
    conn: &mut SqliteConnection,
    purchase_id: &str,
    actor_id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE purchases SET status = ?2, voided_at = ?3, voided_by = ?4, void_reason = ?5, \
         updated_at = ?3 WHERE id = ?1",
    )
    .bind(purchase_id)
    .bind(PurchaseStatus::Voided)
    .bind(at)
    .bind(actor_id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Loads a purchase with its items and the batches received for each item.
pub async fn load_view(conn: &mut SqliteConnection, purchase_id: &str) -> DbResult<PurchaseView> {
    let purchase = fetch_purchase(&mut *conn, purchase_id)
        .await?
        .ok_or_else(|| DbError::not_found("Purchase", purchase_id))?;
    let items = fetch_items(&mut *conn, purchase_id).await?;
    let batches = batch::fetch_for_purchase(&mut *conn, purchase_id).await?;

    let items = items
        .into_iter()
        .map(|item| {
            let batches = batches
                .iter()
                .filter(|b| b.purchase_item_id.as_deref() == Some(item.id.as_str()))
                .cloned()
                .collect();
            PurchaseItemView { item, batches }
        })
        .collect();

    Ok(PurchaseView { purchase, items })
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    pub async fn get(&self, purchase_id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        fetch_purchase(&mut conn, purchase_id).await
    }

    /// Header, items and batches from one read snapshot.
    pub async fn get_view(&self, purchase_id: &str) -> DbResult<PurchaseView> {
        let mut tx = self.pool.begin().await?;
        let view = load_view(&mut tx, purchase_id).await?;
        tx.commit().await?;
        Ok(view)
    }
}
