//! # Sale Repository
//!
//! Sale headers, details, batch allocations and status history.
//!
//! ## Aggregate Loading
//! ```text
//! load_view(sale_id)
//!   ├── sales row
//!   ├── sale_details        ORDER BY line_no
//!   └── sale_batch_allocations (per detail, insertion order)
//!        = SaleView { sale, lines: [SaleLineView { detail, allocations }] }
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use stockline_core::validation::clamp_search_limit;
use stockline_core::{
    Sale, SaleBatchAllocation, SaleDetail, SaleFilter, SaleLineView, SaleStatus,
    SaleStatusHistory, SaleView,
};

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::unit_of_work::{lock_rows, LockSet, LockTable};

const SALE_COLUMNS: &str = "id, status, customer_id, sale_date, total, created_at, created_by, \
     posted_at, posted_by, completed_at, completed_by, voided_at, voided_by, void_reason, updated_at";

// =============================================================================
// Headers
// =============================================================================

pub async fn fetch_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

/// Locks the sale row and returns it as seen under the lock.
pub async fn tx_lock_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Sale> {
    let locked = lock_rows(&mut *conn, LockTable::Sales, &LockSet::single(sale_id)).await?;
    if locked == 0 {
        return Err(DbError::not_found("Sale", sale_id));
    }
    fetch_sale(conn, sale_id)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", sale_id))
}

pub async fn tx_insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, status, customer_id, sale_date, total, created_at, created_by,
            posted_at, posted_by, completed_at, completed_by,
            voided_at, voided_by, void_reason, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(sale.status)
    .bind(&sale.customer_id)
    .bind(sale.sale_date)
    .bind(sale.total)
    .bind(sale.created_at)
    .bind(&sale.created_by)
    .bind(sale.posted_at)
    .bind(&sale.posted_by)
    .bind(sale.completed_at)
    .bind(&sale.completed_by)
    .bind(sale.voided_at)
    .bind(&sale.voided_by)
    .bind(&sale.void_reason)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn tx_mark_posted(
    conn: &mut SqliteConnection,
    sale_id: &str,
    actor_id: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE sales SET status = ?2, posted_at = ?3, posted_by = ?4, updated_at = ?3 WHERE id = ?1",
    )
    .bind(sale_id)
    .bind(SaleStatus::Active)
    .bind(at)
    .bind(actor_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn tx_mark_completed(
    conn: &mut SqliteConnection,
    sale_id: &str,
    actor_id: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE sales SET status = ?2, completed_at = ?3, completed_by = ?4, updated_at = ?3 \
         WHERE id = ?1",
    )
    .bind(sale_id)
    .bind(SaleStatus::Completed)
    .bind(at)
    .bind(actor_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn tx_mark_voided(
    conn: &mut SqliteConnection,
    sale_id: &str,
    actor_id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE sales SET status = ?2, voided_at = ?3, voided_by = ?4, void_reason = ?5, \
         updated_at = ?3 WHERE id = ?1",
    )
    .bind(sale_id)
    .bind(SaleStatus::Voided)
    .bind(at)
    .bind(actor_id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Details and Allocations
// =============================================================================

pub async fn tx_insert_detail(conn: &mut SqliteConnection, detail: &SaleDetail) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_details (id, sale_id, line_no, product_id, quantity, unit_price, subtotal)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&detail.id)
    .bind(&detail.sale_id)
    .bind(detail.line_no)
    .bind(&detail.product_id)
    .bind(detail.quantity)
    .bind(detail.unit_price)
    .bind(detail.subtotal)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_details(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleDetail>> {
    let details = sqlx::query_as::<_, SaleDetail>(
        r#"
        SELECT id, sale_id, line_no, product_id, quantity, unit_price, subtotal
        FROM sale_details
        WHERE sale_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(details)
}

pub async fn tx_insert_allocation(
    conn: &mut SqliteConnection,
    sale_detail_id: &str,
    batch_id: &str,
    product_id: &str,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<SaleBatchAllocation> {
    let allocation = SaleBatchAllocation {
        id: new_id(),
        sale_detail_id: sale_detail_id.to_string(),
        batch_id: batch_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        created_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO sale_batch_allocations (id, sale_detail_id, batch_id, product_id, quantity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&allocation.id)
    .bind(&allocation.sale_detail_id)
    .bind(&allocation.batch_id)
    .bind(&allocation.product_id)
    .bind(allocation.quantity)
    .bind(allocation.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(allocation)
}

/// Every allocation of a sale, in the order they were written.
pub async fn fetch_allocations(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleBatchAllocation>> {
    let allocations = sqlx::query_as::<_, SaleBatchAllocation>(
        r#"
        SELECT a.id, a.sale_detail_id, a.batch_id, a.product_id, a.quantity, a.created_at
        FROM sale_batch_allocations a
        JOIN sale_details d ON d.id = a.sale_detail_id
        WHERE d.sale_id = ?1
        ORDER BY a.rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(allocations)
}

// =============================================================================
// Status History
// =============================================================================

pub async fn tx_insert_history(
    conn: &mut SqliteConnection,
    sale_id: &str,
    from: SaleStatus,
    to: SaleStatus,
    actor_id: &str,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_status_history (id, sale_id, from_status, to_status, changed_at, changed_by, reason)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(new_id())
    .bind(sale_id)
    .bind(from)
    .bind(to)
    .bind(at)
    .bind(actor_id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_history(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleStatusHistory>> {
    let rows = sqlx::query_as::<_, SaleStatusHistory>(
        r#"
        SELECT id, sale_id, from_status, to_status, changed_at, changed_by, reason
        FROM sale_status_history
        WHERE sale_id = ?1
        ORDER BY changed_at, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

// =============================================================================
// Aggregate
// =============================================================================

/// Loads a sale with its details and allocations.
pub async fn load_view(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<SaleView> {
    let sale = fetch_sale(&mut *conn, sale_id)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", sale_id))?;
    let details = fetch_details(&mut *conn, sale_id).await?;
    let mut allocations = fetch_allocations(&mut *conn, sale_id).await?;

    let lines = details
        .into_iter()
        .map(|detail| {
            let (mine, rest): (Vec<_>, Vec<_>) = allocations
                .drain(..)
                .partition(|a| a.sale_detail_id == detail.id);
            allocations = rest;
            SaleLineView {
                detail,
                allocations: mine,
            }
        })
        .collect();

    Ok(SaleView { sale, lines })
}

/// Filtered listing, newest first.
pub async fn search(conn: &mut SqliteConnection, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(SALE_COLUMNS);
    qb.push(" FROM sales WHERE 1 = 1");

    if let Some(customer_id) = &filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(from) = filter.from {
        qb.push(" AND sale_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND sale_date <= ").push_bind(to);
    }
    if let Some(min_total) = filter.min_total {
        qb.push(" AND total >= ").push_bind(min_total);
    }
    if let Some(max_total) = filter.max_total {
        qb.push(" AND total <= ").push_bind(max_total);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }

    qb.push(" ORDER BY sale_date DESC, id ASC");
    qb.push(" LIMIT ")
        .push_bind(i64::from(clamp_search_limit(filter.limit)));
    qb.push(" OFFSET ")
        .push_bind(i64::from(filter.offset.unwrap_or(0)));

    let sales = qb.build_query_as::<Sale>().fetch_all(&mut *conn).await?;
    Ok(sales)
}

// =============================================================================
// Repository
// =============================================================================

/// Lock-free sale reads over the pool.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get(&self, sale_id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, sale_id).await
    }

    /// Header, details and allocations from one read snapshot.
    pub async fn get_view(&self, sale_id: &str) -> DbResult<SaleView> {
        let mut tx = self.pool.begin().await?;
        let view = load_view(&mut tx, sale_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    pub async fn search(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        search(&mut conn, filter).await
    }

    pub async fn history(&self, sale_id: &str) -> DbResult<Vec<SaleStatusHistory>> {
        let mut conn = self.pool.acquire().await?;
        fetch_history(&mut conn, sale_id).await
    }
}
