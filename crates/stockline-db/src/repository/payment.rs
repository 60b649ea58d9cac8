//! # Payment Repository
//!
//! Payments towards sales and the posted-payments sum that gates
//! `complete_sale`.

use sqlx::{SqliteConnection, SqlitePool};

use stockline_core::{Money, Payment, PaymentStatus};

use crate::error::DbResult;

/// Sum of POSTED payment amounts for a sale. Zero when there are none.
pub async fn sum_posted(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Money> {
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE sale_id = ?1 AND status = ?2",
    )
    .bind(sale_id)
    .bind(PaymentStatus::Posted)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::from_cents(cents))
}

pub async fn tx_insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, sale_id, amount, method, status, change_amount, reference, paid_at, created_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(payment.status)
    .bind(payment.change_amount)
    .bind(&payment.reference)
    .bind(payment.paid_at)
    .bind(&payment.created_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, sale_id, amount, method, status, change_amount, reference, paid_at, created_by
        FROM payments
        WHERE sale_id = ?1
        ORDER BY paid_at, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(payments)
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_sale(&mut conn, sale_id).await
    }

    pub async fn sum_posted(&self, sale_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        sum_posted(&mut conn, sale_id).await
    }
}
