//! # Unit of Work and Row Locks
//!
//! One lifecycle operation = one SQLite transaction = one `UnitOfWork`.
//!
//! ## Locking on SQLite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. A "row lock" here is a write:     │
//! │                                                                         │
//! │    UPDATE sales SET lock_version = lock_version + 1 WHERE id = ?        │
//! │                                                                         │
//! │  The first write of a transaction takes the database write lock and     │
//! │  keeps it until commit/rollback. Other writers wait (busy_timeout)      │
//! │  and then fail with a retryable LockTimeout.                            │
//! │                                                                         │
//! │  Lock order, always:                                                    │
//! │     aggregate root ──► products (sorted) ──► batches (sorted)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariant
//! The first statement of every unit of work is a write (a lock or an
//! insert). A transaction that reads first and writes later can lose its
//! snapshot to a concurrent writer and fail with `SQLITE_BUSY_SNAPSHOT`.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbResult;

// =============================================================================
// Lock Set
// =============================================================================

/// Ids to lock, sorted ascending and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet(Vec<String>);

impl LockSet {
    pub fn single(id: impl Into<String>) -> Self {
        LockSet(vec![id.into()])
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LockSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut ids: Vec<String> = iter.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        LockSet(ids)
    }
}

/// Tables carrying a `lock_version` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTable {
    Sales,
    Purchases,
    Products,
    ProductBatches,
}

impl LockTable {
    pub const fn table_name(&self) -> &'static str {
        match self {
            LockTable::Sales => "sales",
            LockTable::Purchases => "purchases",
            LockTable::Products => "products",
            LockTable::ProductBatches => "product_batches",
        }
    }

    fn lock_sql(&self) -> &'static str {
        match self {
            LockTable::Sales => "UPDATE sales SET lock_version = lock_version + 1 WHERE id = ?1",
            LockTable::Purchases => {
                "UPDATE purchases SET lock_version = lock_version + 1 WHERE id = ?1"
            }
            LockTable::Products => {
                "UPDATE products SET lock_version = lock_version + 1 WHERE id = ?1"
            }
            LockTable::ProductBatches => {
                "UPDATE product_batches SET lock_version = lock_version + 1 WHERE id = ?1"
            }
        }
    }
}

/// Locks every row of `ids` in `table`, in id order.
///
/// Returns how many rows existed. Missing ids are not an error here; the
/// caller decides what a missing row means.
pub async fn lock_rows(
    conn: &mut SqliteConnection,
    table: LockTable,
    ids: &LockSet,
) -> DbResult<u64> {
    let sql = table.lock_sql();
    let mut locked = 0;
    for id in ids.ids() {
        locked += sqlx::query(sql)
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    debug!(
        table = table.table_name(),
        requested = ids.len(),
        locked,
        "Rows locked"
    );
    Ok(locked)
}

// =============================================================================
// Unit of Work
// =============================================================================

/// An open transaction plus the clock reading used for every timestamp it
/// writes.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it
/// back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
}

impl UnitOfWork {
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin().await?;
        Ok(UnitOfWork { tx, now: Utc::now() })
    }

    /// Transaction timestamp.
    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The transaction's connection, for repository functions.
    #[inline]
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn lock(&mut self, table: LockTable, ids: &LockSet) -> DbResult<u64> {
        lock_rows(&mut self.tx, table, ids).await
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
