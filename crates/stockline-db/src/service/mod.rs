//! # Lifecycle Services
//!
//! Sale, purchase and payment transitions. Every method takes the caller's
//! [`UnitOfWork`](crate::unit_of_work::UnitOfWork), does all of its reads
//! and writes through it, and leaves commit to the caller.
//!
//! ## Shape of a transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. lock aggregate root          (first statement = write lock)        │
//! │  2. lifecycle check              AlreadyDone ──► return current view   │
//! │  3. lock products, then batches  (LockSet: sorted, de-duplicated)      │
//! │  4. pure checks (stockline-core) before the first mutation             │
//! │  5. mutate batches / stock, append one movement                        │
//! │  6. stamp status + history, return the reloaded aggregate              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any `Err` leaves the unit of work uncommitted; dropping it rolls back.

use std::collections::BTreeMap;

use sqlx::SqliteConnection;

use stockline_core::{CoreError, Product};

use crate::error::EngineResult;
use crate::repository::catalog;

pub mod payment;
pub mod purchase;
pub mod sale;

pub use payment::PaymentService;
pub use purchase::PurchaseService;
pub use sale::SaleService;

/// Active products for a new draft, keyed by id. Every missing or inactive
/// id is reported in one `NotFoundMany`.
pub(crate) async fn resolve_active_products(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> EngineResult<BTreeMap<String, Product>> {
    let found: BTreeMap<String, Product> = catalog::fetch_products(conn, ids)
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .map(|p| (p.id.clone(), p))
        .collect();

    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains_key(*id))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::NotFoundMany {
            entity: "Product",
            ids: missing,
        }
        .into());
    }
    Ok(found)
}

/// Products referenced by an existing aggregate, keyed by id. A missing row
/// means the stored aggregate is broken.
pub(crate) async fn load_referenced_products(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> EngineResult<BTreeMap<String, Product>> {
    let found: BTreeMap<String, Product> = catalog::fetch_products(conn, ids)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    if let Some(missing) = ids.iter().find(|id| !found.contains_key(*id)) {
        return Err(CoreError::DataIntegrity(format!("product {} referenced but missing", missing)).into());
    }
    Ok(found)
}
