//! # Repository Module
//!
//! Database access for Stockline, in two flavours.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads outside a transaction                                           │
//! │       db.sales().get_view("...")                                       │
//! │       └── XxxRepository { pool } ── acquires any pooled connection     │
//! │                                                                         │
//! │  Work inside a unit of work                                            │
//! │       sale::tx_mark_posted(uow.conn(), ...)                            │
//! │       └── free functions taking &mut SqliteConnection                  │
//! │                                                                         │
//! │  Both flavours share the same SQL: repository methods acquire a        │
//! │  connection and call the free functions. Multi-statement reads         │
//! │  (aggregate views) run inside a read transaction so they see a single  │
//! │  WAL snapshot.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog`] - Products, customers, suppliers, stock counters
//! - [`batch`] - Product batches (FEFO candidates, receiving)
//! - [`sale`] - Sales, details, allocations, status history
//! - [`purchase`] - Purchases and purchase items
//! - [`movement`] - Append-only inventory ledger
//! - [`payment`] - Payments and the posted-payments sum

pub mod batch;
pub mod catalog;
pub mod movement;
pub mod payment;
pub mod purchase;
pub mod sale;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
