//! # stockline-core: Pure Inventory Rules for Stockline
//!
//! This crate is the **heart** of the Stockline inventory engine. It contains
//! every rule that decides what a sale or purchase may do to stock, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Caller (HTTP layer, jobs, seed binary)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process API                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      stockline-db: Engine, services, unit of work, SQLite       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockline-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  fefo   │ │  ledger  │ │ authz  │ │ payment │ │   │
//! │  │   │ Sale    │ │ sort    │ │ counters │ │ void   │ │  gate   │ │   │
//! │  │   │ Batch   │ │ allocate│ │ movements│ │ window │ │ change  │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, ProductBatch, Sale, Purchase, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and error kinds
//! - [`validation`] - Request validation
//! - [`fefo`] - First-expiring-first-out batch allocator
//! - [`ledger`] - Stock counters and inventory movement drafts
//! - [`lifecycle`] - Sale/Purchase state transition rules
//! - [`authz`] - Void authorization (roles, ownership, time window)
//! - [`payment`] - Payment gate and payment acceptance rules
//!
//! ## Example Usage
//!
//! ```rust
//! use stockline_core::fefo;
//! use stockline_core::types::ProductBatch;
//! use stockline_core::Money;
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let batch = |id: &str, days: i64, qty: i64| ProductBatch {
//!     id: id.to_string(),
//!     product_id: "p-1".to_string(),
//!     purchase_item_id: None,
//!     batch_code: None,
//!     expires_at: Some(now + Duration::days(days)),
//!     received_at: now,
//!     qty_initial: qty,
//!     qty_available: qty,
//!     unit_cost: Money::from_cents(100),
//! };
//!
//! let mut batches = vec![batch("b-late", 10, 5), batch("b-soon", 5, 5)];
//! fefo::sort_fefo(&mut batches);
//! let takes = fefo::allocate("p-1", 7, &mut batches).unwrap();
//!
//! assert_eq!(takes[0].batch_id, "b-soon");
//! assert_eq!(takes[0].quantity, 5);
//! assert_eq!(takes[1].quantity, 2);
//! ```

pub mod authz;
pub mod error;
pub mod fefo;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

/// Hours after posting (or draft creation) during which a SELLER may void
/// a sale they created.
pub const DEFAULT_SELLER_VOID_WINDOW_HOURS: i64 = 24;

/// Largest quantity one sale line, purchase item or batch may carry.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Upper bound for one `search_sales` page.
pub const MAX_SEARCH_LIMIT: u32 = 200;

/// Page size used when a sale search does not ask for one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;
