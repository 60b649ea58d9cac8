//! # stockline-db: Storage and Lifecycles for Stockline
//!
//! Everything in Stockline that opens a transaction lives here: the SQLite
//! pool, migrations, row locks, repositories, the lifecycle services and
//! the [`Engine`] that ties them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Data Flow                              │
//! │                                                                         │
//! │  Caller (HTTP handler, CLI, test)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   Engine ──► UnitOfWork ──► SaleService / PurchaseService /     │   │
//! │  │     │                       PaymentService                      │   │
//! │  │     │                            │                              │   │
//! │  │     │                            ├── stockline-core rules       │   │
//! │  │     │                            └── repository::* (SQL)        │   │
//! │  │     └── lock-free reads ──► XxxRepository { pool }              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── migrations/sqlite/*.sql                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven engine configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`unit_of_work`] - Transactions and ordered row locks
//! - [`repository`] - SQL for every table
//! - [`service`] - Sale, purchase and payment lifecycles
//! - [`engine`] - The operation façade
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockline_db::{Database, DbConfig, Engine};
//! use stockline_core::{Actor, PostSaleOptions, SaleLine};
//!
//! let db = Database::new(DbConfig::new("stockline.db")).await?;
//! let engine = Engine::new(db);
//!
//! let seller = Actor::seller("u-7");
//! let draft = engine
//!     .create_draft_sale(&seller, &customer_id, &[SaleLine::new(&product_id, 3)])
//!     .await?;
//! let posted = engine
//!     .post_sale(&seller, draft.id(), &PostSaleOptions::default())
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::{LockSet, LockTable, UnitOfWork};

// Repository re-exports for convenience
pub use repository::batch::BatchRepository;
pub use repository::catalog::{CatalogRepository, CatalogTable};
pub use repository::movement::MovementRepository;
pub use repository::payment::PaymentRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
