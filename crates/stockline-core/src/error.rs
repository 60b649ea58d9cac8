//! # Error Types
//!
//! Domain-specific error types for stockline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockline-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed requests                             │
//! │                                                                         │
//! │  stockline-db errors (separate crate)                                  │
//! │  ├── DbError          - Storage failures (incl. lock timeouts)         │
//! │  └── EngineError      - CoreError | DbError, what callers see          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Kinds
//! Every error maps onto one [`ErrorKind`]. Callers branch on the kind, not
//! on the variant:
//!
//! | Kind            | Retry?                         |
//! |-----------------|--------------------------------|
//! | `NotFound`      | never                          |
//! | `Validation`    | never                          |
//! | `Conflict`      | only after the precondition changes |
//! | `Forbidden`     | never                          |
//! | `DataIntegrity` | never, indicates a prior bug   |
//! | `Retryable`     | yes (lock timeout, deadlock)   |
//! | `Internal`      | no                             |

use serde::Serialize;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of every error the engine can surface.
///
/// `Retryable` and `Internal` are only produced by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    DataIntegrity,
    Retryable,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the inventory engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A single referenced entity does not exist (or is inactive).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Several referenced entities are missing. Lists every missing id.
    #[error("{entity} not found: [{}]", ids.join(", "))]
    NotFoundMany {
        entity: &'static str,
        ids: Vec<String>,
    },

    /// The aggregate is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Posting a VOIDED sale
    /// - Completing a DRAFT sale
    /// - Voiding a COMPLETED sale
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        operation: &'static str,
    },

    /// Pre-check before FEFO consumption found too little stock.
    ///
    /// ## User Workflow
    /// ```text
    /// post_sale(qty: 10)
    ///      │
    ///      ▼
    /// Lock batches: B1 avail 4, B2 avail 5
    ///      │
    ///      ▼
    /// InsufficientFefoStock { available: 9, required: 10 }
    /// ```
    #[error("insufficient FEFO stock for product {product_id}: disponible={available}, requerido={required}")]
    InsufficientFefoStock {
        product_id: String,
        available: i64,
        required: i64,
    },

    /// Candidates ran out during consumption although the pre-check passed.
    /// Concurrent consumption slipped past the batch locks.
    #[error("insufficient stock (race condition) for product {product_id}: missing {missing}")]
    AllocationRace { product_id: String, missing: i64 },

    /// A stock counter would drop below zero.
    #[error("stock for product {product_id} would go negative: {current} - {quantity}")]
    NegativeStock {
        product_id: String,
        current: i64,
        quantity: i64,
    },

    /// Posted payments do not cover the sale total.
    #[error("cannot complete sale {sale_id}: missing payment of {missing} (total {total}, paid {paid})")]
    PaymentShortfall {
        sale_id: String,
        total: Money,
        paid: Money,
        missing: Money,
    },

    /// The sale is already fully paid; no further payments are accepted.
    #[error("sale {sale_id} is already paid (total {total}, paid {paid})")]
    AlreadyPaid {
        sale_id: String,
        total: Money,
        paid: Money,
    },

    /// A non-cash payment larger than the outstanding balance.
    #[error("payment of {amount} exceeds the outstanding balance {remaining}")]
    PaymentExceedsBalance { amount: Money, remaining: Money },

    /// A posted purchase cannot be voided once any of its batches was used.
    #[error("cannot void purchase {purchase_id}: batch {batch_id} already consumed")]
    BatchAlreadyConsumed {
        purchase_id: String,
        batch_id: String,
    },

    /// The actor may not perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Stored data violates an invariant. Indicates a prior bug; never
    /// auto-corrected.
    #[error("inconsistent data: {0}")]
    DataIntegrity(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an InvalidTransition error from any displayable status.
    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        status: impl std::fmt::Display,
        operation: &'static str,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            id: id.into(),
            status: status.to_string(),
            operation,
        }
    }

    /// Returns the error kind used by callers to decide how to react.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } | CoreError::NotFoundMany { .. } => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Forbidden { .. } => ErrorKind::Forbidden,
            CoreError::DataIntegrity(_) => ErrorKind::DataIntegrity,
            CoreError::InvalidTransition { .. }
            | CoreError::InsufficientFefoStock { .. }
            | CoreError::AllocationRace { .. }
            | CoreError::NegativeStock { .. }
            | CoreError::PaymentShortfall { .. }
            | CoreError::AlreadyPaid { .. }
            | CoreError::PaymentExceedsBalance { .. }
            | CoreError::BatchAlreadyConsumed { .. } => ErrorKind::Conflict,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a request is malformed, before any state is read.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// An amount computed from the request does not fit in cents.
    #[error("{field} is too large")]
    AmountOverflow { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same id appears more than once in one request.
    #[error("duplicate {field}: [{}]", values.join(", "))]
    Duplicate { field: String, values: Vec<String> },

    /// The request names a different set of ids than the aggregate holds.
    #[error("{field} mismatch: expected [{}], received [{}]", expected.join(", "), received.join(", "))]
    Mismatch {
        field: String,
        expected: Vec<String>,
        received: Vec<String>,
    },

    /// Perishable products must be received with explicit batches.
    #[error("perishable product {product_id} requires batches (purchase item {purchase_item_id})")]
    BatchesRequired {
        product_id: String,
        purchase_item_id: String,
    },

    /// A perishable batch without expiry, or an expiry not in the future.
    #[error("batch expiry for purchase item {purchase_item_id}: {reason}")]
    InvalidExpiry {
        purchase_item_id: String,
        reason: String,
    },

    /// Batch quantities do not add up to the ordered quantity.
    #[error("batch quantities for purchase item {purchase_item_id} sum to {sum}, expected {expected}")]
    BatchSumMismatch {
        purchase_item_id: String,
        sum: i64,
        expected: i64,
    },

    /// A manual batch hint names a batch that cannot be used.
    #[error("batch {batch_id} is not an available batch of product {product_id}")]
    UnknownBatchHint {
        product_id: String,
        batch_id: String,
    },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
