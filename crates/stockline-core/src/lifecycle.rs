//! # Lifecycle Transition Rules
//!
//! Decides, from the current status alone, whether a requested transition
//! applies, is already done (idempotent no-op), or is a conflict.
//!
//! ```text
//! Sale          post        complete     void
//! ─────────     ─────────   ──────────   ─────────
//! DRAFT         Apply       Conflict     Apply
//! ACTIVE        AlreadyDone Apply        Apply
//! COMPLETED     AlreadyDone AlreadyDone  Conflict
//! VOIDED        Conflict    Conflict     AlreadyDone
//!
//! Purchase      post        void
//! ─────────     ─────────   ─────────
//! DRAFT         Apply       Apply
//! POSTED        AlreadyDone Apply
//! VOIDED        Conflict    AlreadyDone
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{Purchase, PurchaseStatus, Sale, SaleStatus};

/// Outcome of a transition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Perform the transition.
    Apply,
    /// Target state already reached; return current state unchanged.
    AlreadyDone,
}

fn sale_conflict(sale: &Sale, operation: &'static str) -> CoreError {
    CoreError::invalid_transition("Sale", &sale.id, sale.status, operation)
}

fn purchase_conflict(purchase: &Purchase, operation: &'static str) -> CoreError {
    CoreError::invalid_transition("Purchase", &purchase.id, purchase.status, operation)
}

pub fn check_post_sale(sale: &Sale) -> CoreResult<Transition> {
    match sale.status {
        SaleStatus::Draft => Ok(Transition::Apply),
        SaleStatus::Active | SaleStatus::Completed => Ok(Transition::AlreadyDone),
        SaleStatus::Voided => Err(sale_conflict(sale, "post")),
    }
}

pub fn check_complete_sale(sale: &Sale) -> CoreResult<Transition> {
    match sale.status {
        SaleStatus::Active => Ok(Transition::Apply),
        SaleStatus::Completed => Ok(Transition::AlreadyDone),
        SaleStatus::Draft | SaleStatus::Voided => Err(sale_conflict(sale, "complete")),
    }
}

pub fn check_void_sale(sale: &Sale) -> CoreResult<Transition> {
    match sale.status {
        SaleStatus::Draft | SaleStatus::Active => Ok(Transition::Apply),
        SaleStatus::Voided => Ok(Transition::AlreadyDone),
        SaleStatus::Completed => Err(sale_conflict(sale, "void")),
    }
}

/// Payments are accepted only while the sale is ACTIVE.
pub fn check_accepts_payment(sale: &Sale) -> CoreResult<()> {
    match sale.status {
        SaleStatus::Active => Ok(()),
        _ => Err(sale_conflict(sale, "accept payments")),
    }
}

pub fn check_post_purchase(purchase: &Purchase) -> CoreResult<Transition> {
    match purchase.status {
        PurchaseStatus::Draft => Ok(Transition::Apply),
        PurchaseStatus::Posted => Ok(Transition::AlreadyDone),
        PurchaseStatus::Voided => Err(purchase_conflict(purchase, "post")),
    }
}

pub fn check_void_purchase(purchase: &Purchase) -> CoreResult<Transition> {
    match purchase.status {
        PurchaseStatus::Draft | PurchaseStatus::Posted => Ok(Transition::Apply),
        PurchaseStatus::Voided => Ok(Transition::AlreadyDone),
    }
}

/// Void reason for a sale: the trimmed caller text, or `Sale #{id} voided`.
pub fn sale_void_reason(sale_id: &str, reason: Option<&str>) -> String {
    crate::validation::normalize_reason(reason).unwrap_or_else(|| format!("Sale #{} voided", sale_id))
}

/// Void reason for a purchase: the trimmed caller text, or `Purchase voided`.
pub fn purchase_void_reason(reason: Option<&str>) -> String {
    crate::validation::normalize_reason(reason).unwrap_or_else(|| "Purchase voided".to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================
