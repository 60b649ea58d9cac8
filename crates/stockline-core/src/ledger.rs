//! # Stock Ledger Primitives
//!
//! Counter arithmetic for `Product.stock` and `ProductBatch.qty_available`,
//! plus the movement drafts that record every change.
//!
//! ## One Event, One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  post_sale(S-1)                                                         │
//! │     │                                                                   │
//! │     ├── decrement_stock(P-A, 3)  → StockChange { 10 → 7 }               │
//! │     ├── decrement_stock(P-B, 1)  → StockChange {  4 → 3 }               │
//! │     │                                                                   │
//! │     └── MovementDraft::sale_out(S-1, actor, [changes])                  │
//! │            header: OUT / SALE / SALE_OUT                                │
//! │            items:  P-A 3 (10→7), P-B 1 (4→3)   ← ascending product id   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Counters never go negative; a decrement that would is a conflict and the
//! surrounding transaction is abandoned.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{InventoryEventType, MovementDirection, SourceType};

// =============================================================================
// Stock Counters
// =============================================================================

/// Result of one counter mutation, captured for the movement item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Compare-and-decrement: fails instead of producing a negative counter.
///
/// ## Example
/// ```rust
/// use stockline_core::ledger::decrement_stock;
///
/// let change = decrement_stock("p-1", 10, 3).unwrap();
/// assert_eq!((change.previous_stock, change.new_stock), (10, 7));
/// assert!(decrement_stock("p-1", 2, 3).is_err());
/// ```
pub fn decrement_stock(product_id: &str, current: i64, quantity: i64) -> CoreResult<StockChange> {
    if quantity < 0 || current < quantity {
        return Err(CoreError::NegativeStock {
            product_id: product_id.to_string(),
            current,
            quantity,
        });
    }
    Ok(StockChange {
        product_id: product_id.to_string(),
        quantity,
        previous_stock: current,
        new_stock: current - quantity,
    })
}

/// Adds units back to a counter.
pub fn increment_stock(product_id: &str, current: i64, quantity: i64) -> CoreResult<StockChange> {
    let new_stock = current
        .checked_add(quantity)
        .filter(|_| quantity >= 0)
        .ok_or_else(|| {
            CoreError::DataIntegrity(format!(
                "cannot add {} units to stock {} of product {}",
                quantity, current, product_id
            ))
        })?;
    Ok(StockChange {
        product_id: product_id.to_string(),
        quantity,
        previous_stock: current,
        new_stock,
    })
}

/// New `qty_available` after returning `quantity` units to a batch, never
/// above `qty_initial`.
pub fn restore_batch_quantity(qty_available: i64, qty_initial: i64, quantity: i64) -> i64 {
    qty_available.saturating_add(quantity).min(qty_initial)
}

/// Sums quantities per product, ordered by product id.
///
/// This order doubles as the product lock order and the movement item order.
pub fn aggregate_by_product<'a>(
    entries: impl IntoIterator<Item = (&'a str, i64)>,
) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for (product_id, qty) in entries {
        *totals.entry(product_id.to_string()).or_insert(0) += qty;
    }
    totals
}

// =============================================================================
// Movement Drafts
// =============================================================================

/// An inventory movement ready to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub direction: MovementDirection,
    pub source_type: SourceType,
    pub source_id: String,
    pub event_type: InventoryEventType,
    pub actor_id: String,
    pub reason: Option<String>,
    /// Sorted by product id.
    pub items: Vec<StockChange>,
}

impl MovementDraft {
    fn build(
        direction: MovementDirection,
        source_type: SourceType,
        event_type: InventoryEventType,
        source_id: &str,
        actor_id: &str,
        reason: Option<String>,
        mut items: Vec<StockChange>,
    ) -> Self {
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        MovementDraft {
            direction,
            source_type,
            source_id: source_id.to_string(),
            event_type,
            actor_id: actor_id.to_string(),
            reason,
            items,
        }
    }

    pub fn sale_out(sale_id: &str, actor_id: &str, items: Vec<StockChange>) -> Self {
        Self::build(
            MovementDirection::Out,
            SourceType::Sale,
            InventoryEventType::SaleOut,
            sale_id,
            actor_id,
            None,
            items,
        )
    }

    pub fn sale_void_in(
        sale_id: &str,
        actor_id: &str,
        reason: String,
        items: Vec<StockChange>,
    ) -> Self {
        Self::build(
            MovementDirection::In,
            SourceType::Sale,
            InventoryEventType::SaleVoidIn,
            sale_id,
            actor_id,
            Some(reason),
            items,
        )
    }

    pub fn purchase_in(purchase_id: &str, actor_id: &str, items: Vec<StockChange>) -> Self {
        Self::build(
            MovementDirection::In,
            SourceType::Purchase,
            InventoryEventType::PurchaseIn,
            purchase_id,
            actor_id,
            None,
            items,
        )
    }

    pub fn purchase_return_out(
        purchase_id: &str,
        actor_id: &str,
        reason: String,
        items: Vec<StockChange>,
    ) -> Self {
        Self::build(
            MovementDirection::Out,
            SourceType::Purchase,
            InventoryEventType::PurchaseReturnOut,
            purchase_id,
            actor_id,
            Some(reason),
            items,
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
