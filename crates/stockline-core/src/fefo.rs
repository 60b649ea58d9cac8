//! # FEFO Batch Allocator
//!
//! First-Expiring-First-Out selection of product batches for a sale.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FEFO KEY: (expires_at ASC NULLS LAST, received_at ASC, id ASC)         │
//! │                                                                         │
//! │  B3 exp +5d  ─┐                                                         │
//! │  B1 exp +10d ─┼──► sort_fefo ──► [B3, B1, B7]                           │
//! │  B7 no expiry ┘                                                         │
//! │                                                                         │
//! │  allocate(required = 12) over [B3:5, B1:5, B7:5]                        │
//! │      take 5 from B3, 5 from B1, 2 from B7                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two-Step Discipline
//! 1. [`check_available`] runs before any mutation and produces the
//!    user-facing "insufficient FEFO stock" conflict.
//! 2. [`allocate`] consumes greedily. If candidates still run short, it
//!    reports a race and leaves the batches untouched, so nothing partial
//!    can be persisted.

use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::ProductBatch;

/// Units taken from one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Take {
    pub batch_id: String,
    pub quantity: i64,
}

/// Compares two batches by the FEFO key.
pub fn fefo_cmp(a: &ProductBatch, b: &ProductBatch) -> Ordering {
    let by_expiry = match (a.expires_at, b.expires_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.received_at.cmp(&b.received_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts candidates into FEFO order.
pub fn sort_fefo(batches: &mut [ProductBatch]) {
    batches.sort_by(fefo_cmp);
}

/// Total units available across candidates.
pub fn available_quantity(batches: &[ProductBatch]) -> i64 {
    batches.iter().map(|b| b.qty_available.max(0)).sum()
}

/// Fails with `InsufficientFefoStock` when the candidates cannot cover
/// `required`. An empty candidate list has zero available.
pub fn check_available(
    product_id: &str,
    required: i64,
    batches: &[ProductBatch],
) -> CoreResult<()> {
    let available = available_quantity(batches);
    if available < required {
        return Err(CoreError::InsufficientFefoStock {
            product_id: product_id.to_string(),
            available,
            required,
        });
    }
    Ok(())
}

/// Moves hinted batches to the front, in hint order, keeping the rest in
/// their current (FEFO) order.
///
/// A hint naming a batch that is not among the candidates is rejected.
/// Repeated hints for the same batch are ignored after the first.
pub fn apply_hints(
    product_id: &str,
    batches: &mut Vec<ProductBatch>,
    hinted_ids: &[&str],
) -> CoreResult<()> {
    if hinted_ids.is_empty() {
        return Ok(());
    }

    let mut front = Vec::with_capacity(hinted_ids.len());
    for id in hinted_ids {
        if front.iter().any(|b: &ProductBatch| b.id == *id) {
            continue;
        }
        let idx = batches.iter().position(|b| b.id == *id).ok_or_else(|| {
            ValidationError::UnknownBatchHint {
                product_id: product_id.to_string(),
                batch_id: id.to_string(),
            }
        })?;
        front.push(batches.remove(idx));
    }

    front.append(batches);
    *batches = front;
    Ok(())
}

/// Greedily consumes `required` units from `batches` in their current order.
///
/// On success each touched batch has its `qty_available` reduced and one
/// [`Take`] is returned per batch. On shortfall the batches are left as they
/// were and `AllocationRace` is returned.
pub fn allocate(
    product_id: &str,
    required: i64,
    batches: &mut [ProductBatch],
) -> CoreResult<Vec<Take>> {
    let mut remaining = required;
    let mut takes = Vec::new();

    for batch in batches.iter() {
        if remaining <= 0 {
            break;
        }
        if batch.qty_available <= 0 {
            continue;
        }
        let take = remaining.min(batch.qty_available);
        takes.push(Take {
            batch_id: batch.id.clone(),
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(CoreError::AllocationRace {
            product_id: product_id.to_string(),
            missing: remaining,
        });
    }

    for take in &takes {
        if let Some(batch) = batches.iter_mut().find(|b| b.id == take.batch_id) {
            batch.qty_available -= take.quantity;
        }
    }

    Ok(takes)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn batch(id: &str, expiry_days: Option<i64>, received_days: i64, qty: i64) -> ProductBatch {
        ProductBatch {
            id: id.to_string(),
            product_id: "p-1".to_string(),
            purchase_item_id: None,
            batch_code: None,
            expires_at: expiry_days.map(|d| base() + Duration::days(d)),
            received_at: base() + Duration::days(received_days),
            qty_initial: qty,
            qty_available: qty,
            unit_cost: Money::from_cents(100),
        }
    }

    fn ids(batches: &[ProductBatch]) -> Vec<&str> {
        batches.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_nulls_last_earliest_first() {
        let mut batches = vec![
            batch("b-10d", Some(10), 0, 5),
            batch("b-null", None, 0, 5),
            batch("b-5d", Some(5), 0, 5),
        ];
        sort_fefo(&mut batches);
        assert_eq!(ids(&batches), vec!["b-5d", "b-10d", "b-null"]);
    }

    #[test]
    fn test_ties_break_on_received_then_id() {
        let mut batches = vec![
            batch("b-2", Some(5), 1, 1),
            batch("b-3", Some(5), 0, 1),
            batch("b-1", Some(5), 1, 1),
        ];
        sort_fefo(&mut batches);
        assert_eq!(ids(&batches), vec!["b-3", "b-1", "b-2"]);
    }

    #[test]
    fn test_check_available_reports_totals() {
        let batches = vec![batch("a", Some(1), 0, 4), batch("b", Some(2), 0, 5)];
        let err = check_available("p-1", 10, &batches).unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient FEFO stock for product p-1: disponible=9, requerido=10"
        );
        assert!(check_available("p-1", 9, &batches).is_ok());
    }

    #[test]
    fn test_check_available_without_candidates() {
        let err = check_available("p-1", 1, &[]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientFefoStock { available: 0, required: 1, .. }
        ));
    }

    #[test]
    fn test_allocate_spans_batches() {
        let mut batches = vec![batch("a", Some(1), 0, 4), batch("b", Some(2), 0, 5)];
        let takes = allocate("p-1", 6, &mut batches).unwrap();
        assert_eq!(
            takes,
            vec![
                Take { batch_id: "a".to_string(), quantity: 4 },
                Take { batch_id: "b".to_string(), quantity: 2 },
            ]
        );
        assert_eq!(batches[0].qty_available, 0);
        assert_eq!(batches[1].qty_available, 3);
    }

    #[test]
    fn test_allocate_shortfall_leaves_batches_untouched() {
        let mut batches = vec![batch("a", Some(1), 0, 4), batch("b", Some(2), 0, 5)];
        let err = allocate("p-1", 10, &mut batches).unwrap_err();
        assert!(matches!(err, CoreError::AllocationRace { missing: 1, .. }));
        assert_eq!(batches[0].qty_available, 4);
        assert_eq!(batches[1].qty_available, 5);
    }

    #[test]
    fn test_apply_hints_moves_named_batches_first() {
        let mut batches = vec![
            batch("a", Some(1), 0, 1),
            batch("b", Some(2), 0, 1),
            batch("c", Some(3), 0, 1),
        ];
        apply_hints("p-1", &mut batches, &["c", "b", "c"]).unwrap();
        assert_eq!(ids(&batches), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_apply_hints_rejects_unknown_batch() {
        let mut batches = vec![batch("a", Some(1), 0, 1)];
        let err = apply_hints("p-1", &mut batches, &["zz"]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::UnknownBatchHint { .. })
        ));
        assert_eq!(ids(&batches), vec!["a"]);
    }

    fn arb_batches() -> impl Strategy<Value = Vec<ProductBatch>> {
        prop::collection::vec((prop::option::of(0i64..60), 0i64..30, 0i64..20), 0..8).prop_map(
            |specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (exp, recv, qty))| batch(&format!("b-{:02}", i), exp, recv, qty))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_allocation_covers_exactly_what_was_asked(
            mut batches in arb_batches(),
            required in 1i64..100,
        ) {
            sort_fefo(&mut batches);
            let before = batches.clone();
            let total = available_quantity(&batches);

            match allocate("p-1", required, &mut batches) {
                Ok(takes) => {
                    prop_assert!(required <= total);
                    let taken: i64 = takes.iter().map(|t| t.quantity).sum();
                    prop_assert_eq!(taken, required);
                    for take in &takes {
                        prop_assert!(take.quantity > 0);
                        let b = before.iter().find(|b| b.id == take.batch_id).unwrap();
                        prop_assert!(take.quantity <= b.qty_available);
                    }
                    prop_assert_eq!(available_quantity(&batches), total - required);
                }
                Err(_) => {
                    prop_assert!(required > total);
                    prop_assert_eq!(&batches, &before);
                }
            }
        }

        #[test]
        fn prop_earlier_batches_are_drained_first(
            mut batches in arb_batches(),
            required in 1i64..100,
        ) {
            sort_fefo(&mut batches);
            if let Ok(takes) = allocate("p-1", required, &mut batches) {
                // every take except the last empties its batch
                for take in takes.iter().take(takes.len().saturating_sub(1)) {
                    let b = batches.iter().find(|b| b.id == take.batch_id).unwrap();
                    prop_assert_eq!(b.qty_available, 0);
                }
            }
        }

        #[test]
        fn prop_sorted_order_respects_fefo_key(mut batches in arb_batches()) {
            sort_fefo(&mut batches);
            for pair in batches.windows(2) {
                prop_assert_ne!(fefo_cmp(&pair[0], &pair[1]), Ordering::Greater);
            }
        }
    }
}
