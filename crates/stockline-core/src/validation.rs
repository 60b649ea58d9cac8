//! # Validation Module
//!
//! Request validation for the sale and purchase lifecycles.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, before any database access)               │
//! │  ├── Empty lists, non-positive quantities, negative costs              │
//! │  ├── Duplicate ids inside one request                                  │
//! │  └── Batch specs vs. ordered quantity and perishability                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Lifecycle services (stockline-db)                            │
//! │  ├── Referenced entities exist and are active                          │
//! │  └── Aggregate state allows the transition                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on quantities                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{BatchSpec, NewPurchase, PostPurchaseItem, PurchaseItem, SaleLine};
use crate::{DEFAULT_SEARCH_LIMIT, MAX_ITEM_QUANTITY, MAX_SEARCH_LIMIT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scalar Validators
// =============================================================================

/// Validates that a quantity is strictly positive and at most
/// [`MAX_ITEM_QUANTITY`].
///
/// ## Example
/// ```rust
/// use stockline_core::validation::validate_quantity;
///
/// assert!(validate_quantity("quantity", 1).is_ok());
/// assert!(validate_quantity("quantity", 0).is_err());
/// assert!(validate_quantity("quantity", -3).is_err());
/// assert!(validate_quantity("quantity", 1_000_001).is_err());
/// ```
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a referenced id is present.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a payment amount. Zero and negative payments are rejected.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

/// Trims a free-text reason; blank becomes `None`.
pub fn normalize_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// `unit × quantity` for one document line.
pub fn line_amount(unit: Money, quantity: i64) -> ValidationResult<Money> {
    unit
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| ValidationError::AmountOverflow {
            field: "subtotal".to_string(),
        })
}

/// Adds one line amount to a running document total.
pub fn add_to_total(total: Money, amount: Money) -> ValidationResult<Money> {
    total
        .checked_add(amount)
        .ok_or_else(|| ValidationError::AmountOverflow {
            field: "total".to_string(),
        })
}

/// Clamps a requested page size into `1..=MAX_SEARCH_LIMIT`.
pub fn clamp_search_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT)
}

// =============================================================================
// Sale Requests
// =============================================================================

/// Validates draft sale lines and merges duplicate products.
///
/// Quantities of repeated products are summed; the merged line keeps the
/// position of the product's first appearance.
///
/// ## Example
/// ```rust
/// use stockline_core::types::SaleLine;
/// use stockline_core::validation::group_sale_lines;
///
/// let lines = vec![
///     SaleLine::new("p-2", 1),
///     SaleLine::new("p-1", 2),
///     SaleLine::new("p-2", 3),
/// ];
/// let grouped = group_sale_lines(&lines).unwrap();
/// assert_eq!(grouped, vec![SaleLine::new("p-2", 4), SaleLine::new("p-1", 2)]);
/// ```
pub fn group_sale_lines(lines: &[SaleLine]) -> ValidationResult<Vec<SaleLine>> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    let mut grouped: Vec<SaleLine> = Vec::with_capacity(lines.len());
    let mut position: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        validate_id("product_id", &line.product_id)?;
        validate_quantity("quantity", line.quantity)?;

        match position.get(line.product_id.as_str()) {
            Some(&idx) => {
                // Both parts are capped, so the sum cannot overflow.
                grouped[idx].quantity += line.quantity;
                validate_quantity("quantity", grouped[idx].quantity)?;
            }
            None => {
                position.insert(line.product_id.as_str(), grouped.len());
                grouped.push(line.clone());
            }
        }
    }

    Ok(grouped)
}

// =============================================================================
// Purchase Requests
// =============================================================================

/// Returns every value appearing more than once, sorted.
fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut dup = BTreeSet::new();
    for v in values {
        if !seen.insert(v) {
            dup.insert(v.to_string());
        }
    }
    dup.into_iter().collect()
}

/// Validates a draft purchase request.
///
/// ## Rules
/// - At least one item
/// - No product appears twice (all duplicates are listed)
/// - Quantity > 0, unit cost >= 0
pub fn validate_new_purchase(request: &NewPurchase) -> ValidationResult<()> {
    if request.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    let dup = duplicates(request.items.iter().map(|i| i.product_id.as_str()));
    if !dup.is_empty() {
        return Err(ValidationError::Duplicate {
            field: "product_id".to_string(),
            values: dup,
        });
    }

    for item in &request.items {
        validate_id("product_id", &item.product_id)?;
        validate_quantity("quantity", item.quantity)?;
        if item.unit_cost.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_cost".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates that a post request names exactly the purchase's items.
pub fn validate_post_purchase_items(
    request: &[PostPurchaseItem],
    items: &[PurchaseItem],
) -> ValidationResult<()> {
    if request.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    let dup = duplicates(request.iter().map(|i| i.purchase_item_id.as_str()));
    if !dup.is_empty() {
        return Err(ValidationError::Duplicate {
            field: "purchase_item_id".to_string(),
            values: dup,
        });
    }

    let expected: BTreeSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let received: BTreeSet<&str> = request.iter().map(|i| i.purchase_item_id.as_str()).collect();
    if expected != received {
        return Err(ValidationError::Mismatch {
            field: "purchase items".to_string(),
            expected: expected.into_iter().map(str::to_string).collect(),
            received: received.into_iter().map(str::to_string).collect(),
        });
    }

    Ok(())
}

/// Resolves the batches to create for one purchase item.
///
/// ## Rules
/// ```text
/// perishable?   specs?   result
/// ───────────   ──────   ─────────────────────────────────────────────
/// yes           none     BatchesRequired
/// yes           some     each spec needs expires_at > now
/// no            none     one implicit batch for the full quantity
/// no            some     any given expires_at must be > now
///
/// always: spec quantity > 0, Σ spec quantity == item quantity
/// ```
pub fn resolve_batch_specs(
    item: &PurchaseItem,
    perishable: bool,
    specs: &[BatchSpec],
    now: DateTime<Utc>,
) -> ValidationResult<Vec<BatchSpec>> {
    if specs.is_empty() {
        if perishable {
            return Err(ValidationError::BatchesRequired {
                product_id: item.product_id.clone(),
                purchase_item_id: item.id.clone(),
            });
        }
        return Ok(vec![BatchSpec {
            batch_code: None,
            expires_at: None,
            quantity: item.quantity,
        }]);
    }

    let mut sum: i64 = 0;
    for spec in specs {
        validate_quantity("batch quantity", spec.quantity)?;
        match spec.expires_at {
            None if perishable => {
                return Err(ValidationError::InvalidExpiry {
                    purchase_item_id: item.id.clone(),
                    reason: "perishable batches require an expiry date".to_string(),
                });
            }
            Some(expiry) if expiry <= now => {
                return Err(ValidationError::InvalidExpiry {
                    purchase_item_id: item.id.clone(),
                    reason: format!("expiry {} is not in the future", expiry.to_rfc3339()),
                });
            }
            _ => {}
        }
        sum = sum.saturating_add(spec.quantity);
    }

    if sum != item.quantity {
        return Err(ValidationError::BatchSumMismatch {
            purchase_item_id: item.id.clone(),
            sum,
            expected: item.quantity,
        });
    }

    Ok(specs.to_vec())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewPurchaseItem;
    use chrono::Duration;

    fn item(qty: i64) -> PurchaseItem {
        PurchaseItem {
            id: "pi-1".to_string(),
            purchase_id: "pu-1".to_string(),
            line_no: 0,
            product_id: "p-1".to_string(),
            quantity: qty,
            unit_cost: Money::from_cents(150),
            subtotal: Money::from_cents(150 * qty),
        }
    }

    fn spec(qty: i64, expires_at: Option<DateTime<Utc>>) -> BatchSpec {
        BatchSpec {
            batch_code: None,
            expires_at,
            quantity: qty,
        }
    }

    fn purchase_item(product: &str, qty: i64, cost: i64) -> NewPurchaseItem {
        NewPurchaseItem {
            product_id: product.to_string(),
            quantity: qty,
            unit_cost: Money::from_cents(cost),
        }
    }

    #[test]
    fn test_document_amounts_reject_overflow() {
        let price = Money::from_cents(1_000_000);
        assert_eq!(line_amount(price, 3).unwrap(), Money::from_cents(3_000_000));
        assert!(matches!(
            line_amount(price, i64::MAX / 2),
            Err(ValidationError::AmountOverflow { .. })
        ));

        let near_max = Money::from_cents(i64::MAX - 1);
        assert!(matches!(
            add_to_total(near_max, Money::from_cents(2)),
            Err(ValidationError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_quantity_is_capped() {
        assert!(validate_quantity("quantity", MAX_ITEM_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity("quantity", MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange { max: MAX_ITEM_QUANTITY, .. })
        ));
        assert!(validate_quantity("quantity", i64::MAX / 2).is_err());
    }

    #[test]
    fn test_group_sale_lines_caps_merged_quantity() {
        let half = MAX_ITEM_QUANTITY / 2 + 1;
        let lines = vec![SaleLine::new("p-1", half), SaleLine::new("p-1", half)];
        assert!(matches!(
            group_sale_lines(&lines),
            Err(ValidationError::OutOfRange { .. })
        ));

        let lines = vec![SaleLine::new("p-1", half), SaleLine::new("p-1", half - 2)];
        assert_eq!(group_sale_lines(&lines).unwrap()[0].quantity, MAX_ITEM_QUANTITY);
    }

    #[test]
    fn test_group_sale_lines_rejects_empty_and_non_positive() {
        assert!(matches!(
            group_sale_lines(&[]),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            group_sale_lines(&[SaleLine::new("p-1", 0)]),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_new_purchase_lists_all_duplicates() {
        let request = NewPurchase {
            items: vec![
                purchase_item("b", 1, 10),
                purchase_item("a", 1, 10),
                purchase_item("b", 2, 10),
                purchase_item("a", 3, 10),
            ],
            ..Default::default()
        };
        match validate_new_purchase(&request) {
            Err(ValidationError::Duplicate { values, .. }) => {
                assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected Duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_new_purchase_cost_and_quantity() {
        let negative_cost = NewPurchase {
            items: vec![purchase_item("a", 1, -1)],
            ..Default::default()
        };
        assert!(matches!(
            validate_new_purchase(&negative_cost),
            Err(ValidationError::MustNotBeNegative { .. })
        ));

        let zero_qty = NewPurchase {
            items: vec![purchase_item("a", 0, 100)],
            ..Default::default()
        };
        assert!(validate_new_purchase(&zero_qty).is_err());

        let free_item = NewPurchase {
            items: vec![purchase_item("a", 5, 0)],
            ..Default::default()
        };
        assert!(validate_new_purchase(&free_item).is_ok());
    }

    #[test]
    fn test_post_purchase_items_must_match() {
        let items = vec![item(5)];
        let post = |id: &str| PostPurchaseItem {
            purchase_item_id: id.to_string(),
            batches: vec![],
        };

        assert!(validate_post_purchase_items(&[post("pi-1")], &items).is_ok());
        assert!(matches!(
            validate_post_purchase_items(&[], &items),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_post_purchase_items(&[post("pi-1"), post("pi-1")], &items),
            Err(ValidationError::Duplicate { .. })
        ));
        assert!(matches!(
            validate_post_purchase_items(&[post("pi-9")], &items),
            Err(ValidationError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_resolve_implicit_batch_for_non_perishable() {
        let now = Utc::now();
        let specs = resolve_batch_specs(&item(12), false, &[], now).unwrap();
        assert_eq!(specs, vec![spec(12, None)]);
    }

    #[test]
    fn test_resolve_perishable_rules() {
        let now = Utc::now();
        let future = Some(now + Duration::days(30));

        assert!(matches!(
            resolve_batch_specs(&item(20), true, &[], now),
            Err(ValidationError::BatchesRequired { .. })
        ));
        assert!(matches!(
            resolve_batch_specs(&item(20), true, &[spec(20, None)], now),
            Err(ValidationError::InvalidExpiry { .. })
        ));
        assert!(matches!(
            resolve_batch_specs(&item(20), true, &[spec(20, Some(now))], now),
            Err(ValidationError::InvalidExpiry { .. })
        ));
        assert_eq!(
            resolve_batch_specs(&item(20), true, &[spec(20, future)], now)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_resolve_rejects_past_expiry_even_when_not_perishable() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        assert!(resolve_batch_specs(&item(5), false, &[spec(5, past)], now).is_err());
    }

    #[test]
    fn test_resolve_batch_sum_must_match() {
        let now = Utc::now();
        let future = Some(now + Duration::days(3));
        assert!(matches!(
            resolve_batch_specs(&item(10), false, &[spec(4, future), spec(5, None)], now),
            Err(ValidationError::BatchSumMismatch { sum: 9, expected: 10, .. })
        ));
        assert!(matches!(
            resolve_batch_specs(&item(10), false, &[spec(10, None), spec(0, None)], now),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_normalize_reason_and_limit() {
        assert_eq!(normalize_reason(Some("  damaged ")), Some("damaged".to_string()));
        assert_eq!(normalize_reason(Some("   ")), None);
        assert_eq!(normalize_reason(None), None);

        assert_eq!(clamp_search_limit(None), DEFAULT_SEARCH_LIMIT);
        assert_eq!(clamp_search_limit(Some(0)), 1);
        assert_eq!(clamp_search_limit(Some(5000)), MAX_SEARCH_LIMIT);
    }
}
