//! # Payment Gate
//!
//! Completion is gated on POSTED payments covering the sale total.
//!
//! ```text
//! total 100.00, posted payments [40.00, 60.00]
//!     │
//!     ▼
//! completion_shortfall(total, paid) == 0  ──► ACTIVE → COMPLETED allowed
//! ```
//!
//! Payment acceptance (split tender):
//! - non-cash payments may not exceed the remaining balance
//! - cash may exceed it; the excess becomes change and only the balance is
//!   applied to the sale

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethod, Sale};
use crate::validation::validate_payment_amount;

/// Amount still missing to cover `total`. Zero when fully paid.
#[inline]
pub fn completion_shortfall(total: Money, paid: Money) -> Money {
    total.saturating_remaining(paid)
}

/// Fails with `PaymentShortfall` unless `paid >= sale.total`.
pub fn ensure_fully_paid(sale: &Sale, paid: Money) -> CoreResult<()> {
    let missing = completion_shortfall(sale.total, paid);
    if missing.is_positive() {
        return Err(CoreError::PaymentShortfall {
            sale_id: sale.id.clone(),
            total: sale.total,
            paid,
            missing,
        });
    }
    Ok(())
}

/// How an accepted payment is split between the sale and change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedPayment {
    /// Applied to the sale balance.
    pub applied: Money,
    /// Handed back to the customer (cash only).
    pub change: Money,
}

/// Decides whether a new payment is acceptable given what is already paid.
pub fn evaluate_payment(
    sale: &Sale,
    already_paid: Money,
    amount: Money,
    method: PaymentMethod,
) -> CoreResult<AcceptedPayment> {
    validate_payment_amount(amount)?;

    let remaining = completion_shortfall(sale.total, already_paid);
    if remaining.is_zero() {
        return Err(CoreError::AlreadyPaid {
            sale_id: sale.id.clone(),
            total: sale.total,
            paid: already_paid,
        });
    }

    if amount <= remaining {
        return Ok(AcceptedPayment {
            applied: amount,
            change: Money::zero(),
        });
    }

    match method {
        PaymentMethod::Cash => Ok(AcceptedPayment {
            applied: remaining,
            change: amount - remaining,
        }),
        _ => Err(CoreError::PaymentExceedsBalance { amount, remaining }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::SaleStatus;
    use chrono::Utc;

    fn sale(total: i64) -> Sale {
        let now = Utc::now();
        Sale {
            id: "s-1".to_string(),
            status: SaleStatus::Active,
            customer_id: "c-1".to_string(),
            sale_date: now,
            total: Money::from_cents(total),
            created_at: now,
            created_by: "u-1".to_string(),
            posted_at: Some(now),
            posted_by: Some("u-1".to_string()),
            completed_at: None,
            completed_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_gate_exact_and_short() {
        let s = sale(1000);
        assert!(ensure_fully_paid(&s, Money::from_cents(1000)).is_ok());
        assert!(ensure_fully_paid(&s, Money::from_cents(1200)).is_ok());

        let err = ensure_fully_paid(&s, Money::from_cents(999)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(err, CoreError::PaymentShortfall { missing, .. } if missing.cents() == 1));
    }

    #[test]
    fn test_zero_total_needs_no_payment() {
        assert!(ensure_fully_paid(&sale(0), Money::zero()).is_ok());
    }

    #[test]
    fn test_card_within_balance() {
        let accepted =
            evaluate_payment(&sale(1000), Money::from_cents(300), Money::from_cents(700), PaymentMethod::Card)
                .unwrap();
        assert_eq!(accepted.applied.cents(), 700);
        assert!(accepted.change.is_zero());
    }

    #[test]
    fn test_card_over_balance_rejected() {
        let err = evaluate_payment(&sale(1000), Money::zero(), Money::from_cents(1001), PaymentMethod::Card)
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentExceedsBalance { .. }));
    }

    #[test]
    fn test_cash_over_balance_gives_change() {
        let accepted =
            evaluate_payment(&sale(1000), Money::from_cents(400), Money::from_cents(1000), PaymentMethod::Cash)
                .unwrap();
        assert_eq!(accepted.applied.cents(), 600);
        assert_eq!(accepted.change.cents(), 400);
    }

    #[test]
    fn test_already_paid_and_non_positive() {
        let err = evaluate_payment(&sale(1000), Money::from_cents(1000), Money::from_cents(1), PaymentMethod::Cash)
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyPaid { .. }));

        let err = evaluate_payment(&sale(1000), Money::zero(), Money::zero(), PaymentMethod::Cash).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
