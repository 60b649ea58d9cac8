//! # Void Authorization
//!
//! Who may void a sale, and until when.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ADMIN      ──► always                                                  │
//! │  SELLER     ──► own sales only, while now <= base + window              │
//! │                 base = posted_at, or sale_date for drafts               │
//! │  anyone else ─► never                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Purchase voids carry no role restriction here.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, Role, Sale};

/// Why a void was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoidDenial {
    /// Actor holds neither ADMIN nor SELLER.
    Role,
    /// SELLER acting on a sale created by someone else.
    NotOwner,
    /// SELLER past the void window.
    WindowElapsed { deadline: DateTime<Utc> },
}

impl VoidDenial {
    pub fn reason(&self) -> String {
        match self {
            VoidDenial::Role => "role not allowed to void sales".to_string(),
            VoidDenial::NotOwner => "sellers may only void their own sales".to_string(),
            VoidDenial::WindowElapsed { deadline } => {
                format!("void window elapsed at {}", deadline.to_rfc3339())
            }
        }
    }
}

/// The instant the void window is measured from.
#[inline]
pub fn void_window_base(sale: &Sale) -> DateTime<Utc> {
    sale.posted_at.unwrap_or(sale.sale_date)
}

/// Evaluates the void rules and reports the first reason for refusal.
pub fn check_void(
    actor: &Actor,
    sale: &Sale,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), VoidDenial> {
    if actor.has_role(Role::Admin) {
        return Ok(());
    }
    if !actor.has_role(Role::Seller) {
        return Err(VoidDenial::Role);
    }
    if sale.created_by != actor.user_id {
        return Err(VoidDenial::NotOwner);
    }
    // A deadline beyond the representable range never elapses.
    if let Some(deadline) = void_window_base(sale).checked_add_signed(window) {
        if now > deadline {
            return Err(VoidDenial::WindowElapsed { deadline });
        }
    }
    Ok(())
}

/// Capability check: may `actor` void `sale` at `now`?
pub fn can_void(actor: &Actor, sale: &Sale, now: DateTime<Utc>, window: Duration) -> bool {
    check_void(actor, sale, now, window).is_ok()
}

/// Like [`can_void`], failing with `Forbidden` and the refusal reason.
pub fn authorize_void(
    actor: &Actor,
    sale: &Sale,
    now: DateTime<Utc>,
    window: Duration,
) -> CoreResult<()> {
    check_void(actor, sale, now, window).map_err(|denial| CoreError::Forbidden {
        reason: denial.reason(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::money::Money;
    use crate::types::SaleStatus;

    fn posted_sale(created_by: &str, posted_hours_ago: i64, now: DateTime<Utc>) -> Sale {
        Sale {
            id: "s-1".to_string(),
            status: SaleStatus::Active,
            customer_id: "c-1".to_string(),
            sale_date: now - Duration::hours(posted_hours_ago + 1),
            total: Money::from_cents(500),
            created_at: now - Duration::hours(posted_hours_ago + 1),
            created_by: created_by.to_string(),
            posted_at: Some(now - Duration::hours(posted_hours_ago)),
            posted_by: Some(created_by.to_string()),
            completed_at: None,
            completed_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_seller_within_window() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 23, now);
        assert!(can_void(&Actor::seller("u-1"), &sale, now, Duration::hours(24)));
    }

    #[test]
    fn test_seller_after_window() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 25, now);
        let err = authorize_void(&Actor::seller("u-1"), &sale, now, Duration::hours(24)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_window_measured_from_posting() {
        let now = Utc::now();
        // sale_date is 24h+ ago, but posting was 23h ago
        let mut sale = posted_sale("u-1", 23, now);
        sale.sale_date = now - Duration::hours(48);
        assert!(can_void(&Actor::seller("u-1"), &sale, now, Duration::hours(24)));

        // drafts fall back to sale_date
        sale.posted_at = None;
        assert!(!can_void(&Actor::seller("u-1"), &sale, now, Duration::hours(24)));
    }

    #[test]
    fn test_seller_cannot_void_others_sales() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 1, now);
        assert_eq!(
            check_void(&Actor::seller("u-2"), &sale, now, Duration::hours(24)),
            Err(VoidDenial::NotOwner)
        );
    }

    #[test]
    fn test_admin_always_and_warehouse_never() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 500, now);
        assert!(can_void(&Actor::admin("boss"), &sale, now, Duration::hours(24)));
        assert_eq!(
            check_void(&Actor::warehouse("u-1"), &sale, now, Duration::hours(24)),
            Err(VoidDenial::Role)
        );
    }

    #[test]
    fn test_unbounded_window_never_elapses() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 24 * 365 * 50, now);
        let huge = Duration::milliseconds(i64::MAX);
        assert!(can_void(&Actor::seller("u-1"), &sale, now, huge));
    }

    #[test]
    fn test_configurable_window() {
        let now = Utc::now();
        let sale = posted_sale("u-1", 30, now);
        assert!(!can_void(&Actor::seller("u-1"), &sale, now, Duration::hours(24)));
        assert!(can_void(&Actor::seller("u-1"), &sale, now, Duration::hours(48)));
    }
}
