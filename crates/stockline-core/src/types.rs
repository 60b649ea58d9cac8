//! # Domain Types
//!
//! Core domain types used throughout Stockline.
//!
//! ## Aggregate Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Sale ──owns──► SaleDetail ──owns──► SaleBatchAllocation ──refs──┐      │
//! │   │                                                              │      │
//! │   └──► Payment, SaleStatusHistory                                │      │
//! │                                                                  ▼      │
//! │  Product ──owns──► ProductBatch ◄──created by── PurchaseItem            │
//! │   │ stock = Σ batch.qty_available                     ▲                 │
//! │   │                                                   │                 │
//! │   │                                       Purchase ──owns               │
//! │   ▼                                                                     │
//! │  InventoryMovement ──owns──► InventoryMovementItem (append-only)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity uses a UUID v4 string `id`. Quantities are whole units (`i64`),
//! amounts are [`Money`] (integer cents).
//!
//! ## Storage Mapping
//! With the `sqlx` feature, entities derive `sqlx::FromRow` and status enums
//! derive `sqlx::Type`, stored as upper-case text (`DRAFT`, `SALE_OUT`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Catalog
// =============================================================================

/// A sellable product with its denormalized stock counter.
///
/// `stock` always equals the sum of `qty_available` over the product's
/// batches once a transaction has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Current list price, snapshotted into sale details.
    pub price: Money,
    pub stock: i64,
    /// Perishable products must be received with explicit, dated batches.
    pub perishable: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product Batch
// =============================================================================

/// A lot of one product received by a purchase.
///
/// ## Invariants
/// - `0 <= qty_available <= qty_initial`
/// - `qty_initial` never changes after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    pub purchase_item_id: Option<String>,
    pub batch_code: Option<String>,
    /// `None` sorts after every dated batch in FEFO order.
    pub expires_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
    pub qty_initial: i64,
    pub qty_available: i64,
    pub unit_cost: Money,
}

impl ProductBatch {
    /// True once any unit of the batch has left stock.
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.qty_available < self.qty_initial
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle state of a sale.
///
/// ```text
///   DRAFT ──post──► ACTIVE ──complete──► COMPLETED
///     │               │
///     └────void───────┴──void──► VOIDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SaleStatus {
    /// Created, no inventory effect yet.
    Draft,
    /// Posted: stock consumed, awaiting full payment.
    Active,
    /// Fully paid. Terminal.
    Completed,
    /// Cancelled. Terminal.
    Voided,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "DRAFT",
            SaleStatus::Active => "ACTIVE",
            SaleStatus::Completed => "COMPLETED",
            SaleStatus::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub status: SaleStatus,
    pub customer_id: String,
    pub sale_date: DateTime<Utc>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<String>,
    pub void_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One product line of a sale. Duplicate request lines are merged into one
/// detail before persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleDetail {
    pub id: String,
    pub sale_id: String,
    /// Position of the product's first appearance in the request.
    pub line_no: i64,
    pub product_id: String,
    pub quantity: i64,
    /// Price snapshot taken at draft creation.
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Units of one batch consumed by one sale detail. Created at posting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleBatchAllocation {
    pub id: String,
    pub sale_detail_id: String,
    pub batch_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// One row per actual status change of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleStatusHistory {
    pub id: String,
    pub sale_id: String,
    pub from_status: SaleStatus,
    pub to_status: SaleStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub reason: Option<String>,
}

// =============================================================================
// Purchase
// =============================================================================

/// Lifecycle state of a purchase.
///
/// ```text
///   DRAFT ──post──► POSTED
///     │               │
///     └────void───────┴──void──► VOIDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PurchaseStatus {
    Draft,
    Posted,
    Voided,
}

impl PurchaseStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "DRAFT",
            PurchaseStatus::Posted => "POSTED",
            PurchaseStatus::Voided => "VOIDED",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of supplier document backing a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PurchaseDocumentType {
    #[default]
    Invoice,
    Receipt,
    Other,
}

/// Purchase header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub status: PurchaseStatus,
    pub supplier_id: Option<String>,
    pub purchase_date: DateTime<Utc>,
    pub document_type: PurchaseDocumentType,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<String>,
    pub void_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
    pub subtotal: Money,
}

// =============================================================================
// Inventory Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MovementDirection {
    In,
    Out,
}

/// Which aggregate produced a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SourceType {
    Sale,
    Purchase,
    Manual,
}

/// Business event recorded by a movement.
///
/// `Adjustment` and `Manual` are reserved for stock corrections made outside
/// the sale/purchase lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum InventoryEventType {
    SaleOut,
    SaleVoidIn,
    PurchaseIn,
    PurchaseReturnOut,
    Adjustment,
    Manual,
}

/// Append-only ledger header. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub direction: MovementDirection,
    pub source_type: SourceType,
    pub source_id: String,
    pub event_type: InventoryEventType,
    pub actor_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-product line of a movement, with the counter values observed at
/// mutation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovementItem {
    pub id: String,
    pub movement_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentMethod {
    /// Only method allowed to exceed the balance; the excess is change.
    Cash,
    Card,
    Transfer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PaymentStatus {
    Posted,
    Voided,
}

/// A payment towards a sale. Only POSTED payments count towards completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    /// Amount applied to the sale (excludes change).
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Cash handed back to the customer.
    pub change_amount: Money,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_by: String,
}

// =============================================================================
// Actor
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    Seller,
    Warehouse,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, roles: Vec<Role>) -> Self {
        Actor {
            user_id: user_id.into(),
            roles,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Actor::new(user_id, vec![Role::Admin])
    }

    pub fn seller(user_id: impl Into<String>) -> Self {
        Actor::new(user_id, vec![Role::Seller])
    }

    pub fn warehouse(user_id: impl Into<String>) -> Self {
        Actor::new(user_id, vec![Role::Warehouse])
    }

    #[inline]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One requested line of a draft sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Prefer a specific batch when posting a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchHint {
    pub product_id: String,
    pub batch_id: String,
}

/// Options for `post_sale`.
///
/// Hinted batches are consumed first, in the order given, before the
/// remaining candidates in FEFO order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PostSaleOptions {
    #[serde(default)]
    pub batch_hints: Vec<BatchHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

/// Draft purchase request. Absent date and document type default to now and
/// INVOICE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchase {
    pub supplier_id: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub document_type: Option<PurchaseDocumentType>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseItem>,
}

/// One batch to create when receiving a purchase item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchSpec {
    pub batch_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub quantity: i64,
}

/// Receiving instructions for one purchase item. An empty `batches` list on
/// a non-perishable item means one implicit batch for the full quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PostPurchaseItem {
    pub purchase_item_id: String,
    #[serde(default)]
    pub batches: Vec<BatchSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

/// Sale listing filter. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFilter {
    pub customer_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_total: Option<Money>,
    pub max_total: Option<Money>,
    pub status: Option<SaleStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// =============================================================================
// Aggregate Views
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineView {
    pub detail: SaleDetail,
    pub allocations: Vec<SaleBatchAllocation>,
}

/// A sale with all details and allocations, as returned by every sale
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleView {
    pub sale: Sale,
    pub lines: Vec<SaleLineView>,
}

impl SaleView {
    pub fn id(&self) -> &str {
        &self.sale.id
    }

    pub fn status(&self) -> SaleStatus {
        self.sale.status
    }

    /// Every allocation across all lines.
    pub fn allocations(&self) -> impl Iterator<Item = &SaleBatchAllocation> {
        self.lines.iter().flat_map(|l| l.allocations.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseItemView {
    pub item: PurchaseItem,
    /// Batches created when the item was received. Empty until posted.
    pub batches: Vec<ProductBatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseView {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItemView>,
}

impl PurchaseView {
    pub fn id(&self) -> &str {
        &self.purchase.id
    }

    pub fn status(&self) -> PurchaseStatus {
        self.purchase.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementView {
    pub movement: InventoryMovement,
    pub items: Vec<InventoryMovementItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_matches_serde() {
        assert_eq!(SaleStatus::Active.to_string(), "ACTIVE");
        assert_eq!(
            serde_json::to_string(&SaleStatus::Voided).unwrap(),
            "\"VOIDED\""
        );
        assert_eq!(
            serde_json::to_string(&InventoryEventType::PurchaseReturnOut).unwrap(),
            "\"PURCHASE_RETURN_OUT\""
        );
        assert_eq!(PurchaseStatus::Posted.to_string(), "POSTED");
    }

    #[test]
    fn test_document_type_default() {
        assert_eq!(PurchaseDocumentType::default(), PurchaseDocumentType::Invoice);
    }

    #[test]
    fn test_actor_roles() {
        let actor = Actor::seller("u-1");
        assert!(actor.has_role(Role::Seller));
        assert!(!actor.has_role(Role::Admin));
    }

    #[test]
    fn test_batch_consumed() {
        let now = Utc::now();
        let mut batch = ProductBatch {
            id: "b".to_string(),
            product_id: "p".to_string(),
            purchase_item_id: None,
            batch_code: None,
            expires_at: None,
            received_at: now,
            qty_initial: 10,
            qty_available: 10,
            unit_cost: Money::zero(),
        };
        assert!(!batch.is_consumed());
        batch.qty_available = 9;
        assert!(batch.is_consumed());
    }
}
