//! # Purchase Service
//!
//! ```text
//!   create_draft ──► DRAFT ──post──► POSTED
//!                      │               │
//!                      └────void───────┴──void──► VOIDED
//! ```
//!
//! Posting receives the goods: one batch per batch spec, stock up, one
//! PURCHASE_IN movement. Voiding a POSTED purchase is only possible while
//! every batch it created is still untouched.

use std::collections::BTreeMap;

use tracing::{info, warn};

use stockline_core::ledger::{self, MovementDraft};
use stockline_core::lifecycle::{self, Transition};
use stockline_core::validation::{
    add_to_total, line_amount, normalize_reason, resolve_batch_specs, validate_id,
    validate_new_purchase, validate_post_purchase_items,
};
use stockline_core::{
    Actor, BatchSpec, CoreError, Money, NewPurchase, PostPurchaseItem, Purchase, PurchaseItem,
    PurchaseStatus, PurchaseView,
};

use crate::error::EngineResult;
use crate::repository::{batch, catalog, movement, new_id, purchase};
use crate::service::{load_referenced_products, resolve_active_products};
use crate::unit_of_work::{LockSet, LockTable, UnitOfWork};

/// Purchase lifecycle transitions.
#[derive(Debug, Clone, Default)]
pub struct PurchaseService;

impl PurchaseService {
    pub fn new() -> Self {
        PurchaseService
    }

    /// Creates a DRAFT purchase. No inventory effect.
    pub async fn create_draft(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        request: &NewPurchase,
    ) -> EngineResult<PurchaseView> {
        validate_new_purchase(request)?;
        if let Some(supplier_id) = &request.supplier_id {
            validate_id("supplier_id", supplier_id)?;
        }

        let product_ids: LockSet = request.items.iter().map(|i| i.product_id.clone()).collect();
        uow.lock(LockTable::Products, &product_ids).await?;

        if let Some(supplier_id) = &request.supplier_id {
            let supplier = catalog::fetch_supplier(uow.conn(), supplier_id).await?;
            if !supplier.map(|s| s.is_active).unwrap_or(false) {
                return Err(CoreError::not_found("Supplier", supplier_id.clone()).into());
            }
        }

        resolve_active_products(uow.conn(), product_ids.ids()).await?;

        let now = uow.now();
        let purchase_id = new_id();
        let mut total = Money::zero();
        let mut items: Vec<PurchaseItem> = Vec::with_capacity(request.items.len());
        for (idx, item) in request.items.iter().enumerate() {
            let subtotal = line_amount(item.unit_cost, item.quantity)?;
            total = add_to_total(total, subtotal)?;
            items.push(PurchaseItem {
                id: new_id(),
                purchase_id: purchase_id.clone(),
                line_no: idx as i64 + 1,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_cost: item.unit_cost,
                subtotal,
            });
        }

        let record = Purchase {
            id: purchase_id.clone(),
            status: PurchaseStatus::Draft,
            supplier_id: request.supplier_id.clone(),
            purchase_date: request.purchase_date.unwrap_or(now),
            document_type: request.document_type.unwrap_or_default(),
            document_number: normalize_reason(request.document_number.as_deref()),
            notes: normalize_reason(request.notes.as_deref()),
            total,
            created_at: now,
            created_by: actor.user_id.clone(),
            posted_at: None,
            posted_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            updated_at: now,
        };

        purchase::tx_insert_purchase(uow.conn(), &record).await?;
        for item in &items {
            purchase::tx_insert_item(uow.conn(), item).await?;
        }

        info!(
            purchase_id = %purchase_id,
            items = items.len(),
            total = %total,
            "Draft purchase created"
        );

        Ok(purchase::load_view(uow.conn(), &purchase_id).await?)
    }

    /// DRAFT → POSTED: creates batches and raises stock.
    pub async fn post(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        purchase_id: &str,
        request: &[PostPurchaseItem],
    ) -> EngineResult<PurchaseView> {
        let current = purchase::tx_lock_purchase(uow.conn(), purchase_id).await?;
        match lifecycle::check_post_purchase(&current) {
            Ok(Transition::AlreadyDone) => {
                return Ok(purchase::load_view(uow.conn(), purchase_id).await?)
            }
            Ok(Transition::Apply) => {}
            Err(e) => {
                warn!(purchase_id = %purchase_id, status = %current.status, "Post rejected");
                return Err(e.into());
            }
        }

        let items = purchase::fetch_items(uow.conn(), purchase_id).await?;
        validate_post_purchase_items(request, &items)?;

        let product_ids: LockSet = items.iter().map(|i| i.product_id.clone()).collect();
        uow.lock(LockTable::Products, &product_ids).await?;
        let products = load_referenced_products(uow.conn(), product_ids.ids()).await?;

        let now = uow.now();
        let mut receipts: Vec<(&PurchaseItem, Vec<BatchSpec>)> = Vec::with_capacity(items.len());
        for item in &items {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| CoreError::not_found("Product", item.product_id.clone()))?;
            let specs = request
                .iter()
                .find(|r| r.purchase_item_id == item.id)
                .map(|r| r.batches.as_slice())
                .unwrap_or(&[]);
            let resolved = resolve_batch_specs(item, product.perishable, specs, now)?;
            receipts.push((item, resolved));
        }

        let mut changes = Vec::with_capacity(receipts.len());
        for (item, specs) in &receipts {
            for spec in specs {
                batch::tx_insert_received(uow.conn(), item, spec, now).await?;
            }

            let product = products
                .get(&item.product_id)
                .ok_or_else(|| CoreError::not_found("Product", item.product_id.clone()))?;
            let change = ledger::increment_stock(&item.product_id, product.stock, item.quantity)?;
            catalog::tx_set_stock(uow.conn(), &item.product_id, change.new_stock).await?;
            changes.push(change);
        }

        let draft = MovementDraft::purchase_in(purchase_id, &actor.user_id, changes);
        movement::tx_record(uow.conn(), &draft, now).await?;
        purchase::tx_mark_posted(uow.conn(), purchase_id, &actor.user_id, now).await?;

        info!(
            purchase_id = %purchase_id,
            actor = %actor.user_id,
            items = items.len(),
            "Purchase posted"
        );

        Ok(purchase::load_view(uow.conn(), purchase_id).await?)
    }

    /// DRAFT or POSTED → VOIDED. A POSTED purchase takes its batches back
    /// out of stock and records a PURCHASE_RETURN_OUT movement.
    pub async fn void(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        purchase_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<PurchaseView> {
        let current = purchase::tx_lock_purchase(uow.conn(), purchase_id).await?;
        if lifecycle::check_void_purchase(&current)? == Transition::AlreadyDone {
            return Ok(purchase::load_view(uow.conn(), purchase_id).await?);
        }

        let reason = lifecycle::purchase_void_reason(reason);

        if current.status == PurchaseStatus::Posted {
            self.return_batches(uow, actor, purchase_id, &reason).await?;
        }

        let now = uow.now();
        purchase::tx_mark_voided(uow.conn(), purchase_id, &actor.user_id, &reason, now).await?;

        info!(
            purchase_id = %purchase_id,
            actor = %actor.user_id,
            from = %current.status,
            reason = %reason,
            "Purchase voided"
        );

        Ok(purchase::load_view(uow.conn(), purchase_id).await?)
    }

    async fn return_batches(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        purchase_id: &str,
        reason: &str,
    ) -> EngineResult<()> {
        let received = batch::fetch_for_purchase(uow.conn(), purchase_id).await?;
        if received.is_empty() {
            return Err(CoreError::DataIntegrity(format!(
                "posted purchase {} has no batches",
                purchase_id
            ))
            .into());
        }

        let product_ids: LockSet = received.iter().map(|b| b.product_id.clone()).collect();
        uow.lock(LockTable::Products, &product_ids).await?;
        let batch_ids: LockSet = received.iter().map(|b| b.id.clone()).collect();
        uow.lock(LockTable::ProductBatches, &batch_ids).await?;

        let batches = batch::fetch_by_ids(uow.conn(), batch_ids.ids()).await?;
        for b in &batches {
            if b.qty_available > b.qty_initial {
                return Err(CoreError::DataIntegrity(format!(
                    "batch {} has {} available of {} received",
                    b.id, b.qty_available, b.qty_initial
                ))
                .into());
            }
            if b.is_consumed() {
                warn!(purchase_id = %purchase_id, batch_id = %b.id, "Void blocked by consumed batch");
                return Err(CoreError::BatchAlreadyConsumed {
                    purchase_id: purchase_id.to_string(),
                    batch_id: b.id.clone(),
                }
                .into());
            }
        }

        let per_product: BTreeMap<String, i64> =
            ledger::aggregate_by_product(batches.iter().map(|b| (b.product_id.as_str(), b.qty_initial)));
        let products = load_referenced_products(uow.conn(), product_ids.ids()).await?;

        let mut changes = Vec::with_capacity(per_product.len());
        for (product_id, qty) in &per_product {
            let product = products
                .get(product_id)
                .ok_or_else(|| CoreError::not_found("Product", product_id.clone()))?;
            let change = ledger::decrement_stock(product_id, product.stock, *qty)?;
            catalog::tx_set_stock(uow.conn(), product_id, change.new_stock).await?;
            changes.push(change);
        }

        for b in &batches {
            batch::tx_set_available(uow.conn(), &b.id, 0).await?;
        }

        let now = uow.now();
        let draft =
            MovementDraft::purchase_return_out(purchase_id, &actor.user_id, reason.to_string(), changes);
        movement::tx_record(uow.conn(), &draft, now).await?;
        Ok(())
    }
}
