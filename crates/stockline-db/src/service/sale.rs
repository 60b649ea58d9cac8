//! # Sale Service
//!
//! ```text
//!   create_draft ──► DRAFT ──post──► ACTIVE ──complete──► COMPLETED
//!                      │               │
//!                      └────void───────┴──void──► VOIDED
//! ```
//!
//! `post` consumes batches in FEFO order and writes one SALE_OUT movement.
//! `void` of an ACTIVE sale returns every allocated unit to its batch and
//! writes one SALE_VOID_IN movement.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use stockline_core::authz;
use stockline_core::fefo;
use stockline_core::ledger::{self, MovementDraft};
use stockline_core::lifecycle::{self, Transition};
use stockline_core::payment as payment_rules;
use stockline_core::validation::{add_to_total, group_sale_lines, line_amount, validate_id};
use stockline_core::{
    Actor, CoreError, Money, PostSaleOptions, ProductBatch, Sale, SaleDetail, SaleLine,
    SaleStatus, SaleView, ValidationError,
};

use crate::error::EngineResult;
use crate::repository::{batch, catalog, movement, new_id, payment, sale};
use crate::service::{load_referenced_products, resolve_active_products};
use crate::unit_of_work::{LockSet, LockTable, UnitOfWork};

/// Sale lifecycle transitions.
#[derive(Debug, Clone)]
pub struct SaleService {
    void_window: chrono::Duration,
}

impl SaleService {
    /// `void_window` bounds how long after posting a SELLER may void.
    pub fn new(void_window: chrono::Duration) -> Self {
        SaleService { void_window }
    }

    pub fn void_window(&self) -> chrono::Duration {
        self.void_window
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a DRAFT sale with price snapshots. No inventory effect.
    pub async fn create_draft(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        customer_id: &str,
        lines: &[SaleLine],
    ) -> EngineResult<SaleView> {
        validate_id("customer_id", customer_id)?;
        let grouped = group_sale_lines(lines)?;

        let product_ids: LockSet = grouped.iter().map(|l| l.product_id.clone()).collect();
        uow.lock(LockTable::Products, &product_ids).await?;

        let customer = catalog::fetch_customer(uow.conn(), customer_id).await?;
        if !customer.map(|c| c.is_active).unwrap_or(false) {
            return Err(CoreError::not_found("Customer", customer_id).into());
        }

        let products = resolve_active_products(uow.conn(), product_ids.ids()).await?;

        let now = uow.now();
        let sale_id = new_id();
        let mut total = Money::zero();
        let mut details = Vec::with_capacity(grouped.len());
        for (idx, line) in grouped.iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CoreError::not_found("Product", line.product_id.clone()))?;
            let subtotal = line_amount(product.price, line.quantity)?;
            total = add_to_total(total, subtotal)?;
            details.push(SaleDetail {
                id: new_id(),
                sale_id: sale_id.clone(),
                line_no: idx as i64 + 1,
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price: product.price,
                subtotal,
            });
        }

        let record = Sale {
            id: sale_id.clone(),
            status: SaleStatus::Draft,
            customer_id: customer_id.to_string(),
            sale_date: now,
            total,
            created_at: now,
            created_by: actor.user_id.clone(),
            posted_at: None,
            posted_by: None,
            completed_at: None,
            completed_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            updated_at: now,
        };

        sale::tx_insert_sale(uow.conn(), &record).await?;
        for detail in &details {
            sale::tx_insert_detail(uow.conn(), detail).await?;
        }

        info!(
            sale_id = %sale_id,
            customer_id = %customer_id,
            lines = details.len(),
            total = %total,
            "Draft sale created"
        );

        Ok(sale::load_view(uow.conn(), &sale_id).await?)
    }

    // =========================================================================
    // Post
    // =========================================================================

    /// DRAFT → ACTIVE: allocates batches FEFO, decrements stock, records a
    /// SALE_OUT movement. ACTIVE and COMPLETED return unchanged.
    pub async fn post(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        sale_id: &str,
        options: &PostSaleOptions,
    ) -> EngineResult<SaleView> {
        let current = sale::tx_lock_sale(uow.conn(), sale_id).await?;
        match lifecycle::check_post_sale(&current) {
            Ok(Transition::AlreadyDone) => {
                debug!(sale_id = %sale_id, status = %current.status, "Sale already posted");
                return Ok(sale::load_view(uow.conn(), sale_id).await?);
            }
            Ok(Transition::Apply) => {}
            Err(e) => {
                warn!(sale_id = %sale_id, status = %current.status, "Post rejected");
                return Err(e.into());
            }
        }

        let details = sale::fetch_details(uow.conn(), sale_id).await?;
        if details.is_empty() {
            return Err(CoreError::DataIntegrity(format!("sale {} has no details", sale_id)).into());
        }

        let required = ledger::aggregate_by_product(
            details.iter().map(|d| (d.product_id.as_str(), d.quantity)),
        );

        for hint in &options.batch_hints {
            if !required.contains_key(&hint.product_id) {
                return Err(ValidationError::UnknownBatchHint {
                    product_id: hint.product_id.clone(),
                    batch_id: hint.batch_id.clone(),
                }
                .into());
            }
        }

        let product_ids: LockSet = required.keys().cloned().collect();
        uow.lock(LockTable::Products, &product_ids).await?;
        let products = load_referenced_products(uow.conn(), product_ids.ids()).await?;

        let locked = batch::tx_lock_available(uow.conn(), product_ids.ids()).await?;
        let mut candidates: BTreeMap<String, Vec<ProductBatch>> = BTreeMap::new();
        for b in locked {
            candidates.entry(b.product_id.clone()).or_default().push(b);
        }

        // Every product is checked before the first batch is touched.
        for (product_id, qty) in &required {
            let batches = candidates.entry(product_id.clone()).or_default();
            fefo::sort_fefo(batches);

            let hinted: Vec<&str> = options
                .batch_hints
                .iter()
                .filter(|h| &h.product_id == product_id)
                .map(|h| h.batch_id.as_str())
                .collect();
            fefo::apply_hints(product_id, batches, &hinted)?;

            if let Err(e) = fefo::check_available(product_id, *qty, batches) {
                warn!(sale_id = %sale_id, product_id = %product_id, required = qty, "Insufficient FEFO stock");
                return Err(e.into());
            }
        }

        let now = uow.now();
        for detail in &details {
            let batches = candidates
                .get_mut(&detail.product_id)
                .ok_or_else(|| CoreError::DataIntegrity(format!("no candidates for {}", detail.product_id)))?;
            let takes = fefo::allocate(&detail.product_id, detail.quantity, batches)?;

            for take in takes {
                sale::tx_insert_allocation(
                    uow.conn(),
                    &detail.id,
                    &take.batch_id,
                    &detail.product_id,
                    take.quantity,
                    now,
                )
                .await?;

                let remaining = batches
                    .iter()
                    .find(|b| b.id == take.batch_id)
                    .map(|b| b.qty_available)
                    .ok_or_else(|| CoreError::DataIntegrity(format!("batch {} vanished", take.batch_id)))?;
                batch::tx_set_available(uow.conn(), &take.batch_id, remaining).await?;

                debug!(
                    sale_id = %sale_id,
                    product_id = %detail.product_id,
                    batch_id = %take.batch_id,
                    quantity = take.quantity,
                    "Batch allocated"
                );
            }
        }

        let mut changes = Vec::with_capacity(required.len());
        for (product_id, qty) in &required {
            let product = products
                .get(product_id)
                .ok_or_else(|| CoreError::not_found("Product", product_id.clone()))?;
            let change = ledger::decrement_stock(product_id, product.stock, *qty)?;
            catalog::tx_set_stock(uow.conn(), product_id, change.new_stock).await?;
            changes.push(change);
        }

        let draft = MovementDraft::sale_out(sale_id, &actor.user_id, changes);
        movement::tx_record(uow.conn(), &draft, now).await?;

        sale::tx_mark_posted(uow.conn(), sale_id, &actor.user_id, now).await?;
        sale::tx_insert_history(
            uow.conn(),
            sale_id,
            SaleStatus::Draft,
            SaleStatus::Active,
            &actor.user_id,
            None,
            now,
        )
        .await?;

        info!(
            sale_id = %sale_id,
            actor = %actor.user_id,
            products = required.len(),
            "Sale posted"
        );

        Ok(sale::load_view(uow.conn(), sale_id).await?)
    }

    // =========================================================================
    // Complete
    // =========================================================================

    /// ACTIVE → COMPLETED once POSTED payments cover the total. No inventory
    /// effect.
    pub async fn complete(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        sale_id: &str,
    ) -> EngineResult<SaleView> {
        let current = sale::tx_lock_sale(uow.conn(), sale_id).await?;
        match lifecycle::check_complete_sale(&current) {
            Ok(Transition::AlreadyDone) => return Ok(sale::load_view(uow.conn(), sale_id).await?),
            Ok(Transition::Apply) => {}
            Err(e) => {
                warn!(sale_id = %sale_id, status = %current.status, "Complete rejected");
                return Err(e.into());
            }
        }

        let paid = payment::sum_posted(uow.conn(), sale_id).await?;
        if let Err(e) = payment_rules::ensure_fully_paid(&current, paid) {
            warn!(sale_id = %sale_id, total = %current.total, paid = %paid, "Payment shortfall");
            return Err(e.into());
        }

        let now = uow.now();
        sale::tx_mark_completed(uow.conn(), sale_id, &actor.user_id, now).await?;
        sale::tx_insert_history(
            uow.conn(),
            sale_id,
            SaleStatus::Active,
            SaleStatus::Completed,
            &actor.user_id,
            None,
            now,
        )
        .await?;

        info!(sale_id = %sale_id, actor = %actor.user_id, paid = %paid, "Sale completed");
        Ok(sale::load_view(uow.conn(), sale_id).await?)
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// DRAFT or ACTIVE → VOIDED. An ACTIVE sale gives its allocated units
    /// back to their batches and records a SALE_VOID_IN movement.
    pub async fn void(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        sale_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<SaleView> {
        let current = sale::tx_lock_sale(uow.conn(), sale_id).await?;
        match lifecycle::check_void_sale(&current) {
            Ok(Transition::AlreadyDone) => return Ok(sale::load_view(uow.conn(), sale_id).await?),
            Ok(Transition::Apply) => {}
            Err(e) => {
                warn!(sale_id = %sale_id, status = %current.status, "Void rejected");
                return Err(e.into());
            }
        }

        if let Err(e) = authz::authorize_void(actor, &current, uow.now(), self.void_window) {
            warn!(sale_id = %sale_id, actor = %actor.user_id, error = %e, "Void forbidden");
            return Err(e.into());
        }

        let reason = lifecycle::sale_void_reason(sale_id, reason);

        if current.status == SaleStatus::Active {
            self.restore_allocations(uow, actor, sale_id, &reason).await?;
        }

        let now = uow.now();
        sale::tx_mark_voided(uow.conn(), sale_id, &actor.user_id, &reason, now).await?;
        sale::tx_insert_history(
            uow.conn(),
            sale_id,
            current.status,
            SaleStatus::Voided,
            &actor.user_id,
            Some(&reason),
            now,
        )
        .await?;

        info!(
            sale_id = %sale_id,
            actor = %actor.user_id,
            from = %current.status,
            reason = %reason,
            "Sale voided"
        );

        Ok(sale::load_view(uow.conn(), sale_id).await?)
    }

    async fn restore_allocations(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        sale_id: &str,
        reason: &str,
    ) -> EngineResult<()> {
        let allocations = sale::fetch_allocations(uow.conn(), sale_id).await?;
        if allocations.is_empty() {
            return Err(CoreError::DataIntegrity(format!(
                "active sale {} has no batch allocations",
                sale_id
            ))
            .into());
        }
        if let Some(bad) = allocations.iter().find(|a| a.quantity <= 0) {
            return Err(CoreError::DataIntegrity(format!(
                "allocation {} has non-positive quantity {}",
                bad.id, bad.quantity
            ))
            .into());
        }

        let per_product = ledger::aggregate_by_product(
            allocations.iter().map(|a| (a.product_id.as_str(), a.quantity)),
        );

        let product_ids: LockSet = per_product.keys().cloned().collect();
        uow.lock(LockTable::Products, &product_ids).await?;
        let batch_ids: LockSet = allocations.iter().map(|a| a.batch_id.clone()).collect();
        uow.lock(LockTable::ProductBatches, &batch_ids).await?;

        let products = load_referenced_products(uow.conn(), product_ids.ids()).await?;
        let mut batches: BTreeMap<String, ProductBatch> = batch::fetch_by_ids(uow.conn(), batch_ids.ids())
            .await?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        for allocation in &allocations {
            let b = batches.get_mut(&allocation.batch_id).ok_or_else(|| {
                CoreError::DataIntegrity(format!(
                    "allocation {} references missing batch {}",
                    allocation.id, allocation.batch_id
                ))
            })?;
            b.qty_available = ledger::restore_batch_quantity(b.qty_available, b.qty_initial, allocation.quantity);
        }
        for b in batches.values() {
            batch::tx_set_available(uow.conn(), &b.id, b.qty_available).await?;
        }

        let mut changes = Vec::with_capacity(per_product.len());
        for (product_id, qty) in &per_product {
            let product = products
                .get(product_id)
                .ok_or_else(|| CoreError::not_found("Product", product_id.clone()))?;
            let change = ledger::increment_stock(product_id, product.stock, *qty)?;
            catalog::tx_set_stock(uow.conn(), product_id, change.new_stock).await?;
            changes.push(change);
        }

        let now = uow.now();
        let draft = MovementDraft::sale_void_in(sale_id, &actor.user_id, reason.to_string(), changes);
        movement::tx_record(uow.conn(), &draft, now).await?;
        Ok(())
    }
}
