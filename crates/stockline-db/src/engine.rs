//! # Engine
//!
//! The in-process entry point: one method per operation, one unit of work
//! per call, commit at the boundary.
//!
//! ## Call Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine.post_sale(actor, id, options)                                   │
//! │       │                                                                 │
//! │       ├── lock-free read: already ACTIVE/COMPLETED? ──► return view     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UnitOfWork::begin ──► SaleService::post ──► commit                     │
//! │                              │                                          │
//! │                              └── Err ──► uow dropped ──► rollback       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock-free read loads the whole view from one snapshot and is only a
//! shortcut. The service re-checks the status under the aggregate lock, so a
//! stale read never causes a double transition.

use tracing::debug;

use stockline_core::lifecycle::{self, Transition};
use stockline_core::{
    Actor, CoreResult, MovementView, NewPayment, NewPurchase, Payment, PostPurchaseItem,
    PostSaleOptions, Purchase, PurchaseView, Sale, SaleFilter, SaleLine, SaleStatusHistory,
    SaleView, SourceType, DEFAULT_SELLER_VOID_WINDOW_HOURS,
};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::pool::Database;
use crate::service::{PaymentService, PurchaseService, SaleService};
use crate::unit_of_work::UnitOfWork;

/// Transactional inventory engine.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    sales: SaleService,
    purchases: PurchaseService,
    payments: PaymentService,
}

impl Engine {
    /// Wraps an open database with the default SELLER void window.
    pub fn new(db: Database) -> Self {
        Engine {
            db,
            sales: SaleService::new(chrono::Duration::hours(DEFAULT_SELLER_VOID_WINDOW_HOURS)),
            purchases: PurchaseService::new(),
            payments: PaymentService::new(),
        }
    }

    pub fn with_void_window(mut self, window: chrono::Duration) -> Self {
        self.sales = SaleService::new(window);
        self
    }

    /// Opens the database described by `config` and builds an engine on it.
    pub async fn connect(config: &EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Engine::new(db).with_void_window(config.seller_void_window))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    async fn begin(&self) -> EngineResult<UnitOfWork> {
        Ok(UnitOfWork::begin(self.db.pool()).await?)
    }

    /// Current view of a sale whose status already satisfies `check`.
    /// Read errors fall through to the locked path.
    async fn settled_sale(
        &self,
        sale_id: &str,
        check: fn(&Sale) -> CoreResult<Transition>,
    ) -> Option<SaleView> {
        let view = match self.db.sales().get_view(sale_id).await {
            Ok(view) => view,
            Err(e) => {
                debug!(sale_id = %sale_id, error = %e, "Fast-path sale read failed");
                return None;
            }
        };
        if !matches!(check(&view.sale), Ok(Transition::AlreadyDone)) {
            return None;
        }
        debug!(sale_id = %sale_id, status = %view.sale.status, "Sale already in target state");
        Some(view)
    }

    async fn settled_purchase(
        &self,
        purchase_id: &str,
        check: fn(&Purchase) -> CoreResult<Transition>,
    ) -> Option<PurchaseView> {
        let view = match self.db.purchases().get_view(purchase_id).await {
            Ok(view) => view,
            Err(e) => {
                debug!(purchase_id = %purchase_id, error = %e, "Fast-path purchase read failed");
                return None;
            }
        };
        if !matches!(check(&view.purchase), Ok(Transition::AlreadyDone)) {
            return None;
        }
        debug!(purchase_id = %purchase_id, status = %view.purchase.status, "Purchase already in target state");
        Some(view)
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub async fn create_draft_sale(
        &self,
        actor: &Actor,
        customer_id: &str,
        lines: &[SaleLine],
    ) -> EngineResult<SaleView> {
        let mut uow = self.begin().await?;
        let view = self.sales.create_draft(&mut uow, actor, customer_id, lines).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn post_sale(
        &self,
        actor: &Actor,
        sale_id: &str,
        options: &PostSaleOptions,
    ) -> EngineResult<SaleView> {
        if let Some(view) = self.settled_sale(sale_id, lifecycle::check_post_sale).await {
            return Ok(view);
        }
        let mut uow = self.begin().await?;
        let view = self.sales.post(&mut uow, actor, sale_id, options).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn complete_sale(&self, actor: &Actor, sale_id: &str) -> EngineResult<SaleView> {
        if let Some(view) = self.settled_sale(sale_id, lifecycle::check_complete_sale).await {
            return Ok(view);
        }
        let mut uow = self.begin().await?;
        let view = self.sales.complete(&mut uow, actor, sale_id).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn void_sale(
        &self,
        actor: &Actor,
        sale_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<SaleView> {
        if let Some(view) = self.settled_sale(sale_id, lifecycle::check_void_sale).await {
            return Ok(view);
        }
        let mut uow = self.begin().await?;
        let view = self.sales.void(&mut uow, actor, sale_id, reason).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn add_payment(
        &self,
        actor: &Actor,
        sale_id: &str,
        request: &NewPayment,
    ) -> EngineResult<Payment> {
        let mut uow = self.begin().await?;
        let payment = self.payments.add(&mut uow, actor, sale_id, request).await?;
        uow.commit().await?;
        Ok(payment)
    }

    /// Sale with details and allocations. No locks.
    pub async fn get_sale(&self, sale_id: &str) -> EngineResult<SaleView> {
        Ok(self.db.sales().get_view(sale_id).await?)
    }

    /// Sale headers matching `filter`, newest first.
    pub async fn search_sales(&self, filter: &SaleFilter) -> EngineResult<Vec<Sale>> {
        Ok(self.db.sales().search(filter).await?)
    }

    pub async fn sale_history(&self, sale_id: &str) -> EngineResult<Vec<SaleStatusHistory>> {
        Ok(self.db.sales().history(sale_id).await?)
    }

    pub async fn payments_for_sale(&self, sale_id: &str) -> EngineResult<Vec<Payment>> {
        Ok(self.db.payments().for_sale(sale_id).await?)
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    pub async fn create_draft_purchase(
        &self,
        actor: &Actor,
        request: &NewPurchase,
    ) -> EngineResult<PurchaseView> {
        let mut uow = self.begin().await?;
        let view = self.purchases.create_draft(&mut uow, actor, request).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn post_purchase(
        &self,
        actor: &Actor,
        purchase_id: &str,
        items: &[PostPurchaseItem],
    ) -> EngineResult<PurchaseView> {
        if let Some(view) = self
            .settled_purchase(purchase_id, lifecycle::check_post_purchase)
            .await
        {
            return Ok(view);
        }
        let mut uow = self.begin().await?;
        let view = self.purchases.post(&mut uow, actor, purchase_id, items).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn void_purchase(
        &self,
        actor: &Actor,
        purchase_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<PurchaseView> {
        if let Some(view) = self
            .settled_purchase(purchase_id, lifecycle::check_void_purchase)
            .await
        {
            return Ok(view);
        }
        let mut uow = self.begin().await?;
        let view = self.purchases.void(&mut uow, actor, purchase_id, reason).await?;
        uow.commit().await?;
        Ok(view)
    }

    pub async fn get_purchase(&self, purchase_id: &str) -> EngineResult<PurchaseView> {
        Ok(self.db.purchases().get_view(purchase_id).await?)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    pub async fn movements_for_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> EngineResult<Vec<MovementView>> {
        Ok(self.db.movements().for_source(source_type, source_id).await?)
    }
}
