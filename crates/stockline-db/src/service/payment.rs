//! # Payment Service
//!
//! Records payments against ACTIVE sales. Payments never touch inventory;
//! they only feed the completion gate.

use tracing::{info, warn};

use stockline_core::lifecycle;
use stockline_core::payment::evaluate_payment;
use stockline_core::validation::normalize_reason;
use stockline_core::{Actor, NewPayment, Payment, PaymentStatus};

use crate::error::EngineResult;
use crate::repository::{new_id, payment, sale};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Default)]
pub struct PaymentService;

impl PaymentService {
    pub fn new() -> Self {
        PaymentService
    }

    /// Adds a POSTED payment. Cash above the outstanding balance is stored
    /// as change; the stored amount is what applies to the sale.
    pub async fn add(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        sale_id: &str,
        request: &NewPayment,
    ) -> EngineResult<Payment> {
        let current = sale::tx_lock_sale(uow.conn(), sale_id).await?;
        lifecycle::check_accepts_payment(&current)?;

        let paid = payment::sum_posted(uow.conn(), sale_id).await?;
        let accepted = match evaluate_payment(&current, paid, request.amount, request.method) {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(sale_id = %sale_id, amount = %request.amount, paid = %paid, error = %e, "Payment rejected");
                return Err(e.into());
            }
        };

        let record = Payment {
            id: new_id(),
            sale_id: sale_id.to_string(),
            amount: accepted.applied,
            method: request.method,
            status: PaymentStatus::Posted,
            change_amount: accepted.change,
            reference: normalize_reason(request.reference.as_deref()),
            paid_at: uow.now(),
            created_by: actor.user_id.clone(),
        };
        payment::tx_insert_payment(uow.conn(), &record).await?;

        info!(
            sale_id = %sale_id,
            payment_id = %record.id,
            method = ?record.method,
            amount = %record.amount,
            change = %record.change_amount,
            "Payment recorded"
        );

        Ok(record)
    }
}
