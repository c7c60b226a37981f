use super::processor::PaymentProcessor;
use super::queue::QueueHandle;
use crate::domain::payment::{Amount, NewPayment, Payment, PaymentId, TransactionId};
use crate::domain::ports::{PaymentStoreRef, StudentDirectoryRef};
use crate::domain::school::Requester;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

const MAX_DESCRIPTION_LEN: usize = 500;

/// A payment as submitted by a parent or administrator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentRequest {
    pub student_id: u64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Client-chosen transaction id; one is generated when absent.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Entry point the web layer calls to create payments.
///
/// Creation is synchronous; settlement is handed to the work queue and the
/// created row is returned without waiting for it.
#[derive(Clone)]
pub struct PaymentIntake {
    store: PaymentStoreRef,
    students: StudentDirectoryRef,
    processor: PaymentProcessor,
    queue: QueueHandle,
}

impl PaymentIntake {
    pub fn new(
        store: PaymentStoreRef,
        students: StudentDirectoryRef,
        processor: PaymentProcessor,
        queue: QueueHandle,
    ) -> Self {
        Self {
            store,
            students,
            processor,
            queue,
        }
    }

    /// Validates, authorizes and persists a pending payment, then enqueues it.
    ///
    /// If the queue has already shut down the row stays `pending` and is
    /// picked up by the next startup reconciliation.
    pub async fn create_payment(
        &self,
        requester: Requester,
        request: PaymentRequest,
    ) -> Result<Payment> {
        let new_payment = validate(&requester, request)?;

        let student = self
            .students
            .get_student(new_payment.student_id)
            .await?
            .ok_or(PaymentError::StudentNotFound(new_payment.student_id))?;
        if !requester.may_pay_for(&student) {
            return Err(PaymentError::AccessDenied);
        }

        let payment = self.store.insert(new_payment).await?;
        info!(
            payment_id = payment.id,
            transaction_id = %payment.transaction_id,
            amount = %payment.amount.value(),
            "Payment created"
        );

        if let Err(e) = self.submit_payment_for_processing(payment.id) {
            warn!(payment_id = payment.id, error = %e, "Payment left pending");
        }
        Ok(payment)
    }

    /// Fire-and-forget enqueue of a processing run for `id`.
    ///
    /// Callers must enqueue each payment once; a duplicate run is tolerated
    /// but only the first claim advances the row. A duplicate run that hits
    /// an error before claiming does not fail a row another run is settling;
    /// it only fails the row if it is still pending.
    pub fn submit_payment_for_processing(&self, id: PaymentId) -> Result<()> {
        let processor = self.processor.clone();
        self.queue.submit(move || async move {
            processor.process(id).await;
        })
    }
}

fn validate(requester: &Requester, request: PaymentRequest) -> Result<NewPayment> {
    let amount = Amount::new(request.amount)?;

    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if let Some(d) = &description
        && d.chars().count() > MAX_DESCRIPTION_LEN
    {
        return Err(PaymentError::ValidationError(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }

    let transaction_id = match request.transaction_id {
        Some(id) if !id.trim().is_empty() => TransactionId::parse(id.trim())?,
        _ => TransactionId::generate(),
    };

    Ok(NewPayment {
        transaction_id,
        amount,
        student_id: request.student_id,
        user_id: requester.user_id,
        description,
        payment_date: Utc::now(),
        due_date: request.due_date,
    })
}
