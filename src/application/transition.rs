use crate::domain::payment::{PaymentId, PaymentStatus, TransitionOutcome};
use crate::domain::ports::PaymentStoreRef;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Applies validated status changes to single payment rows.
///
/// The store performs the read-modify-write in one transaction; this layer
/// supplies the timestamp and reports what happened. A missing row or a
/// disallowed edge is an outcome, not an error.
#[derive(Clone)]
pub struct TransitionOperator {
    store: PaymentStoreRef,
}

impl TransitionOperator {
    pub fn new(store: PaymentStoreRef) -> Self {
        Self { store }
    }

    /// Transitions `id` to `target`, stamping terminal rows with the current time.
    pub async fn apply(&self, id: PaymentId, target: PaymentStatus) -> Result<TransitionOutcome> {
        self.apply_at(id, target, None).await
    }

    pub async fn apply_at(
        &self,
        id: PaymentId,
        target: PaymentStatus,
        at: Option<DateTime<Utc>>,
    ) -> Result<TransitionOutcome> {
        self.run(id, None, target, at.unwrap_or_else(Utc::now)).await
    }

    /// Transitions `id` to `target` only if it currently holds `expected`.
    pub async fn apply_from(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        target: PaymentStatus,
    ) -> Result<TransitionOutcome> {
        self.run(id, Some(expected), target, Utc::now()).await
    }

    async fn run(
        &self,
        id: PaymentId,
        expected: Option<PaymentStatus>,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let outcome = self.store.transition_from(id, expected, target, at).await?;

        match &outcome {
            TransitionOutcome::Applied(payment) => {
                debug!(payment_id = id, status = %payment.status, "Payment status updated");
            }
            TransitionOutcome::Rejected { current } => {
                warn!(
                    payment_id = id,
                    current = %current,
                    target = %target,
                    "Rejected payment status transition"
                );
            }
            TransitionOutcome::NotFound => {
                warn!(payment_id = id, target = %target, "Payment not found for status transition");
            }
        }

        Ok(outcome)
    }
}
