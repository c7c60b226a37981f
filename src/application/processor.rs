use super::transition::TransitionOperator;
use crate::domain::payment::{Payment, PaymentId, PaymentStatus, TransitionOutcome};
use crate::domain::ports::{PaymentStoreRef, SettlementGatewayRef, SettlementOutcome};
use crate::error::Result;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// How a single processing run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The payment reached a terminal status through settlement.
    Finished(Payment),
    /// The payment was not in a state this run could advance.
    Skipped(PaymentStatus),
    /// No such payment.
    Missing,
    /// An unexpected error occurred; the payment was forced to failed.
    Aborted,
}

/// Drives one payment through its settlement simulation.
#[derive(Clone)]
pub struct PaymentProcessor {
    store: PaymentStoreRef,
    transitions: TransitionOperator,
    gateway: SettlementGatewayRef,
}

impl PaymentProcessor {
    pub fn new(store: PaymentStoreRef, gateway: SettlementGatewayRef) -> Self {
        Self {
            transitions: TransitionOperator::new(store.clone()),
            store,
            gateway,
        }
    }

    /// Runs `pending -> processing -> completed | failed` for `id`.
    ///
    /// Never returns an error and never unwinds: a failure or panic along the
    /// way marks the payment failed so it cannot stay stuck in `processing`.
    /// The forced failure only touches a row this run claimed, or one still
    /// pending; a row another run is settling is left to that run.
    pub async fn process(&self, id: PaymentId) -> ProcessOutcome {
        let claimed = AtomicBool::new(false);
        let failure = match AssertUnwindSafe(self.settle(id, &claimed))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        error!(payment_id = id, error = %failure, "Error processing payment");

        let expected = if claimed.load(Ordering::SeqCst) {
            PaymentStatus::Processing
        } else {
            PaymentStatus::Pending
        };
        if let Err(e) = self
            .transitions
            .apply_from(id, expected, PaymentStatus::Failed)
            .await
        {
            error!(payment_id = id, error = %e, "Could not mark payment as failed");
        }
        ProcessOutcome::Aborted
    }

    async fn settle(&self, id: PaymentId, claimed: &AtomicBool) -> Result<ProcessOutcome> {
        info!(payment_id = id, "Processing payment");

        if self.store.get(id).await?.is_none() {
            error!(payment_id = id, "Payment not found");
            return Ok(ProcessOutcome::Missing);
        }

        // Only one run can win this claim; the rest see `Rejected` and back off.
        let payment = match self.transitions.apply(id, PaymentStatus::Processing).await? {
            TransitionOutcome::Applied(payment) => {
                claimed.store(true, Ordering::SeqCst);
                payment
            }
            TransitionOutcome::Rejected { current } => {
                warn!(payment_id = id, status = %current, "Payment is not pending, skipping");
                return Ok(ProcessOutcome::Skipped(current));
            }
            TransitionOutcome::NotFound => return Ok(ProcessOutcome::Missing),
        };

        let target = match self.gateway.settle(&payment).await? {
            SettlementOutcome::Settled => PaymentStatus::Completed,
            SettlementOutcome::Declined => PaymentStatus::Failed,
        };

        match self.transitions.apply(id, target).await? {
            TransitionOutcome::Applied(payment) => {
                match payment.status {
                    PaymentStatus::Completed => {
                        info!(payment_id = id, "Payment completed successfully")
                    }
                    _ => warn!(payment_id = id, "Payment failed"),
                }
                Ok(ProcessOutcome::Finished(payment))
            }
            TransitionOutcome::Rejected { current } => Ok(ProcessOutcome::Skipped(current)),
            TransitionOutcome::NotFound => Ok(ProcessOutcome::Missing),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
