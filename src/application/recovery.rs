use super::intake::PaymentIntake;
use super::transition::TransitionOperator;
use crate::domain::payment::{PaymentFilter, PaymentId, PaymentStatus, TransitionOutcome};
use crate::domain::ports::PaymentStoreRef;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    /// Payments abandoned in `processing` and now marked failed.
    pub failed: Vec<PaymentId>,
    /// Pending payments whose job was lost and has been enqueued again.
    pub resubmitted: Vec<PaymentId>,
}

/// Startup sweep for work a previous process left behind.
///
/// `processing` rows created more than `stale_after` before `now` are failed.
/// Every `pending` row is resubmitted, oldest first.
pub async fn reconcile(
    store: &PaymentStoreRef,
    intake: &PaymentIntake,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Result<ReconcileReport> {
    let stale_after = chrono::Duration::from_std(stale_after)
        .map_err(|e| PaymentError::ValidationError(format!("Invalid staleness threshold: {}", e)))?;
    let cutoff = now - stale_after;
    let transitions = TransitionOperator::new(store.clone());
    let mut report = ReconcileReport::default();

    let stuck = store
        .list(&PaymentFilter::with_status(PaymentStatus::Processing))
        .await?;
    for payment in stuck.into_iter().filter(|p| p.payment_date <= cutoff) {
        if let TransitionOutcome::Applied(_) = transitions
            .apply_at(payment.id, PaymentStatus::Failed, Some(now))
            .await?
        {
            warn!(payment_id = payment.id, "Failed stale processing payment");
            report.failed.push(payment.id);
        }
    }

    let mut pending = store
        .list(&PaymentFilter::with_status(PaymentStatus::Pending))
        .await?;
    pending.reverse();
    for payment in pending {
        intake.submit_payment_for_processing(payment.id)?;
        report.resubmitted.push(payment.id);
    }

    if !report.failed.is_empty() || !report.resubmitted.is_empty() {
        info!(
            failed = report.failed.len(),
            resubmitted = report.resubmitted.len(),
            "Reconciled payments from a previous run"
        );
    }
    Ok(report)
}
