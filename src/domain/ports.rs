use super::payment::{
    NewPayment, Payment, PaymentFilter, PaymentId, PaymentStatus, TransitionOutcome,
};
use super::school::Student;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistent home of payment rows.
///
/// Implementations must make `insert` and `transition_from` atomic: a duplicate
/// transaction id leaves no row behind, and the read-modify-write inside
/// `transition_from` serializes with any other write to the same payment.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a pending payment, assigning its id.
    /// Fails with `PaymentError::DuplicateTransaction` if the transaction id is taken.
    async fn insert(&self, payment: NewPayment) -> Result<Payment>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    /// Applies `Payment::apply_transition` to the stored row in one transaction.
    async fn transition(
        &self,
        id: PaymentId,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        self.transition_from(id, None, target, at).await
    }
    /// Like `transition`, but when `expected` is set the row must currently
    /// hold that status; otherwise the outcome is `Rejected`.
    async fn transition_from(
        &self,
        id: PaymentId,
        expected: Option<PaymentStatus>,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;
    /// Matching rows, latest payment date first.
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get_student(&self, id: u64) -> Result<Option<Student>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled,
    Declined,
}

/// Stand-in for a payment gateway call.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(&self, payment: &Payment) -> Result<SettlementOutcome>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type StudentDirectoryRef = Arc<dyn StudentDirectory>;
pub type SettlementGatewayRef = Arc<dyn SettlementGateway>;
