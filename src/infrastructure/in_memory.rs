use crate::domain::payment::{
    NewPayment, Payment, PaymentFilter, PaymentId, PaymentStatus, TransactionId,
    TransitionOutcome, sort_latest_first,
};
use crate::domain::ports::{PaymentStore, StudentDirectory};
use crate::domain::school::Student;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct PaymentTable {
    rows: HashMap<PaymentId, Payment>,
    by_transaction: HashMap<TransactionId, PaymentId>,
    last_id: PaymentId,
}

/// A thread-safe in-memory payment table.
///
/// Every write takes the table's write lock for the whole read-modify-write,
/// which gives the same isolation a single-row database transaction would.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let mut table = self.table.write().await;
        if table.by_transaction.contains_key(&payment.transaction_id) {
            return Err(PaymentError::DuplicateTransaction(
                payment.transaction_id.to_string(),
            ));
        }

        let id = table.last_id + 1;
        let payment = payment.into_payment(id);
        table.last_id = id;
        table
            .by_transaction
            .insert(payment.transaction_id.clone(), id);
        table.rows.insert(id, payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn transition_from(
        &self,
        id: PaymentId,
        expected: Option<PaymentStatus>,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut table = self.table.write().await;
        let Some(payment) = table.rows.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };

        let from_expected = expected.is_none_or(|status| status == payment.status);
        if from_expected && payment.apply_transition(target, at) {
            Ok(TransitionOutcome::Applied(payment.clone()))
        } else {
            Ok(TransitionOutcome::Rejected {
                current: payment.status,
            })
        }
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let table = self.table.read().await;
        let mut payments: Vec<Payment> = table
            .rows
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_latest_first(&mut payments);
        Ok(payments)
    }
}

/// In-memory student registry used by the intake to resolve ownership.
#[derive(Default, Clone)]
pub struct InMemoryStudentDirectory {
    students: Arc<RwLock<HashMap<u64, Student>>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, student: Student) {
        let mut students = self.students.write().await;
        students.insert(student.id, student);
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.students.read().await.contains_key(&id)
    }
}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn get_student(&self, id: u64) -> Result<Option<Student>> {
        let students = self.students.read().await;
        Ok(students.get(&id).cloned())
    }
}
