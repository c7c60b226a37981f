use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned payment identifier.
pub type PaymentId = u64;

const TRANSACTION_ID_PREFIX: &str = "TRX";
const TRANSACTION_ID_SUFFIX_LEN: usize = 8;
const TRANSACTION_ID_MAX_LEN: usize = 64;

/// Lifecycle status of a payment.
///
/// Payments only ever move forward: `Pending -> Processing -> {Completed, Failed}`.
/// `Pending -> Failed` is also allowed so a payment whose processing blew up
/// before it started can still be closed out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(PaymentError::ValidationError(format!(
                "Unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// A positive monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Globally unique, immutable transaction reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Validates a caller-supplied transaction id.
    pub fn parse(value: impl Into<String>) -> Result<Self, PaymentError> {
        let value = value.into();
        let valid_chars = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if value.is_empty() || value.len() > TRANSACTION_ID_MAX_LEN || !valid_chars {
            return Err(PaymentError::ValidationError(format!(
                "Invalid transaction ID '{}'",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Generates a fresh server-side id of the form `TRXABCD1234`.
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TRANSACTION_ID_SUFFIX_LEN)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();
        Self(format!("{}{}", TRANSACTION_ID_PREFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionId {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted payment row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub student_id: u64,
    pub user_id: u64,
    pub description: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Moves the payment to `target` if the edge is allowed.
    ///
    /// `processed_at` is stamped with `at` exactly when `target` is terminal.
    /// Returns `false` and leaves the row untouched otherwise.
    pub fn apply_transition(&mut self, target: PaymentStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(target) {
            return false;
        }
        self.status = target;
        if target.is_terminal() {
            self.processed_at = Some(at);
        }
        true
    }
}

/// A payment that has passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub transaction_id: TransactionId,
    pub amount: Amount,
    pub student_id: u64,
    pub user_id: u64,
    pub description: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn into_payment(self, id: PaymentId) -> Payment {
        Payment {
            id,
            transaction_id: self.transaction_id,
            amount: self.amount,
            status: PaymentStatus::Pending,
            student_id: self.student_id,
            user_id: self.user_id,
            description: self.description,
            payment_date: self.payment_date,
            due_date: self.due_date,
            processed_at: None,
        }
    }
}

/// Result of asking the store to move a payment to a new status.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Payment),
    Rejected { current: PaymentStatus },
    NotFound,
}

/// Row filter for payment listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub student_id: Option<u64>,
    pub user_id: Option<u64>,
}

impl PaymentFilter {
    pub fn with_status(status: PaymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        self.status.is_none_or(|s| s == payment.status)
            && self.student_id.is_none_or(|id| id == payment.student_id)
            && self.user_id.is_none_or(|id| id == payment.user_id)
    }
}

/// Orders payments latest first, newest id breaking ties.
pub fn sort_latest_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| {
        b.payment_date
            .cmp(&a.payment_date)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn pending_payment() -> Payment {
        NewPayment {
            transaction_id: TransactionId::parse("TRX-A").unwrap(),
            amount: Amount::new(dec!(500)).unwrap(),
            student_id: 1,
            user_id: 1,
            description: None,
            payment_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            due_date: None,
        }
        .into_payment(1)
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_amount_deserialization_rejects_non_positive() {
        assert!(serde_json::from_str::<Amount>("\"12.50\"").is_ok());
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }

    #[test]
    fn test_status_parsing_is_closed() {
        assert_eq!(
            "processing".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::Processing
        );
        assert!("refunded".parse::<PaymentStatus>().is_err());
        assert!("PENDING".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_forward_only_transitions() {
        use PaymentStatus::*;
        let all = [Pending, Processing, Completed, Failed];
        for from in all {
            assert!(!from.can_transition_to(Pending));
            if from.is_terminal() {
                for to in all {
                    assert!(!from.can_transition_to(to));
                }
            }
        }
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_processed_at_only_on_terminal() {
        let mut payment = pending_payment();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert!(payment.apply_transition(PaymentStatus::Processing, at));
        assert_eq!(payment.processed_at, None);

        assert!(payment.apply_transition(PaymentStatus::Completed, at));
        assert_eq!(payment.processed_at, Some(at));

        // Terminal rows are frozen
        let later = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert!(!payment.apply_transition(PaymentStatus::Failed, later));
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.processed_at, Some(at));
    }

    #[test]
    fn test_generated_transaction_id_shape() {
        let id = TransactionId::generate();
        assert!(id.as_str().starts_with("TRX"));
        assert_eq!(id.as_str().len(), 11);
        assert!(id.as_str()[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(TransactionId::generate(), id);
    }

    #[test]
    fn test_transaction_id_rejects_bad_input() {
        assert!(TransactionId::parse("").is_err());
        assert!(TransactionId::parse("has space").is_err());
        assert!(TransactionId::parse("x".repeat(65)).is_err());
        assert!(TransactionId::parse("TRX_ok-1").is_ok());
    }

    #[test]
    fn test_filter_and_ordering() {
        let mut older = pending_payment();
        let mut newer = pending_payment();
        newer.id = 2;
        newer.student_id = 7;
        newer.payment_date = older.payment_date + chrono::Duration::days(1);
        older.status = PaymentStatus::Failed;

        let mut rows = vec![older.clone(), newer.clone()];
        sort_latest_first(&mut rows);
        assert_eq!(rows[0].id, 2);

        let filter = PaymentFilter {
            student_id: Some(7),
            ..PaymentFilter::default()
        };
        assert!(filter.matches(&newer));
        assert!(!filter.matches(&older));
        assert!(PaymentFilter::with_status(PaymentStatus::Failed).matches(&older));
    }
}
