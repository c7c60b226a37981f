use crate::application::intake::PaymentRequest;
use crate::domain::school::{Requester, Role};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a payment request file:
/// `payer, role, student, amount, description, due_date, transaction_id`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentRequestRecord {
    pub payer: u64,
    pub role: Role,
    pub student: u64,
    /// Parsed from the field text so the written scale survives.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PaymentRequestRecord {
    pub fn into_parts(self) -> (Requester, PaymentRequest) {
        let requester = Requester {
            user_id: self.payer,
            role: self.role,
        };
        let request = PaymentRequest {
            student_id: self.student,
            amount: self.amount,
            description: self.description,
            due_date: self.due_date,
            transaction_id: self.transaction_id,
        };
        (requester, request)
    }
}

/// Reads payment requests from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing optional columns may be omitted.
pub struct PaymentRequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentRequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes requests; a malformed row yields an `Err` and the
    /// stream continues.
    pub fn requests(self) -> impl Iterator<Item = Result<PaymentRequestRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
