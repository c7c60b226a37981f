use crate::domain::payment::Payment;
use crate::error::Result;
use std::io::Write;

/// Writes payment rows as CSV, header first.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: impl IntoIterator<Item = Payment>) -> Result<()> {
        for payment in payments {
            self.writer.serialize(payment)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, NewPayment, PaymentStatus, TransactionId};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let mut payment = NewPayment {
            transaction_id: TransactionId::parse("TRX-A").unwrap(),
            amount: Amount::new(dec!(500)).unwrap(),
            student_id: 1,
            user_id: 10,
            description: Some("Term 1".to_string()),
            payment_date: at,
            due_date: None,
        }
        .into_payment(1);
        payment.apply_transition(PaymentStatus::Processing, at);
        payment.apply_transition(PaymentStatus::Completed, at);

        let mut buffer = Vec::new();
        PaymentWriter::new(&mut buffer)
            .write_payments(vec![payment])
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        let mut lines = output.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,transaction_id,amount,status,student_id,user_id,description,payment_date,due_date,processed_at"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,TRX-A,500,completed,1,10,Term 1,"));
        assert!(row.ends_with(",,2024-03-01T08:30:00Z"));
    }
}
