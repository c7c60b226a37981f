use crate::domain::payment::{
    NewPayment, Payment, PaymentFilter, PaymentId, PaymentStatus, TransitionOutcome,
    sort_latest_first,
};
use crate::domain::ports::PaymentStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment rows, keyed by big-endian id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping transaction ids to payment ids (the unique index).
pub const CF_TRANSACTION_IDS: &str = "transaction_ids";
/// Column Family for store bookkeeping such as the id sequence.
pub const CF_META: &str = "meta";

const LAST_ID_KEY: &[u8] = b"last_payment_id";

/// A persistent payment store backed by RocksDB.
///
/// Multi-key writes go through a single `WriteBatch`, so a row and its
/// unique-index entry land together or not at all. Writers are serialized by
/// an async mutex, which makes each read-modify-write behave like a
/// transaction.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_PAYMENTS, CF_TRANSACTION_IDS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn last_id(&self) -> Result<PaymentId> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, LAST_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PaymentError::InternalError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "Corrupt payment id sequence",
                    )))
                })?;
                Ok(PaymentId::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }
}

fn encode(payment: &Payment) -> Result<Vec<u8>> {
    serde_json::to_vec(payment).map_err(|e| {
        PaymentError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode(bytes: &[u8]) -> Result<Payment> {
    serde_json::from_slice(bytes).map_err(|e| {
        PaymentError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let _guard = self.write_lock.lock().await;

        let index = self.cf(CF_TRANSACTION_IDS)?;
        let txn_key = payment.transaction_id.as_str().as_bytes().to_vec();
        if self.db.get_pinned_cf(index, &txn_key)?.is_some() {
            return Err(PaymentError::DuplicateTransaction(
                payment.transaction_id.to_string(),
            ));
        }

        let id = self.last_id()? + 1;
        let payment = payment.into_payment(id);

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_PAYMENTS)?, id.to_be_bytes(), encode(&payment)?);
        batch.put_cf(index, txn_key, id.to_be_bytes());
        batch.put_cf(self.cf(CF_META)?, LAST_ID_KEY, id.to_be_bytes());
        self.db.write(batch)?;

        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read_payment(id)
    }

    async fn transition_from(
        &self,
        id: PaymentId,
        expected: Option<PaymentStatus>,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let _guard = self.write_lock.lock().await;

        let Some(mut payment) = self.read_payment(id)? else {
            return Ok(TransitionOutcome::NotFound);
        };
        if expected.is_some_and(|status| status != payment.status)
            || !payment.apply_transition(target, at)
        {
            return Ok(TransitionOutcome::Rejected {
                current: payment.status,
            });
        }

        self.db
            .put_cf(self.cf(CF_PAYMENTS)?, id.to_be_bytes(), encode(&payment)?)?;
        Ok(TransitionOutcome::Applied(payment))
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        let mut payments = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let payment = decode(&value)?;
            if filter.matches(&payment) {
                payments.push(payment);
            }
        }

        sort_latest_first(&mut payments);
        Ok(payments)
    }
}
