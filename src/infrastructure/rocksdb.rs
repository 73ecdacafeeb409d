use crate::domain::ports::{SessionStore, TransactionStore};
use crate::domain::session::{PaymentSession, SessionId};
use crate::domain::transaction::{IdempotencyKey, PaymentTransaction, TransactionId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

/// Column Family for session records.
pub const CF_SESSIONS: &str = "sessions";
/// Column Family for settlement attempt records.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family mapping idempotency key -> transaction id.
pub const CF_TX_KEYS: &str = "tx_keys";

fn storage_err(e: impl Display) -> PaymentError {
    PaymentError::Storage(e.to_string())
}

/// A persistent store implementation using RocksDB.
///
/// Handles storage for both `PaymentSession` and `PaymentTransaction`
/// entities using separate Column Families, plus a key index so a retried
/// settlement attempt can be found by idempotency key.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TX_KEYS, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(storage_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::Storage(format!("column family {} not found", name)))
    }
}

#[async_trait]
impl SessionStore for RocksDbStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        let cf = self.cf(CF_SESSIONS)?;
        let value = serde_json::to_vec(&session).map_err(storage_err)?;
        self.db
            .put_cf(cf, session.id.as_str(), value)
            .map_err(storage_err)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<PaymentSession>> {
        let cf = self.cf(CF_SESSIONS)?;
        match self.db.get_cf(cf, id.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<PaymentSession>> {
        let cf = self.cf(CF_SESSIONS)?;
        let mut sessions = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(storage_err)?;
            let session: PaymentSession =
                serde_json::from_slice(&value).map_err(storage_err)?;
            if session.user_id == user_id {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn store(&self, tx: PaymentTransaction) -> Result<()> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let keys_cf = self.cf(CF_TX_KEYS)?;
        let value = serde_json::to_vec(&tx).map_err(storage_err)?;
        self.db
            .put_cf(cf, tx.id.as_str(), value)
            .map_err(storage_err)?;
        self.db
            .put_cf(keys_cf, tx.idempotency_key.as_str(), tx.id.as_str())
            .map_err(storage_err)
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<PaymentTransaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, id.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<PaymentTransaction>> {
        let keys_cf = self.cf(CF_TX_KEYS)?;
        let id = match self.db.get_cf(keys_cf, key.as_str()).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes).map_err(storage_err)?,
            None => return Ok(None),
        };
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, &id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn for_sessions(&self, session_ids: &[SessionId]) -> Result<Vec<PaymentTransaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut transactions = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(storage_err)?;
            let tx: PaymentTransaction = serde_json::from_slice(&value).map_err(storage_err)?;
            if session_ids.contains(&tx.payment_session_id) {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }
}
