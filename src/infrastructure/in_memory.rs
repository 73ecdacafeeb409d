use crate::domain::events::PaymentEvent;
use crate::domain::ports::{EventPublisher, SessionStore, TransactionStore};
use crate::domain::session::{PaymentSession, SessionId};
use crate::domain::transaction::{IdempotencyKey, PaymentTransaction, TransactionId};
use crate::error::{PublishError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory session store.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access. Suitable for
/// tests and single-process deployments; production uses the RocksDB store.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, PaymentSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<PaymentSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<PaymentSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// A thread-safe in-memory transaction store with an idempotency-key index.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<TransactionId, PaymentTransaction>>>,
    by_key: Arc<RwLock<HashMap<IdempotencyKey, TransactionId>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn store(&self, tx: PaymentTransaction) -> Result<()> {
        let mut by_key = self.by_key.write().await;
        let mut transactions = self.transactions.write().await;
        by_key.insert(tx.idempotency_key.clone(), tx.id.clone());
        transactions.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(id).cloned())
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<PaymentTransaction>> {
        let by_key = self.by_key.read().await;
        let transactions = self.transactions.read().await;
        Ok(by_key.get(key).and_then(|id| transactions.get(id).cloned()))
    }

    async fn for_sessions(&self, session_ids: &[SessionId]) -> Result<Vec<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .filter(|t| session_ids.contains(&t.payment_session_id))
            .cloned()
            .collect())
    }
}

/// Event publisher that records published events in memory.
///
/// Used by tests (and the CLI) to observe the engine's outcome events.
/// Can be switched into failure mode to exercise the swallow-and-log path.
#[derive(Default, Clone)]
pub struct RecordingPublisher {
    events: Arc<RwLock<Vec<PaymentEvent>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail (until switched back).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<PaymentEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: PaymentEvent) -> std::result::Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError("bus unavailable".to_string()));
        }
        self.events.write().await.push(event);
        Ok(())
    }
}
