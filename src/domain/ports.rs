use crate::domain::events::PaymentEvent;
use crate::domain::session::{PaymentSession, SessionId};
use crate::domain::transaction::{IdempotencyKey, PaymentTransaction, TransactionId, TxHash};
use crate::domain::wallet::{AccountInfo, Address, ProvisionedWallet, SigningHandle};
use crate::error::{LedgerError, PublishError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub type SessionStoreBox = Box<dyn SessionStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type LedgerGatewayBox = Box<dyn LedgerGateway>;
pub type WalletProvisionerBox = Box<dyn WalletProvisioner>;
pub type EventPublisherBox = Box<dyn EventPublisher>;

/// Durable keyed storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: PaymentSession) -> Result<()>;
    async fn get(&self, id: &SessionId) -> Result<Option<PaymentSession>>;
    async fn for_user(&self, user_id: &str) -> Result<Vec<PaymentSession>>;
}

/// Append-only storage for settlement attempt records.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn store(&self, tx: PaymentTransaction) -> Result<()>;
    async fn get(&self, id: &TransactionId) -> Result<Option<PaymentTransaction>>;
    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<PaymentTransaction>>;
    async fn for_sessions(&self, session_ids: &[SessionId]) -> Result<Vec<PaymentTransaction>>;
}

/// Status of a submitted transaction as reported by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerTxStatus {
    Confirmed(TxHash),
    Rejected { code: String, message: String },
}

/// The external ledger: signs and submits payments, reports account state,
/// and answers reconciliation queries by idempotency key.
///
/// A gateway implementation must deduplicate submissions by idempotency key:
/// resubmitting an already-executed key returns the original hash instead of
/// paying twice.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit_payment(
        &self,
        signer: &SigningHandle,
        destination: &Address,
        amount: Decimal,
        key: &IdempotencyKey,
        memo: Option<&str>,
    ) -> std::result::Result<TxHash, LedgerError>;

    async fn get_account_info(
        &self,
        address: &Address,
    ) -> std::result::Result<AccountInfo, LedgerError>;

    /// Looks up a submission by idempotency key. `Ok(None)` means the ledger
    /// never executed it and a resubmission with the same key is safe.
    async fn get_transaction(
        &self,
        key: &IdempotencyKey,
    ) -> std::result::Result<Option<LedgerTxStatus>, LedgerError>;
}

/// Issues ephemeral session wallets and resolves station destinations.
#[async_trait]
pub trait WalletProvisioner: Send + Sync {
    async fn create_wallet(&self) -> Result<ProvisionedWallet>;
    async fn resolve_destination(&self, station_id: &str) -> Result<Address>;
}

/// Outbound event bus boundary. Delivery is best-effort: the engine logs and
/// swallows publish failures rather than rolling back a settlement.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PaymentEvent) -> std::result::Result<(), PublishError>;
}
