use crate::domain::ports::{LedgerGateway, LedgerTxStatus, WalletProvisioner};
use crate::domain::transaction::{IdempotencyKey, TxHash};
use crate::domain::wallet::{AccountInfo, Address, ProvisionedWallet, SigningHandle};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Failure to inject into the next ledger submission.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Transient { code: String, message: String },
    Permanent { code: String, message: String },
    /// Reports an unknown outcome to the caller. When `executed` is true the
    /// ledger applies the payment anyway, so a reconciliation query finds it
    /// confirmed — the case a retry must not turn into a double payment.
    Unknown { executed: bool },
}

#[derive(Debug, Clone)]
struct AccountState {
    balance: Decimal,
    sequence: u32,
}

#[derive(Default)]
struct XrplState {
    accounts: HashMap<Address, AccountState>,
    handles: HashMap<String, Address>,
    executed: HashMap<IdempotencyKey, LedgerTxStatus>,
    scripted: VecDeque<ScriptedFailure>,
}

/// Deterministic in-process XRPL stand-in.
///
/// Implements both the ledger gateway and the wallet provisioner over shared
/// state (clones share it), mirroring a single node that both issues wallets
/// and accepts their payments. Tracks per-account sequence numbers and
/// balances, deduplicates submissions by idempotency key, and lets tests
/// script transient/permanent/unknown failures.
#[derive(Default, Clone)]
pub struct SimulatedXrpl {
    state: Arc<RwLock<XrplState>>,
}

impl SimulatedXrpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next submission.
    pub async fn enqueue_failure(&self, failure: ScriptedFailure) {
        self.state.write().await.scripted.push_back(failure);
    }

    /// Number of payments the ledger actually executed.
    pub async fn executed_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .executed
            .values()
            .filter(|s| matches!(s, LedgerTxStatus::Confirmed(_)))
            .count()
    }

    fn new_hash() -> TxHash {
        TxHash::new(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    fn execute(state: &mut XrplState, source: Address, destination: &Address, amount: Decimal) {
        if let Some(account) = state.accounts.get_mut(&source) {
            account.sequence += 1;
            account.balance -= amount;
        }
        if let Some(account) = state.accounts.get_mut(destination) {
            account.balance += amount;
        }
    }
}

#[async_trait]
impl LedgerGateway for SimulatedXrpl {
    async fn submit_payment(
        &self,
        signer: &SigningHandle,
        destination: &Address,
        amount: Decimal,
        key: &IdempotencyKey,
        _memo: Option<&str>,
    ) -> std::result::Result<TxHash, LedgerError> {
        let mut state = self.state.write().await;

        // Submissions are deduplicated by key: replaying an executed key
        // returns the original outcome instead of paying twice.
        if let Some(status) = state.executed.get(key).cloned() {
            return match status {
                LedgerTxStatus::Confirmed(hash) => Ok(hash),
                LedgerTxStatus::Rejected { code, message } => {
                    Err(LedgerError::Permanent { code, message })
                }
            };
        }

        if let Some(failure) = state.scripted.pop_front() {
            match failure {
                ScriptedFailure::Transient { code, message } => {
                    return Err(LedgerError::Transient { code, message });
                }
                ScriptedFailure::Permanent { code, message } => {
                    state.executed.insert(
                        key.clone(),
                        LedgerTxStatus::Rejected {
                            code: code.clone(),
                            message: message.clone(),
                        },
                    );
                    return Err(LedgerError::Permanent { code, message });
                }
                ScriptedFailure::Unknown { executed } => {
                    if executed {
                        let source = state.handles.get(signer.expose()).cloned();
                        if let Some(source) = source {
                            let hash = Self::new_hash();
                            Self::execute(&mut state, source, destination, amount);
                            state
                                .executed
                                .insert(key.clone(), LedgerTxStatus::Confirmed(hash));
                        }
                    }
                    return Err(LedgerError::Unknown {
                        code: "timeout".to_string(),
                        message: "no acknowledgment before timeout".to_string(),
                    });
                }
            }
        }

        let source = state.handles.get(signer.expose()).cloned().ok_or_else(|| {
            LedgerError::Permanent {
                code: "badSecret".to_string(),
                message: "signing handle does not resolve to an account".to_string(),
            }
        })?;
        let balance = state
            .accounts
            .get(&source)
            .map(|a| a.balance)
            .unwrap_or(Decimal::ZERO);
        if balance < amount {
            state.executed.insert(
                key.clone(),
                LedgerTxStatus::Rejected {
                    code: "tecUNFUNDED_PAYMENT".to_string(),
                    message: "insufficient balance".to_string(),
                },
            );
            return Err(LedgerError::Permanent {
                code: "tecUNFUNDED_PAYMENT".to_string(),
                message: "insufficient balance".to_string(),
            });
        }

        let hash = Self::new_hash();
        Self::execute(&mut state, source, destination, amount);
        state
            .executed
            .insert(key.clone(), LedgerTxStatus::Confirmed(hash.clone()));
        Ok(hash)
    }

    async fn get_account_info(
        &self,
        address: &Address,
    ) -> std::result::Result<AccountInfo, LedgerError> {
        let state = self.state.read().await;
        state
            .accounts
            .get(address)
            .map(|a| AccountInfo {
                balance: a.balance,
                sequence: a.sequence,
            })
            .ok_or_else(|| LedgerError::Permanent {
                code: "actNotFound".to_string(),
                message: format!("account {} not found", address),
            })
    }

    async fn get_transaction(
        &self,
        key: &IdempotencyKey,
    ) -> std::result::Result<Option<LedgerTxStatus>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.executed.get(key).cloned())
    }
}

#[async_trait]
impl WalletProvisioner for SimulatedXrpl {
    async fn create_wallet(&self) -> Result<ProvisionedWallet> {
        let mut state = self.state.write().await;
        let address = Address::new(format!(
            "r{}",
            &Uuid::new_v4().simple().to_string()[..20]
        ));
        let handle = SigningHandle::new(format!("shdl-{}", Uuid::new_v4()));
        // Session wallets come pre-funded so micropayments can flow.
        state.accounts.insert(
            address.clone(),
            AccountState {
                balance: Decimal::ONE_HUNDRED,
                sequence: 0,
            },
        );
        state.handles.insert(handle.expose().to_string(), address.clone());
        Ok(ProvisionedWallet {
            address,
            signing_handle: handle,
        })
    }

    async fn resolve_destination(&self, station_id: &str) -> Result<Address> {
        let mut state = self.state.write().await;
        let address = Address::new(format!("rSTN{}", station_id.replace('-', "")));
        state.accounts.entry(address.clone()).or_insert(AccountState {
            balance: Decimal::ZERO,
            sequence: 0,
        });
        Ok(address)
    }
}
