use crate::application::locks::SessionLocks;
use crate::domain::events::{EnergyUpdate, PaymentEnvelope, PaymentEvent};
use crate::domain::ports::{
    EventPublisherBox, LedgerGatewayBox, LedgerTxStatus, SessionStoreBox, TransactionStoreBox,
    WalletProvisionerBox,
};
use crate::domain::session::{PaymentSession, SessionId, SessionStatus, SessionView};
use crate::domain::transaction::{
    Amount, IdempotencyKey, PaymentTransaction, TransactionStatus, TransactionType,
};
use crate::domain::wallet::{Address, WalletInfo};
use crate::error::{LedgerError, PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Filter for [`PaymentEngine::get_payment_history`]. Bounds are inclusive.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            limit: 50,
        }
    }
}

/// Result of one settlement attempt executed inside the session's exclusive
/// region. Any event is published by the caller after the region is released.
enum SettleOutcome {
    /// The attempt reached a terminal record (Confirmed, Failed or Rejected).
    Settled {
        transaction: PaymentTransaction,
        event: Option<PaymentEvent>,
    },
    /// Transient error or unknown outcome: the Pending record stays in place
    /// and the caller may retry with the same idempotency key.
    Unsettled {
        error: LedgerError,
        event: Option<PaymentEvent>,
    },
}

/// The settlement engine: enforces session state transitions, serializes
/// ledger submissions per session, keeps totals and transaction history
/// consistent under concurrent callers, and emits outcome events once per
/// settlement attempt (best-effort).
pub struct PaymentEngine {
    sessions: SessionStoreBox,
    transactions: TransactionStoreBox,
    ledger: LedgerGatewayBox,
    wallets: WalletProvisionerBox,
    publisher: EventPublisherBox,
    locks: SessionLocks,
}

impl PaymentEngine {
    pub fn new(
        sessions: SessionStoreBox,
        transactions: TransactionStoreBox,
        ledger: LedgerGatewayBox,
        wallets: WalletProvisionerBox,
        publisher: EventPublisherBox,
    ) -> Self {
        Self {
            sessions,
            transactions,
            ledger,
            wallets,
            publisher,
            locks: SessionLocks::new(),
        }
    }

    /// Provisions a session wallet, resolves the station destination and
    /// persists a new session in Initialized status. The returned view never
    /// contains signing material.
    pub async fn initialize_session(
        &self,
        charging_session_id: &str,
        user_id: &str,
        station_id: &str,
    ) -> Result<SessionView> {
        info!(charging_session_id, station_id, "initializing payment session");

        let wallet = self
            .wallets
            .create_wallet()
            .await
            .map_err(|e| PaymentError::WalletProvisioning(e.to_string()))?;
        let destination = self
            .wallets
            .resolve_destination(station_id)
            .await
            .map_err(|e| PaymentError::WalletProvisioning(e.to_string()))?;

        let session = PaymentSession::new(
            charging_session_id,
            user_id,
            station_id,
            wallet.address,
            wallet.signing_handle,
            destination,
        );
        self.sessions.store(session.clone()).await?;

        info!(
            session_id = %session.id,
            wallet = %session.source_wallet_address,
            destination = %session.destination_address,
            "payment session initialized"
        );
        Ok(session.view())
    }

    /// Settles one energy increment against the ledger.
    ///
    /// `attempt` identifies the settlement attempt: a retried caller must
    /// pass the same value so the derived idempotency key matches and no
    /// duplicate payment is issued.
    ///
    /// Returns the attempt's record: Confirmed on success, Failed/Rejected on
    /// a permanent ledger error. Transient and unknown outcomes return an
    /// error and leave the Pending record in place for a keyed retry.
    pub async fn process_micropayment(
        &self,
        session_id: &SessionId,
        energy_delta: Decimal,
        amount_delta: Decimal,
        attempt: &str,
    ) -> Result<PaymentTransaction> {
        let amount = Amount::new(amount_delta)?;
        if energy_delta < Decimal::ZERO {
            return Err(PaymentError::Validation(
                "energy delta must not be negative".to_string(),
            ));
        }
        let key = IdempotencyKey::derive(session_id, attempt);

        let guard = self.locks.acquire(session_id).await;
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(session_id.clone()))?;
        if !session.status.can_settle() {
            return Err(PaymentError::InvalidState {
                id: session_id.clone(),
                status: session.status,
            });
        }

        let memo = format!(
            "Charge: session {}, energy {}kWh",
            session.charging_session_id, energy_delta
        );
        let outcome = self
            .settle_locked(
                &mut session,
                amount,
                energy_delta,
                TransactionType::Micropayment,
                key,
                Some(memo),
            )
            .await?;
        drop(guard);

        match outcome {
            SettleOutcome::Settled { transaction, event } => {
                if let Some(event) = event {
                    self.publish_best_effort(event).await;
                }
                Ok(transaction)
            }
            SettleOutcome::Unsettled { error, event } => {
                if let Some(event) = event {
                    self.publish_best_effort(event).await;
                }
                Err(error.into())
            }
        }
    }

    /// Handles an inbound energy update by settling its increment. The
    /// attempt marker derives from the update timestamp, so a redelivered
    /// update reuses the same idempotency key.
    pub async fn process_energy_update(&self, update: &EnergyUpdate) -> Result<PaymentTransaction> {
        let attempt = format!("energy-{}", update.timestamp.timestamp_millis());
        self.process_micropayment(
            &update.payment_session_id,
            update.energy_used_delta,
            update.amount_in_xrp_delta,
            &attempt,
        )
        .await
    }

    /// Closes a session, settling any positive residual between the reported
    /// total and what micropayments already paid. Idempotent: finalizing a
    /// terminal session returns its snapshot without touching the ledger.
    pub async fn finalize_session(
        &self,
        session_id: &SessionId,
        reported_energy: Decimal,
        reported_amount: Decimal,
    ) -> Result<SessionView> {
        let guard = self.locks.acquire(session_id).await;
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(session_id.clone()))?;

        if session.status.is_terminal() {
            debug!(session_id = %session.id, status = %session.status, "finalize on terminal session is a no-op");
            return Ok(session.view());
        }

        let remaining = reported_amount - session.total_amount_paid;
        info!(
            session_id = %session.id,
            %reported_amount,
            total_paid = %session.total_amount_paid,
            %remaining,
            "finalizing payment session"
        );

        let mut settle_event = None;
        if remaining > Decimal::ZERO {
            let key = IdempotencyKey::derive(session_id, "finalize");
            let energy_delta =
                (reported_energy - session.total_energy_used).max(Decimal::ZERO);
            let memo = format!("Finalize: session {}", session.charging_session_id);
            let outcome = self
                .settle_locked(
                    &mut session,
                    Amount::new(remaining)?,
                    energy_delta,
                    TransactionType::Finalize,
                    key,
                    Some(memo),
                )
                .await?;
            match outcome {
                SettleOutcome::Settled { transaction, event }
                    if transaction.status == TransactionStatus::Confirmed =>
                {
                    settle_event = event;
                }
                SettleOutcome::Settled { transaction, event } => {
                    // Residual payment was refused; leave the session open
                    // for caller policy instead of completing underpaid.
                    drop(guard);
                    if let Some(event) = event {
                        self.publish_best_effort(event).await;
                    }
                    return Err(LedgerError::Permanent {
                        code: "FINALIZE_NOT_CONFIRMED".to_string(),
                        message: format!(
                            "finalize settlement {} was not confirmed",
                            transaction.id
                        ),
                    }
                    .into());
                }
                SettleOutcome::Unsettled { error, event } => {
                    drop(guard);
                    if let Some(event) = event {
                        self.publish_best_effort(event).await;
                    }
                    return Err(error.into());
                }
            }
        } else if remaining < Decimal::ZERO {
            // Overpayment. Refund policy is undecided; record it and move on.
            warn!(
                session_id = %session.id,
                %remaining,
                "session overpaid at finalize; no refund issued"
            );
        }

        session.complete(reported_energy)?;
        self.sessions.store(session.clone()).await?;

        let view = session.view();
        let finalized = PaymentEvent::SessionFinalized {
            payment_session_id: session.id.clone(),
            charging_session_id: session.charging_session_id.clone(),
            user_id: session.user_id.clone(),
            station_id: session.station_id.clone(),
            total_energy_used: session.total_energy_used,
            total_amount_paid: session.total_amount_paid,
            start_time: session.start_time,
            end_time: session.end_time.unwrap_or_else(Utc::now),
            status: session.status,
            transaction_hashes: session.transaction_hashes.clone(),
            timestamp: Utc::now(),
        };
        drop(guard);

        if let Some(event) = settle_event {
            self.publish_best_effort(event).await;
        }
        self.publish_best_effort(finalized).await;
        Ok(view)
    }

    /// Caller-policy hook: demotes a non-terminal session to Failed or
    /// Cancelled. The engine itself never makes this decision.
    pub async fn abort_session(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> Result<SessionView> {
        if !matches!(status, SessionStatus::Failed | SessionStatus::Cancelled) {
            return Err(PaymentError::Validation(
                "abort status must be failed or cancelled".to_string(),
            ));
        }
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(session_id.clone()))?;
        session.transition(status)?;
        session.end_time = Some(Utc::now());
        self.sessions.store(session.clone()).await?;
        warn!(session_id = %session.id, status = %session.status, "session aborted by caller policy");
        Ok(session.view())
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<SessionView> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(session_id.clone()))?;
        Ok(session.view())
    }

    /// Returns the transactions of all sessions owned by `user_id`, newest
    /// first, truncated to the filter limit. An empty result is not an error.
    pub async fn get_payment_history(
        &self,
        user_id: &str,
        filter: HistoryFilter,
    ) -> Result<Vec<PaymentTransaction>> {
        let session_ids: Vec<SessionId> = self
            .sessions
            .for_user(user_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let mut transactions = self.transactions.for_sessions(&session_ids).await?;
        transactions.retain(|t| {
            filter.from.is_none_or(|from| t.timestamp >= from)
                && filter.to.is_none_or(|to| t.timestamp <= to)
        });
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions.truncate(filter.limit);
        Ok(transactions)
    }

    /// Public wallet state via the ledger. Never returns signing material.
    pub async fn get_wallet_info(&self, address: &Address) -> Result<WalletInfo> {
        let info = self.ledger.get_account_info(address).await?;
        Ok(WalletInfo {
            address: address.clone(),
            balance: info.balance,
            sequence: info.sequence,
        })
    }

    /// Executes one settlement attempt. Must be called while holding the
    /// session's exclusive region; never publishes events itself.
    async fn settle_locked(
        &self,
        session: &mut PaymentSession,
        amount: Amount,
        energy: Decimal,
        r#type: TransactionType,
        key: IdempotencyKey,
        memo: Option<String>,
    ) -> Result<SettleOutcome> {
        let mut tx = match self.transactions.find_by_key(&key).await? {
            Some(prior) => match prior.status {
                TransactionStatus::Confirmed
                | TransactionStatus::Failed
                | TransactionStatus::Rejected => {
                    debug!(key = %key, status = ?prior.status, "settlement attempt replayed; returning prior record");
                    return Ok(SettleOutcome::Settled {
                        transaction: prior,
                        event: None,
                    });
                }
                // A Pending record means an earlier attempt ended with an
                // unknown outcome. Reconcile against the ledger before any
                // resubmission, to rule out a duplicate payment.
                TransactionStatus::Pending => {
                    match self.ledger.get_transaction(&key).await {
                        Ok(Some(LedgerTxStatus::Confirmed(hash))) => {
                            let mut tx = prior;
                            tx.confirm(hash.clone());
                            session.apply_settlement(tx.amount, tx.energy_amount, hash)?;
                            self.transactions.store(tx.clone()).await?;
                            self.sessions.store(session.clone()).await?;
                            info!(key = %key, "reconciliation found earlier submission confirmed");
                            let event = Self::confirmed_event(session, &tx);
                            return Ok(SettleOutcome::Settled {
                                transaction: tx,
                                event: Some(event),
                            });
                        }
                        Ok(Some(LedgerTxStatus::Rejected { code, message })) => {
                            let mut tx = prior;
                            tx.reject();
                            self.transactions.store(tx.clone()).await?;
                            let error = LedgerError::Permanent { code, message };
                            let event = Self::failed_event(session, &tx, &error);
                            return Ok(SettleOutcome::Settled {
                                transaction: tx,
                                event: Some(event),
                            });
                        }
                        // Never executed; resubmitting the same key is safe.
                        Ok(None) => prior,
                        Err(error) => {
                            warn!(key = %key, %error, "reconciliation query failed; retry later");
                            return Ok(SettleOutcome::Unsettled { error, event: None });
                        }
                    }
                }
            },
            None => {
                let tx = PaymentTransaction::pending(
                    session.id.clone(),
                    key.clone(),
                    session.source_wallet_address.clone(),
                    session.destination_address.clone(),
                    amount,
                    energy,
                    r#type,
                    memo,
                );
                // Persisted before submission so an unknown outcome can be
                // reconciled by key.
                self.transactions.store(tx.clone()).await?;
                tx
            }
        };

        match self
            .ledger
            .submit_payment(
                &session.signing_handle,
                &session.destination_address,
                tx.amount,
                &key,
                tx.memo.as_deref(),
            )
            .await
        {
            Ok(hash) => {
                tx.confirm(hash.clone());
                session.apply_settlement(tx.amount, tx.energy_amount, hash.clone())?;
                self.transactions.store(tx.clone()).await?;
                self.sessions.store(session.clone()).await?;
                info!(
                    session_id = %session.id,
                    tx_hash = %hash,
                    amount = %tx.amount,
                    total_paid = %session.total_amount_paid,
                    "settlement confirmed"
                );
                let event = Self::confirmed_event(session, &tx);
                Ok(SettleOutcome::Settled {
                    transaction: tx,
                    event: Some(event),
                })
            }
            Err(error @ LedgerError::Permanent { .. }) => {
                tx.fail();
                self.transactions.store(tx.clone()).await?;
                warn!(session_id = %session.id, %error, "settlement permanently failed");
                let event = Self::failed_event(session, &tx, &error);
                Ok(SettleOutcome::Settled {
                    transaction: tx,
                    event: Some(event),
                })
            }
            Err(error) => {
                // Transient or unknown: totals untouched, record stays
                // Pending under its key for a reconciled retry.
                warn!(session_id = %session.id, %error, "settlement not acknowledged");
                let event = Self::failed_event(session, &tx, &error);
                Ok(SettleOutcome::Unsettled {
                    error,
                    event: Some(event),
                })
            }
        }
    }

    fn envelope(session: &PaymentSession, tx: &PaymentTransaction) -> PaymentEnvelope {
        PaymentEnvelope {
            payment_session_id: session.id.clone(),
            charging_session_id: session.charging_session_id.clone(),
            user_id: session.user_id.clone(),
            station_id: session.station_id.clone(),
            transaction_id: tx.id.clone(),
            transaction_hash: tx.transaction_hash.clone(),
            amount_in_xrp: tx.amount,
            energy_amount: tx.energy_amount,
            timestamp: tx.timestamp,
        }
    }

    fn confirmed_event(session: &PaymentSession, tx: &PaymentTransaction) -> PaymentEvent {
        PaymentEvent::PaymentConfirmed {
            envelope: Self::envelope(session, tx),
            total_energy_used: session.total_energy_used,
            total_amount_paid: session.total_amount_paid,
            transaction_type: tx.r#type,
        }
    }

    fn failed_event(
        session: &PaymentSession,
        tx: &PaymentTransaction,
        error: &LedgerError,
    ) -> PaymentEvent {
        PaymentEvent::PaymentFailed {
            envelope: Self::envelope(session, tx),
            error_message: error.message().to_string(),
            error_code: error.code().to_string(),
            retry_count: 0,
            should_retry: error.should_retry(),
        }
    }

    async fn publish_best_effort(&self, event: PaymentEvent) {
        if let Err(error) = self.publisher.publish(event).await {
            // At-least-once effort only; never fail the request over the bus.
            warn!(%error, "outcome event publish failed");
        }
    }
}
