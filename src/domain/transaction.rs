use crate::domain::session::SessionId;
use crate::domain::wallet::Address;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a settlement attempt record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a transaction accepted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token permitting safe retry of a settlement without a double payment.
///
/// Derived from the session id plus an attempt marker, so a retried caller
/// reproduces the same key and the engine can find the earlier attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(session_id: &SessionId, attempt: &str) -> Self {
        Self(format!("{}:{}", session_id, attempt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-negative XRP amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::Validation(
                "amount must not be negative".to_string(),
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

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Submitted (or about to be submitted) with no acknowledged outcome yet.
    Pending,
    Confirmed,
    Failed,
    /// Executed by the ledger and refused there.
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Initialize,
    Micropayment,
    Finalize,
    Refund,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::Micropayment => "micropayment",
            Self::Finalize => "finalize",
            Self::Refund => "refund",
        };
        f.write_str(name)
    }
}

/// Append-only record of one settlement attempt.
///
/// Exactly one record exists per attempt; a retry reusing the same
/// idempotency key updates this record instead of creating a second one.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub payment_session_id: SessionId,
    pub idempotency_key: IdempotencyKey,
    /// Absent while Pending or when the submission never reached the ledger.
    pub transaction_hash: Option<TxHash>,
    pub sender_address: Address,
    pub receiver_address: Address,
    pub amount: Decimal,
    pub energy_amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub r#type: TransactionType,
    pub memo: Option<String>,
}

impl PaymentTransaction {
    /// Creates the Pending record for a settlement attempt, persisted before
    /// the ledger submission so an unknown outcome can be reconciled later.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        session_id: SessionId,
        key: IdempotencyKey,
        sender: Address,
        receiver: Address,
        amount: Amount,
        energy_amount: Decimal,
        r#type: TransactionType,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            payment_session_id: session_id,
            idempotency_key: key,
            transaction_hash: None,
            sender_address: sender,
            receiver_address: receiver,
            amount: amount.value(),
            energy_amount,
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
            r#type,
            memo,
        }
    }

    pub fn confirm(&mut self, hash: TxHash) {
        self.transaction_hash = Some(hash);
        self.status = TransactionStatus::Confirmed;
        self.timestamp = Utc::now();
    }

    pub fn fail(&mut self) {
        self.status = TransactionStatus::Failed;
        self.timestamp = Utc::now();
    }

    pub fn reject(&mut self) {
        self.status = TransactionStatus::Rejected;
        self.timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_accepts_zero_and_positive() {
        assert!(Amount::new(dec!(0.0)).is_ok());
        assert!(Amount::new(dec!(1.5)).is_ok());
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_idempotency_key_is_stable_per_attempt() {
        let session = SessionId::generate();
        let a = IdempotencyKey::derive(&session, "7");
        let b = IdempotencyKey::derive(&session, "7");
        let c = IdempotencyKey::derive(&session, "8");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_pending_record_has_no_hash() {
        let session = SessionId::generate();
        let tx = PaymentTransaction::pending(
            session.clone(),
            IdempotencyKey::derive(&session, "1"),
            Address::new("rSender"),
            Address::new("rReceiver"),
            Amount::new(dec!(1.0)).unwrap(),
            dec!(2.0),
            TransactionType::Micropayment,
            None,
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.transaction_hash.is_none());
    }

    #[test]
    fn test_confirm_sets_hash_and_status() {
        let session = SessionId::generate();
        let mut tx = PaymentTransaction::pending(
            session.clone(),
            IdempotencyKey::derive(&session, "1"),
            Address::new("rSender"),
            Address::new("rReceiver"),
            Amount::new(dec!(1.0)).unwrap(),
            dec!(2.0),
            TransactionType::Micropayment,
            None,
        );
        tx.confirm(TxHash::new("ABC123"));
        assert_eq!(tx.status, TransactionStatus::Confirmed);
        assert_eq!(tx.transaction_hash, Some(TxHash::new("ABC123")));
    }
}
