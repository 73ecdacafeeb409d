use crate::domain::session::{SessionId, SessionStatus};
use crate::domain::transaction::{TransactionId, TransactionType, TxHash};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inbound trigger: an energy-consumption increment for a charging session.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct EnergyUpdate {
    pub charging_session_id: String,
    pub payment_session_id: SessionId,
    pub user_id: String,
    pub station_id: String,
    pub energy_used_delta: Decimal,
    pub amount_in_xrp_delta: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Fields shared by the per-settlement outcome events.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentEnvelope {
    pub payment_session_id: SessionId,
    pub charging_session_id: String,
    pub user_id: String,
    pub station_id: String,
    pub transaction_id: TransactionId,
    /// Absent when the submission never reached the ledger.
    pub transaction_hash: Option<TxHash>,
    pub amount_in_xrp: Decimal,
    pub energy_amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Outcome events emitted by the engine, one per settlement attempt
/// (best-effort delivery; a publish failure is logged and swallowed).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kind")]
pub enum PaymentEvent {
    PaymentConfirmed {
        #[serde(flatten)]
        envelope: PaymentEnvelope,
        total_energy_used: Decimal,
        total_amount_paid: Decimal,
        transaction_type: TransactionType,
    },
    PaymentFailed {
        #[serde(flatten)]
        envelope: PaymentEnvelope,
        error_message: String,
        error_code: String,
        retry_count: u32,
        should_retry: bool,
    },
    SessionFinalized {
        payment_session_id: SessionId,
        charging_session_id: String,
        user_id: String,
        station_id: String,
        total_energy_used: Decimal,
        total_amount_paid: Decimal,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: SessionStatus,
        transaction_hashes: Vec<TxHash>,
        timestamp: DateTime<Utc>,
    },
}

impl PaymentEvent {
    pub fn payment_session_id(&self) -> &SessionId {
        match self {
            Self::PaymentConfirmed { envelope, .. } | Self::PaymentFailed { envelope, .. } => {
                &envelope.payment_session_id
            }
            Self::SessionFinalized {
                payment_session_id, ..
            } => payment_session_id,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::PaymentConfirmed { .. })
    }
}
