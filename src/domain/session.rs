use crate::domain::transaction::TxHash;
use crate::domain::wallet::{Address, SigningHandle};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a payment session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initialized,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a settlement may be issued in this state.
    pub fn can_settle(&self) -> bool {
        matches!(self, Self::Initialized | Self::Active)
    }

    /// Legal status transitions. Terminal states accept nothing.
    pub fn can_transition(&self, to: SessionStatus) -> bool {
        match (self, to) {
            (Self::Initialized, Self::Active) => true,
            (Self::Active, Self::Active) => true,
            (Self::Initialized | Self::Active, Self::Completed) => true,
            (from, Self::Failed | Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Stored state of a payment session.
///
/// Owned exclusively by the session store; all mutation goes through the
/// engine under the session's exclusive settlement region. Carries the
/// signing handle for the session wallet, which must never appear in a
/// value returned to a caller — see [`SessionView`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentSession {
    pub id: SessionId,
    pub charging_session_id: String,
    pub user_id: String,
    pub station_id: String,
    pub source_wallet_address: Address,
    pub destination_address: Address,
    pub signing_handle: SigningHandle,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_energy_used: Decimal,
    pub total_amount_paid: Decimal,
    /// Hashes of confirmed transactions, in settlement order.
    pub transaction_hashes: Vec<TxHash>,
    pub status: SessionStatus,
}

impl PaymentSession {
    pub fn new(
        charging_session_id: impl Into<String>,
        user_id: impl Into<String>,
        station_id: impl Into<String>,
        source_wallet_address: Address,
        signing_handle: SigningHandle,
        destination_address: Address,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            charging_session_id: charging_session_id.into(),
            user_id: user_id.into(),
            station_id: station_id.into(),
            source_wallet_address,
            destination_address,
            signing_handle,
            start_time: Utc::now(),
            end_time: None,
            total_energy_used: Decimal::ZERO,
            total_amount_paid: Decimal::ZERO,
            transaction_hashes: Vec::new(),
            status: SessionStatus::Initialized,
        }
    }

    pub fn transition(&mut self, to: SessionStatus) -> Result<(), PaymentError> {
        if self.status.can_transition(to) {
            self.status = to;
            Ok(())
        } else {
            Err(PaymentError::InvalidState {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }

    /// Applies a confirmed settlement: advances to Active, accumulates the
    /// totals and appends the hash. Must be called inside the session's
    /// exclusive region.
    pub fn apply_settlement(
        &mut self,
        amount: Decimal,
        energy: Decimal,
        hash: TxHash,
    ) -> Result<(), PaymentError> {
        self.transition(SessionStatus::Active)?;
        self.total_amount_paid += amount;
        self.total_energy_used += energy;
        self.transaction_hashes.push(hash);
        Ok(())
    }

    /// Closes the session. `total_amount_paid` stays the sum of confirmed
    /// settlements; the reported energy only raises the energy figure, since
    /// metering may outpace the settled increments.
    pub fn complete(&mut self, reported_energy: Decimal) -> Result<(), PaymentError> {
        self.transition(SessionStatus::Completed)?;
        self.end_time = Some(Utc::now());
        self.total_energy_used = self.total_energy_used.max(reported_energy);
        Ok(())
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            charging_session_id: self.charging_session_id.clone(),
            user_id: self.user_id.clone(),
            station_id: self.station_id.clone(),
            source_wallet_address: self.source_wallet_address.clone(),
            destination_address: self.destination_address.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            total_energy_used: self.total_energy_used,
            total_amount_paid: self.total_amount_paid,
            transaction_hashes: self.transaction_hashes.clone(),
            status: self.status,
        }
    }
}

/// Public snapshot of a session. Deliberately has no signing handle field,
/// so signing material cannot leak through a return value.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SessionView {
    pub id: SessionId,
    pub charging_session_id: String,
    pub user_id: String,
    pub station_id: String,
    pub source_wallet_address: Address,
    pub destination_address: Address,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_energy_used: Decimal,
    pub total_amount_paid: Decimal,
    pub transaction_hashes: Vec<TxHash>,
    pub status: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session() -> PaymentSession {
        PaymentSession::new(
            "chg-1",
            "user-1",
            "stn-1",
            Address::new("rSource"),
            SigningHandle::new("token"),
            Address::new("rDest"),
        )
    }

    #[test]
    fn test_initialized_activates_on_first_settlement() {
        let mut s = session();
        s.apply_settlement(dec!(1.0), dec!(2.0), TxHash::new("H1"))
            .unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.total_amount_paid, dec!(1.0));
        assert_eq!(s.total_energy_used, dec!(2.0));
        assert_eq!(s.transaction_hashes.len(), 1);
    }

    #[test]
    fn test_active_accepts_further_settlements() {
        let mut s = session();
        s.apply_settlement(dec!(1.0), dec!(2.0), TxHash::new("H1"))
            .unwrap();
        s.apply_settlement(dec!(1.5), dec!(3.0), TxHash::new("H2"))
            .unwrap();
        assert_eq!(s.total_amount_paid, dec!(2.5));
        assert_eq!(s.total_energy_used, dec!(5.0));
        assert_eq!(s.transaction_hashes.len(), 2);
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::Cancelled,
        ] {
            assert!(!terminal.can_transition(SessionStatus::Active));
            assert!(!terminal.can_transition(SessionStatus::Completed));
            assert!(!terminal.can_transition(SessionStatus::Failed));
            assert!(!terminal.can_settle());
        }
    }

    #[test]
    fn test_non_terminal_can_fail_or_cancel() {
        assert!(SessionStatus::Initialized.can_transition(SessionStatus::Failed));
        assert!(SessionStatus::Active.can_transition(SessionStatus::Cancelled));
    }

    #[test]
    fn test_settlement_rejected_after_completion() {
        let mut s = session();
        s.complete(dec!(0.0)).unwrap();
        let err = s.apply_settlement(dec!(1.0), dec!(1.0), TxHash::new("H1"));
        assert!(matches!(err, Err(PaymentError::InvalidState { .. })));
    }

    #[test]
    fn test_complete_keeps_paid_total_and_raises_energy() {
        let mut s = session();
        s.apply_settlement(dec!(2.0), dec!(1.0), TxHash::new("H1"))
            .unwrap();
        s.complete(dec!(4.0)).unwrap();
        assert_eq!(s.total_amount_paid, dec!(2.0));
        assert_eq!(s.total_energy_used, dec!(4.0));
        assert!(s.end_time.is_some());
    }

    #[test]
    fn test_view_serializes_without_signing_handle() {
        let s = session();
        let json = serde_json::to_string(&s.view()).unwrap();
        assert!(!json.contains("token"));
        assert!(!json.contains("signing_handle"));
    }
}
