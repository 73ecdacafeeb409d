use crate::domain::session::{SessionId, SessionStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors surfaced by the settlement engine.
///
/// Ledger failures keep their transient/permanent/unknown classification so
/// callers can decide whether a retry (with the same idempotency key) is safe.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment session {0} not found")]
    NotFound(SessionId),
    #[error("payment session {id} is not in a payable state ({status})")]
    InvalidState { id: SessionId, status: SessionStatus },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("wallet provisioning failed: {0}")]
    WalletProvisioning(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Classified outcome of a ledger submission or query.
///
/// `Unknown` means the submission may or may not have executed; the engine
/// must reconcile via `LedgerGateway::get_transaction` before any retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("transient ledger error ({code}): {message}")]
    Transient { code: String, message: String },
    #[error("permanent ledger error ({code}): {message}")]
    Permanent { code: String, message: String },
    #[error("ledger outcome unknown ({code}): {message}")]
    Unknown { code: String, message: String },
}

impl LedgerError {
    pub fn code(&self) -> &str {
        match self {
            Self::Transient { code, .. }
            | Self::Permanent { code, .. }
            | Self::Unknown { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. }
            | Self::Permanent { message, .. }
            | Self::Unknown { message, .. } => message,
        }
    }

    /// Whether re-invoking with the same idempotency key may succeed.
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }
}

/// Event-bus failure. Logged and swallowed by the engine; never rolls back a
/// confirmed settlement and never surfaces as a request failure.
#[derive(Error, Debug)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);
