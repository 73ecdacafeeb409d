use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque signing capability for a session wallet.
///
/// The token references key material held by the wallet provisioner; the
/// material itself never passes through this type. The handle is persisted
/// with the owning session record but is excluded from every public view,
/// and its `Debug` output is redacted so it cannot leak through logs or
/// error messages.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningHandle(String);

impl SigningHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for gateway adapters only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningHandle(..)")
    }
}

/// Result of provisioning an ephemeral session wallet.
#[derive(Debug, Clone)]
pub struct ProvisionedWallet {
    pub address: Address,
    pub signing_handle: SigningHandle,
}

/// Balance and sequence for a ledger account, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: Decimal,
    pub sequence: u32,
}

/// Public wallet state returned to callers. Never carries signing material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,
    pub balance: Decimal,
    pub sequence: u32,
}
