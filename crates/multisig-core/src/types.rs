use alloy_primitives::U256;
use chain_eth::multisig::OnChainTransaction;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::units::wei_to_native_f64;

/// A multisig transaction as shown to the user and stored in the cache.
///
/// Field names follow the cache layout shared with the browser client
/// (`timelock` holds the proposal timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTx {
    /// Position in on-chain storage.
    pub id: u64,
    pub to: String,
    /// Native amount for display (`value_wei / 1e18`).
    pub amount: f64,
    /// Exact value in wei, stored as a decimal string.
    #[serde(default, with = "decimal_u256")]
    pub value_wei: U256,
    pub confirmations: u64,
    pub executed: bool,
    #[serde(rename = "timelock", default)]
    pub proposed_at: u64,
}

mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Accepts decimal or `0x` hex so older hex entries still load.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<U256>().map_err(serde::de::Error::custom)
    }
}

impl MultisigTx {
    pub fn from_on_chain(id: u64, tx: OnChainTransaction) -> Result<Self, SyncError> {
        Ok(Self {
            id,
            to: tx.to,
            amount: wei_to_native_f64(tx.value),
            value_wei: tx.value,
            confirmations: narrow(tx.confirmations, "confirmations")?,
            executed: tx.executed,
            proposed_at: narrow(tx.proposed_at, "proposedAt")?,
        })
    }

    pub fn is_pending(&self) -> bool {
        !self.executed
    }
}

fn narrow(value: U256, field: &str) -> Result<u64, SyncError> {
    u64::try_from(value)
        .map_err(|_| SyncError::Decode(format!("{field} {value} does not fit in u64")))
}

/// Published state of a [`TransactionSync`](crate::sync::TransactionSync).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    /// Newest first.
    pub transactions: Vec<MultisigTx>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Which slice of the transaction list a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxTab {
    #[default]
    Pending,
    Executed,
    All,
}

impl TxTab {
    pub fn includes(&self, tx: &MultisigTx) -> bool {
        match self {
            TxTab::Pending => !tx.executed,
            TxTab::Executed => tx.executed,
            TxTab::All => true,
        }
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub success: bool,
}

/// Connection state supplied by the signing client. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub account: Option<String>,
    pub chain_id: u64,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}
