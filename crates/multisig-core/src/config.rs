//! Client configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chain_eth::chains::{self, Deployments};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::contract::ReceiptPolling;
use crate::error::SyncError;

/// Environment variable holding the signer's hex private key.
pub const PRIVATE_KEY_ENV: &str = "MULTISIG_PRIVATE_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// JSON-RPC endpoint. Empty means the chain's built-in default.
    pub rpc_url: String,
    pub chain_id: u64,
    pub cache_dir: PathBuf,
    /// Multisig contract address per chain ID.
    pub deployments: Deployments,
    /// Connected account for read-only sessions (no signer key).
    pub account: Option<String>,
    /// Shown on the dashboard; the contract is the authority.
    pub signers: u32,
    pub required_confirmations: u32,
    pub receipt_poll_ms: u64,
    pub receipt_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Keep up to this many contracts cached across runs. Unset evicts a
    /// contract's entry as soon as it is no longer watched.
    pub cache_retain_entries: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            chain_id: chains::ANVIL.chain_id,
            cache_dir: PathBuf::from("./multisig_cache"),
            deployments: Deployments::new(),
            account: None,
            signers: 5,
            required_confirmations: 3,
            receipt_poll_ms: 1_000,
            receipt_timeout_secs: 120,
            request_timeout_secs: 30,
            cache_retain_entries: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, SyncError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.required_confirmations > self.signers {
            return Err(SyncError::Config(format!(
                "required_confirmations ({}) exceeds signers ({})",
                self.required_confirmations, self.signers
            )));
        }
        if self.receipt_poll_ms == 0 {
            return Err(SyncError::Config("receipt_poll_ms must be positive".into()));
        }
        if let Some(account) = &self.account {
            chain_eth::address::parse_address(account)
                .map_err(|e| SyncError::Config(format!("account: {e}")))?;
        }
        Ok(())
    }

    /// RPC endpoint, falling back to the built-in URL for known chains.
    pub fn resolved_rpc_url(&self) -> Result<String, SyncError> {
        if !self.rpc_url.is_empty() {
            return Ok(self.rpc_url.clone());
        }
        chains::get_chain(self.chain_id)
            .map(|c| c.default_rpc_url.to_string())
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "no rpc_url configured and chain {} has no default",
                    self.chain_id
                ))
            })
    }

    /// The multisig deployed on the configured chain, if any.
    pub fn multisig_address(&self) -> Option<&str> {
        self.deployments.multisig_address(self.chain_id)
    }

    /// Native currency symbol for balances.
    pub fn native_symbol(&self) -> &'static str {
        chains::get_chain(self.chain_id)
            .map(|c| c.symbol)
            .unwrap_or("ETH")
    }

    /// Block explorer link for a submitted transaction, when the chain has one.
    pub fn explorer_tx_url(&self, hash: &str) -> Option<String> {
        chains::get_chain(self.chain_id).and_then(|c| c.tx_url(hash))
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self.cache_retain_entries {
            Some(max_entries) => CachePolicy::Retain { max_entries },
            None => CachePolicy::EvictOnTeardown,
        }
    }

    pub fn receipt_polling(&self) -> ReceiptPolling {
        ReceiptPolling {
            interval: Duration::from_millis(self.receipt_poll_ms),
            timeout: Duration::from_secs(self.receipt_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads the signer key from [`PRIVATE_KEY_ENV`], if set and non-empty.
pub fn signer_key_from_env() -> Option<SecretString> {
    std::env::var(PRIVATE_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::from)
}
