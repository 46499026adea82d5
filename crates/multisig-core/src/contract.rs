//! Read and write access to a deployed multisig timelock contract.
//!
//! [`ContractReader`] and [`ContractWriter`] are the seams everything else
//! is built on; the RPC-backed implementations here talk to a node, tests
//! substitute in-memory fakes.

use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use chain_eth::multisig::{self, OnChainTransaction};
use chain_eth::transaction::{build_contract_call, sign_transaction, FeeParams};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::error::SyncError;
use crate::rpc::RpcClient;
use crate::types::Receipt;

#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn owner(&self, contract: &str) -> Result<String, SyncError>;

    async fn transaction_count(&self, contract: &str) -> Result<u64, SyncError>;

    async fn transaction(&self, contract: &str, index: u64)
        -> Result<OnChainTransaction, SyncError>;

    /// Native balance held by `address`, in wei.
    async fn balance(&self, address: &str) -> Result<U256, SyncError>;
}

/// A state-changing multisig operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Propose { to: String, value: U256, data: Vec<u8> },
    Confirm(u64),
    Revoke(u64),
    Execute(u64),
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            ContractCall::Propose { .. } => "proposeTransaction",
            ContractCall::Confirm(_) => "confirmTransaction",
            ContractCall::Revoke(_) => "revokeConfirmation",
            ContractCall::Execute(_) => "executeTransaction",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(match self {
            ContractCall::Propose { to, value, data } => {
                multisig::encode_propose_transaction(to, *value, data)?
            }
            ContractCall::Confirm(id) => multisig::encode_confirm_transaction(*id),
            ContractCall::Revoke(id) => multisig::encode_revoke_confirmation(*id),
            ContractCall::Execute(id) => multisig::encode_execute_transaction(*id),
        })
    }
}

#[async_trait]
pub trait ContractWriter: Send + Sync {
    /// Address the writer signs as.
    fn account(&self) -> &str;

    /// Submits `call` to `contract` and returns the transaction hash.
    async fn submit(&self, contract: &str, call: &ContractCall) -> Result<String, SyncError>;

    async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, SyncError>;
}

/// [`ContractReader`] over `eth_call`.
#[derive(Clone)]
pub struct RpcReader {
    rpc: RpcClient,
}

impl RpcReader {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ContractReader for RpcReader {
    async fn owner(&self, contract: &str) -> Result<String, SyncError> {
        let raw = self.rpc.call(contract, &multisig::encode_owner()).await?;
        Ok(multisig::decode_owner(&raw)?)
    }

    async fn transaction_count(&self, contract: &str) -> Result<u64, SyncError> {
        let raw = self
            .rpc
            .call(contract, &multisig::encode_get_transaction_count())
            .await?;
        Ok(multisig::decode_transaction_count(&raw)?)
    }

    async fn transaction(
        &self,
        contract: &str,
        index: u64,
    ) -> Result<OnChainTransaction, SyncError> {
        let raw = self
            .rpc
            .call(contract, &multisig::encode_get_transaction(index))
            .await?;
        Ok(multisig::decode_transaction(&raw)?)
    }

    async fn balance(&self, address: &str) -> Result<U256, SyncError> {
        self.rpc.get_balance(address).await
    }
}

/// Polling parameters for [`ContractWriter::wait_for_receipt`].
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub timeout: Duration,
}

/// [`ContractWriter`] that signs EIP-1559 transactions locally and
/// broadcasts them with `eth_sendRawTransaction`.
pub struct RpcSigner {
    rpc: RpcClient,
    chain_id: u64,
    account: String,
    private_key: SecretString,
    polling: ReceiptPolling,
}

impl RpcSigner {
    /// Builds a signer from a hex private key (with or without `0x`).
    pub fn new(
        rpc: RpcClient,
        chain_id: u64,
        private_key: SecretString,
        polling: ReceiptPolling,
    ) -> Result<Self, SyncError> {
        let mut key = decode_private_key(&private_key)?;
        let account = chain_eth::address::address_from_private_key(&key);
        key.zeroize();
        Ok(Self {
            rpc,
            chain_id,
            account: account?,
            private_key,
            polling,
        })
    }

    async fn fees(&self, contract: &str, data: &[u8]) -> Result<FeeParams, SyncError> {
        let estimate = self.rpc.estimate_gas(&self.account, contract, data).await?;
        let priority = self.rpc.max_priority_fee_per_gas().await?;
        let gas_price = self.rpc.gas_price().await?;
        Ok(FeeParams {
            max_priority_fee_per_gas: priority,
            // Leave headroom for one base-fee doubling.
            max_fee_per_gas: gas_price.saturating_mul(2).saturating_add(priority),
            gas_limit: estimate.saturating_add(estimate / 5),
        })
    }
}

#[async_trait]
impl ContractWriter for RpcSigner {
    fn account(&self) -> &str {
        &self.account
    }

    async fn submit(&self, contract: &str, call: &ContractCall) -> Result<String, SyncError> {
        let data = call.encode()?;
        let nonce = self.rpc.get_transaction_count(&self.account).await?;
        let fees = self.fees(contract, &data).await?;

        let tx = build_contract_call(self.chain_id, nonce, contract, U256::ZERO, data, fees)?;

        let mut key = decode_private_key(&self.private_key)?;
        let signed = sign_transaction(&tx, &key);
        key.zeroize();
        let signed = signed?;

        let hash = self.rpc.send_raw_transaction(&signed.raw).await?;
        check_node_hash(&signed.hash_hex(), &hash);
        info!(call = call.name(), %contract, nonce, %hash, "transaction submitted");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, SyncError> {
        let deadline = Instant::now() + self.polling.timeout;
        loop {
            if let Some(receipt) = self.rpc.get_transaction_receipt(hash).await? {
                debug!(%hash, block = receipt.block_number, "receipt received");
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(SyncError::ReceiptTimeout(hash.to_string()));
            }
            sleep(self.polling.interval).await;
        }
    }
}

/// Logs when the node reports a hash other than the one signed locally.
/// Returns whether they agree.
fn check_node_hash(local: &str, reported: &str) -> bool {
    let agree = local.eq_ignore_ascii_case(reported);
    if !agree {
        warn!(%local, %reported, "node returned a different transaction hash");
    }
    agree
}

fn decode_private_key(secret: &SecretString) -> Result<[u8; 32], SyncError> {
    let hex_str = secret.expose_secret().trim();
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let mut bytes = hex::decode(hex_str)
        .map_err(|_| SyncError::Signer("private key is not valid hex".into()))?;
    if bytes.len() != 32 {
        let len = bytes.len();
        bytes.zeroize();
        return Err(SyncError::Signer(format!(
            "private key must be 32 bytes, got {len}"
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(key)
}
