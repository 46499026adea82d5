//! JSON-RPC 2.0 transport to an EVM node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;

use crate::error::SyncError;
use crate::types::Receipt;

/// HTTP client for an EVM node's JSON-RPC endpoint.
///
/// Cloning is cheap; clones share the connection pool and request counter.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

impl RpcClient {
    /// Creates a client targeting `url` (e.g. `http://127.0.0.1:8545`).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::Rpc(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one request and deserializes its `result`.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SyncError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(%method, id, "rpc request");

        let response = self.http.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::Rpc(format!(
                "{method}: node returned HTTP {}",
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Rpc(format!("{method}: invalid JSON response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(SyncError::RpcResponse {
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(parsed.result.unwrap_or(Value::Null))
            .map_err(|e| SyncError::Decode(format!("{method}: unexpected result: {e}")))
    }

    pub async fn chain_id(&self) -> Result<u64, SyncError> {
        let raw: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity_u64(&raw)
    }

    /// Executes a read-only call against the latest block.
    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, SyncError> {
        let raw: String = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": encode_hex(data) }, "latest"]),
            )
            .await?;
        decode_hex(&raw)
    }

    pub async fn get_balance(&self, address: &str) -> Result<U256, SyncError> {
        let raw: String = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity_u256(&raw)
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn get_transaction_count(&self, address: &str) -> Result<u64, SyncError> {
        let raw: String = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity_u64(&raw)
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &[u8]) -> Result<u64, SyncError> {
        let raw: String = self
            .request(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": encode_hex(data) }]),
            )
            .await?;
        parse_quantity_u64(&raw)
    }

    pub async fn gas_price(&self) -> Result<u128, SyncError> {
        let raw: String = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity_u128(&raw)
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<u128, SyncError> {
        let raw: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_quantity_u128(&raw)
    }

    /// Broadcasts a signed transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<String, SyncError> {
        self.request("eth_sendRawTransaction", json!([encode_hex(raw_tx)]))
            .await
    }

    /// Returns the receipt, or `None` while the transaction is unmined.
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, SyncError> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let Some(block) = raw.block_number else {
            return Ok(None);
        };

        Ok(Some(Receipt {
            transaction_hash: raw.transaction_hash,
            block_number: parse_quantity_u64(&block)?,
            // Pre-Byzantium receipts carry no status; treat as success.
            success: match raw.status.as_deref() {
                Some(status) => parse_quantity_u64(status)? == 1,
                None => true,
            },
        }))
    }
}

pub(crate) fn encode_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub(crate) fn decode_hex(raw: &str) -> Result<Vec<u8>, SyncError> {
    let digits = strip_0x(raw);
    hex::decode(digits).map_err(|e| SyncError::Decode(format!("invalid hex data {raw:?}: {e}")))
}

fn strip_0x(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

pub(crate) fn parse_quantity_u64(raw: &str) -> Result<u64, SyncError> {
    u64::from_str_radix(strip_0x(raw), 16)
        .map_err(|e| SyncError::Decode(format!("invalid quantity {raw:?}: {e}")))
}

pub(crate) fn parse_quantity_u128(raw: &str) -> Result<u128, SyncError> {
    u128::from_str_radix(strip_0x(raw), 16)
        .map_err(|e| SyncError::Decode(format!("invalid quantity {raw:?}: {e}")))
}

pub(crate) fn parse_quantity_u256(raw: &str) -> Result<U256, SyncError> {
    U256::from_str_radix(strip_0x(raw), 16)
        .map_err(|e| SyncError::Decode(format!("invalid quantity {raw:?}: {e}")))
}
