use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("RPC error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    /// A user-facing precondition failed before anything was submitted.
    #[error("{0}")]
    Action(String),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signer error: {0}")]
    Signer(String),
}

impl From<chain_eth::error::EthError> for SyncError {
    fn from(e: chain_eth::error::EthError) -> Self {
        use chain_eth::error::EthError;
        match e {
            EthError::DecodingError(msg) => SyncError::Decode(msg),
            EthError::InvalidPrivateKey(_) | EthError::SigningError(_) => {
                SyncError::Signer(e.to_string())
            }
            other => SyncError::Action(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Rpc(e.to_string())
    }
}
