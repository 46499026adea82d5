use thiserror::Error;

/// Errors from address handling, ABI coding and transaction signing.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    /// Contract return data or configuration that does not parse.
    #[error("decoding error: {0}")]
    DecodingError(String),
}
