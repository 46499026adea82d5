//! Call encoding for the multisig timelock wallet contract.

use alloy_primitives::U256;

use crate::abi::{
    decode_address, decode_params, decode_uint256, encode_function_call, selector, AbiParam,
    AbiType,
};
use crate::address::{format_address, parse_address};
use crate::error::EthError;

pub const OWNER_SIG: &str = "owner()";
pub const GET_TRANSACTION_COUNT_SIG: &str = "getTransactionCount()";
pub const GET_TRANSACTION_SIG: &str = "getTransaction(uint256)";
pub const PROPOSE_TRANSACTION_SIG: &str = "proposeTransaction(address,uint256,bytes)";
pub const CONFIRM_TRANSACTION_SIG: &str = "confirmTransaction(uint256)";
pub const REVOKE_CONFIRMATION_SIG: &str = "revokeConfirmation(uint256)";
pub const EXECUTE_TRANSACTION_SIG: &str = "executeTransaction(uint256)";

/// Return shape of `getTransaction(uint256)`:
/// `(address to, uint256 value, bytes data, uint256 confirmations,
///   uint256 proposedAt, bool executed)`.
const GET_TRANSACTION_RETURNS: [AbiType; 6] = [
    AbiType::Address,
    AbiType::Uint256,
    AbiType::Bytes,
    AbiType::Uint256,
    AbiType::Uint256,
    AbiType::Bool,
];

/// A transaction as stored on-chain, before any display conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainTransaction {
    /// Checksummed recipient address.
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
    pub confirmations: U256,
    pub proposed_at: U256,
    pub executed: bool,
}

pub fn encode_owner() -> Vec<u8> {
    encode_function_call(selector(OWNER_SIG), &[])
}

pub fn encode_get_transaction_count() -> Vec<u8> {
    encode_function_call(selector(GET_TRANSACTION_COUNT_SIG), &[])
}

pub fn encode_get_transaction(index: u64) -> Vec<u8> {
    encode_function_call(
        selector(GET_TRANSACTION_SIG),
        &[AbiParam::Uint256(U256::from(index))],
    )
}

/// Encodes `proposeTransaction(address,uint256,bytes)`.
///
/// `data` may be empty, which proposes a plain value transfer.
pub fn encode_propose_transaction(
    to: &str,
    value: U256,
    data: &[u8],
) -> Result<Vec<u8>, EthError> {
    let addr = parse_address(to)?;
    Ok(encode_function_call(
        selector(PROPOSE_TRANSACTION_SIG),
        &[
            AbiParam::Address(addr),
            AbiParam::Uint256(value),
            AbiParam::Bytes(data.to_vec()),
        ],
    ))
}

pub fn encode_confirm_transaction(id: u64) -> Vec<u8> {
    encode_id_call(CONFIRM_TRANSACTION_SIG, id)
}

pub fn encode_revoke_confirmation(id: u64) -> Vec<u8> {
    encode_id_call(REVOKE_CONFIRMATION_SIG, id)
}

pub fn encode_execute_transaction(id: u64) -> Vec<u8> {
    encode_id_call(EXECUTE_TRANSACTION_SIG, id)
}

fn encode_id_call(signature: &str, id: u64) -> Vec<u8> {
    encode_function_call(selector(signature), &[AbiParam::Uint256(U256::from(id))])
}

/// Decodes the return data of `owner()` into a checksummed address.
pub fn decode_owner(data: &[u8]) -> Result<String, EthError> {
    Ok(format_address(&decode_address(data)?))
}

/// Decodes the return data of `getTransactionCount()`.
pub fn decode_transaction_count(data: &[u8]) -> Result<u64, EthError> {
    let count = decode_uint256(data)?;
    u64::try_from(count)
        .map_err(|_| EthError::DecodingError(format!("transaction count {count} exceeds u64")))
}

/// Decodes the return data of `getTransaction(uint256)`.
pub fn decode_transaction(data: &[u8]) -> Result<OnChainTransaction, EthError> {
    let values = decode_params(&GET_TRANSACTION_RETURNS, data)?;
    Ok(OnChainTransaction {
        to: format_address(&values[0].as_address()?),
        value: values[1].as_uint()?,
        data: values[2].as_bytes()?.to_vec(),
        confirmations: values[3].as_uint()?,
        proposed_at: values[4].as_uint()?,
        executed: values[5].as_bool()?,
    })
}
