//! Minimal ABI encoding and decoding for EVM function calls.
//!
//! This module covers the handful of Solidity types the multisig contract
//! speaks (`address`, `uint256`, `bool`, `bytes`) without pulling in a full
//! ABI parser. Dynamic values use the standard head/tail layout.

use alloy_primitives::U256;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Size of one ABI word in bytes.
const WORD: usize = 32;

/// Computes the 4-byte function selector for a canonical Solidity signature,
/// e.g. `"transfer(address,uint256)"` → `0xa9059cbb`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// A single ABI-encoded parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiParam {
    /// A 20-byte Ethereum address, left-padded to 32 bytes.
    Address([u8; 20]),
    /// A 256-bit unsigned integer.
    Uint256(U256),
    /// A boolean, encoded as a uint256 of 0 or 1.
    Bool(bool),
    /// Dynamic `bytes`, encoded in the tail with a length prefix.
    Bytes(Vec<u8>),
}

impl AbiParam {
    fn is_dynamic(&self) -> bool {
        matches!(self, AbiParam::Bytes(_))
    }
}

/// Encodes a function call with the given 4-byte selector and ABI parameters.
///
/// The output is `selector || head(params) || tail(params)`. Static
/// parameters live in the head; each dynamic parameter puts an offset word
/// in the head and its length-prefixed, right-padded content in the tail.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + params.len() * WORD);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&encode_params(params));
    data
}

/// Encodes a parameter list without a selector.
pub fn encode_params(params: &[AbiParam]) -> Vec<u8> {
    let head_len = params.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for param in params {
        if param.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            if let AbiParam::Bytes(bytes) = param {
                tail.extend_from_slice(&uint_word(U256::from(bytes.len())));
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        } else {
            head.extend_from_slice(&encode_static(param));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encodes a static [`AbiParam`] as a single 32-byte ABI word.
fn encode_static(param: &AbiParam) -> [u8; 32] {
    match param {
        AbiParam::Address(addr) => {
            // Left-pad: 12 zero bytes + 20 address bytes.
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr);
            word
        }
        AbiParam::Uint256(value) => uint_word(*value),
        AbiParam::Bool(flag) => uint_word(U256::from(u8::from(*flag))),
        AbiParam::Bytes(_) => [0u8; 32],
    }
}

fn uint_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// The Solidity types understood by [`decode_params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint256,
    Bool,
    Bytes,
}

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address([u8; 20]),
    Uint256(U256),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl AbiValue {
    pub fn as_address(&self) -> Result<[u8; 20], EthError> {
        match self {
            AbiValue::Address(addr) => Ok(*addr),
            other => Err(type_mismatch("address", other)),
        }
    }

    pub fn as_uint(&self) -> Result<U256, EthError> {
        match self {
            AbiValue::Uint256(value) => Ok(*value),
            other => Err(type_mismatch("uint256", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EthError> {
        match self {
            AbiValue::Bool(flag) => Ok(*flag),
            other => Err(type_mismatch("bool", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], EthError> {
        match self {
            AbiValue::Bytes(bytes) => Ok(bytes),
            other => Err(type_mismatch("bytes", other)),
        }
    }
}

fn type_mismatch(expected: &str, got: &AbiValue) -> EthError {
    EthError::DecodingError(format!("expected {expected}, got {got:?}"))
}

/// Decodes ABI-encoded return data into values of the given types.
///
/// Every head word is range-checked: addresses must have 12 zero padding
/// bytes, booleans must be 0 or 1, and dynamic offsets must stay inside
/// `data`.
pub fn decode_params(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    let head_len = types.len() * WORD;
    if data.len() < head_len {
        return Err(EthError::DecodingError(format!(
            "expected at least {head_len} bytes, got {}",
            data.len()
        )));
    }

    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let word = read_word(data, i * WORD)?;
            match ty {
                AbiType::Address => {
                    if word[..12].iter().any(|&b| b != 0) {
                        return Err(EthError::DecodingError(format!(
                            "address word {i} has non-zero padding"
                        )));
                    }
                    let mut addr = [0u8; 20];
                    addr.copy_from_slice(&word[12..]);
                    Ok(AbiValue::Address(addr))
                }
                AbiType::Uint256 => Ok(AbiValue::Uint256(U256::from_be_bytes(word))),
                AbiType::Bool => match U256::from_be_bytes(word) {
                    v if v.is_zero() => Ok(AbiValue::Bool(false)),
                    v if v == U256::from(1u8) => Ok(AbiValue::Bool(true)),
                    _ => Err(EthError::DecodingError(format!(
                        "bool word {i} is neither 0 nor 1"
                    ))),
                },
                AbiType::Bytes => {
                    let offset = word_to_usize(word)?;
                    let len = word_to_usize(read_word(data, offset)?)?;
                    let start = offset + WORD;
                    let end = start.checked_add(len).ok_or_else(|| {
                        EthError::DecodingError("bytes length overflows".into())
                    })?;
                    let bytes = data.get(start..end).ok_or_else(|| {
                        EthError::DecodingError(format!(
                            "bytes at offset {offset} run past end of data"
                        ))
                    })?;
                    Ok(AbiValue::Bytes(bytes.to_vec()))
                }
            }
        })
        .collect()
}

/// Decodes a single uint256 return value from ABI-encoded data.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    decode_params(&[AbiType::Uint256], data)?[0].as_uint()
}

/// Decodes a single address return value from ABI-encoded data.
pub fn decode_address(data: &[u8]) -> Result<[u8; 20], EthError> {
    decode_params(&[AbiType::Address], data)?[0].as_address()
}

fn read_word(data: &[u8], offset: usize) -> Result<[u8; 32], EthError> {
    let slice = offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            EthError::DecodingError(format!("no 32-byte word at offset {offset}"))
        })?;
    let mut word = [0u8; 32];
    word.copy_from_slice(slice);
    Ok(word)
}

fn word_to_usize(word: [u8; 32]) -> Result<usize, EthError> {
    let value = U256::from_be_bytes(word);
    u64::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| EthError::DecodingError(format!("offset {value} out of range")))
}
