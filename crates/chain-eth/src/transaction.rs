//! EIP-1559 contract-call transactions and local signing.
//!
//! The wire form is `0x02 || rlp([chain_id, nonce, max_priority_fee_per_gas,
//! max_fee_per_gas, gas_limit, to, value, data, access_list, (y_parity, r, s)])`.
//! The access list is always empty.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::address::parse_address;
use crate::error::EthError;

const EIP1559_TYPE: u8 = 0x02;

/// Gas pricing for an EIP-1559 transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
}

/// An unsigned EIP-1559 call to a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCallTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub fees: FeeParams,
    pub to: Address,
    /// Native value attached to the call, in wei.
    pub value: U256,
    /// ABI-encoded calldata.
    pub data: Bytes,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// Typed envelope bytes, starting with the `0x02` type byte.
    pub raw: Vec<u8>,
    /// Keccak-256 of `raw`.
    pub hash: B256,
}

impl SignedTransaction {
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// Builds an unsigned contract call.
///
/// Multisig operations attach no native value; the proposed amount travels
/// inside `data`.
pub fn build_contract_call(
    chain_id: u64,
    nonce: u64,
    contract: &str,
    value: U256,
    data: Vec<u8>,
    fees: FeeParams,
) -> Result<ContractCallTx, EthError> {
    let to = Address::from(parse_address(contract)?);

    if fees.max_priority_fee_per_gas > fees.max_fee_per_gas {
        return Err(EthError::TransactionBuildError(format!(
            "priority fee {} exceeds max fee {}",
            fees.max_priority_fee_per_gas, fees.max_fee_per_gas
        )));
    }
    if fees.gas_limit == 0 {
        return Err(EthError::TransactionBuildError("gas limit is zero".into()));
    }

    Ok(ContractCallTx {
        chain_id,
        nonce,
        fees,
        to,
        value,
        data: data.into(),
    })
}

impl ContractCallTx {
    fn fields_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.fees.max_priority_fee_per_gas.length()
            + self.fees.max_fee_per_gas.length()
            + self.fees.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + EMPTY_ACCESS_LIST.length()
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.fees.max_priority_fee_per_gas.encode(out);
        self.fees.max_fee_per_gas.encode(out);
        self.fees.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
        EMPTY_ACCESS_LIST.encode(out);
    }

    /// The payload that gets hashed and signed.
    pub fn signing_payload(&self) -> Vec<u8> {
        self.envelope(None)
    }

    fn envelope(&self, signature: Option<&RawSignature>) -> Vec<u8> {
        let sig_length = signature.map_or(0, RawSignature::length);
        let header = Header {
            list: true,
            payload_length: self.fields_length() + sig_length,
        };

        let mut out = Vec::with_capacity(1 + header.length() + header.payload_length);
        out.push(EIP1559_TYPE);
        header.encode(&mut out);
        self.encode_fields(&mut out);
        if let Some(sig) = signature {
            sig.encode(&mut out);
        }
        out
    }
}

struct RawSignature {
    y_parity: bool,
    r: U256,
    s: U256,
}

impl RawSignature {
    fn length(&self) -> usize {
        self.y_parity.length() + self.r.length() + self.s.length()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }
}

const EMPTY_ACCESS_LIST: Header = Header {
    list: true,
    payload_length: 0,
};

/// Signs `tx` with a secp256k1 private key.
pub fn sign_transaction(
    tx: &ContractCallTx,
    private_key: &[u8; 32],
) -> Result<SignedTransaction, EthError> {
    let digest = Keccak256::digest(tx.signing_payload());

    let mut key_bytes = *private_key;
    let signing_key = SigningKey::from_bytes((&key_bytes).into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()));
    key_bytes.zeroize();

    let (signature, recovery_id): (Signature, RecoveryId) = signing_key?
        .sign_prehash(digest.as_slice())
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let raw = tx.envelope(Some(&RawSignature {
        y_parity: recovery_id.is_y_odd(),
        r: U256::from_be_slice(&signature.r().to_bytes()),
        s: U256::from_be_slice(&signature.s().to_bytes()),
    }));
    let hash = B256::from_slice(&Keccak256::digest(&raw));

    Ok(SignedTransaction { raw, hash })
}
