//! Ethereum/EVM chain support for the multisig timelock client.
//!
//! This crate provides:
//! - Address parsing, EIP-55 checksums, and signer address derivation
//! - Minimal ABI encoding and decoding (address, uint256, bool, bytes)
//! - Call encoding for the multisig timelock contract
//! - EIP-1559 transaction building and signing
//! - EVM network definitions and per-chain contract deployments

pub mod abi;
pub mod address;
pub mod chains;
pub mod error;
pub mod multisig;
pub mod transaction;
