//! Address parsing, EIP-55 checksums and key-to-address derivation.

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::error::EthError;

/// Parses a 0x-prefixed hex address string into a 20-byte array.
///
/// Case is not checked here; use [`validate_address`] when a mixed-case
/// input must carry a correct EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<[u8; 20], EthError> {
    let mut addr = [0u8; 20];
    hex::decode_to_slice(hex_body(address)?, &mut addr)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    Ok(addr)
}

/// Formats raw address bytes as an EIP-55 checksummed string.
pub fn format_address(addr: &[u8; 20]) -> String {
    checksum_hex(&hex::encode(addr))
}

/// Compares two address strings ignoring EIP-55 case.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Derives the checksummed address controlled by a secp256k1 private key:
/// the last 20 bytes of Keccak-256 over the uncompressed public key.
pub fn address_from_private_key(private_key: &[u8; 32]) -> Result<String, EthError> {
    let mut key_bytes = *private_key;
    let signing_key = SigningKey::from_bytes((&key_bytes).into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()));
    key_bytes.zeroize();

    let point = signing_key?.verifying_key().to_encoded_point(false);
    let Some((&0x04, xy)) = point.as_bytes().split_first() else {
        return Err(EthError::InvalidPublicKey("expected an uncompressed point".into()));
    };

    let hash = Keccak256::digest(xy);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Ok(format_address(&addr))
}

/// Checks an address string's shape and, for mixed-case input, its EIP-55
/// checksum. Malformed input is an error; a wrong checksum is `Ok(false)`.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let body = hex_body(address)?;

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return Ok(true);
    }

    Ok(checksum_hex(&body.to_ascii_lowercase())[2..] == *body)
}

/// Re-cases a well-formed address into its EIP-55 form.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    Ok(checksum_hex(&hex_body(address)?.to_ascii_lowercase()))
}

/// EIP-55 over a lowercase, unprefixed 40-digit hex string.
fn checksum_hex(lower_hex: &str) -> String {
    let hash = Keccak256::digest(lower_hex.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower_hex.chars().enumerate() {
        // Nibble i of the hash decides the case of character i.
        let shift = if i % 2 == 0 { 4 } else { 0 };
        let nibble = (hash[i / 2] >> shift) & 0x0f;
        out.push(if nibble >= 8 { c.to_ascii_uppercase() } else { c });
    }
    out
}

/// The 40 hex digits after the `0x` prefix.
fn hex_body(address: &str) -> Result<&str, EthError> {
    let body = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if body.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            body.len()
        )));
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }
    Ok(body)
}
