//! Conversion between wei and decimal native-currency amounts.

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::U256;

use crate::error::SyncError;

const NATIVE_DECIMALS: usize = 18;

/// Parses a decimal native amount such as `"0.5"` into wei.
///
/// Negative amounts and more than 18 fractional digits are rejected.
pub fn parse_native(amount: &str) -> Result<U256, SyncError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Action("Amount is required".into()));
    }
    if trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(SyncError::Action(format!("Invalid amount: {trimmed}")));
    }
    if let Some((_, frac)) = trimmed.split_once('.') {
        if frac.len() > NATIVE_DECIMALS {
            return Err(SyncError::Action(format!(
                "Invalid amount {trimmed}: more than {NATIVE_DECIMALS} decimal places"
            )));
        }
    }
    parse_ether(trimmed).map_err(|e| SyncError::Action(format!("Invalid amount {trimmed}: {e}")))
}

/// Formats wei as a decimal native amount without trailing zeros
/// (`5000000000000000000` → `"5"`, `500000000000000000` → `"0.5"`).
pub fn format_native(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => formatted,
    }
}

/// Display amount as a float (`value / 1e18`). Precision loss is accepted;
/// the exact value stays in wei alongside it.
pub fn wei_to_native_f64(wei: U256) -> f64 {
    format_native(wei).parse::<f64>().unwrap_or(f64::NAN)
}
