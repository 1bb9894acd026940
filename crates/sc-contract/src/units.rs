use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, Unit};
use sc_wallet::WalletError;

/// Render wei as a decimal ether string, trimming trailing zeros but always
/// keeping one fractional digit (`1.0`, `0.01`).
pub fn format_ether(wei: U256) -> String {
    let padded = ParseUnits::U256(wei).format_units(Unit::ETHER);
    match padded.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            let frac = if frac.is_empty() { "0" } else { frac };
            format!("{whole}.{frac}")
        }
        None => format!("{padded}.0"),
    }
}

/// Parse a non-negative decimal ether amount into wei.
pub fn parse_ether(amount: &str) -> Result<U256, WalletError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::validation("amount is required"));
    }
    let parsed = ParseUnits::parse_units(amount, Unit::ETHER)
        .map_err(|err| WalletError::validation(format!("invalid ether amount '{amount}': {err}")))?;
    match parsed {
        ParseUnits::U256(wei) => Ok(wei),
        ParseUnits::I256(_) => Err(WalletError::validation(format!(
            "ether amount '{amount}' must not be negative"
        ))),
    }
}

/// Six-decimal display form used by the tip dashboards.
pub fn format_eth_amount(amount: &str) -> String {
    match amount.trim().parse::<f64>() {
        Ok(value) if value > 0.0 => format!("{value:.6}"),
        _ => "0.000000".to_owned(),
    }
}
