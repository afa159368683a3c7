//! Amount handling utilities for ledger-precision values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Drops per XRP, the ledger's base-asset subunit factor.
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Maximum significant digits an issued-currency amount may carry.
const MAX_SIGNIFICANT_DIGITS: usize = 15;

/// Format a quantity to the ledger's fixed significant-digit precision.
///
/// Total significant digits (integer part length plus fractional digits)
/// never exceed 15, trailing zeros are dropped by re-parsing, and the output
/// is plain decimal notation suitable for an issued-currency `value` field.
pub fn normalize_balance(value: f64) -> String {
    let plain = format!("{}", value);
    match plain.find('.') {
        Some(dot) => {
            let frac_digits = MAX_SIGNIFICANT_DIGITS.saturating_sub(dot);
            let rounded = format!("{:.*}", frac_digits, value);
            match rounded.parse::<f64>() {
                Ok(reparsed) => format!("{}", reparsed),
                Err(_) => rounded,
            }
        }
        None => {
            let digits = plain.trim_start_matches('-').len();
            if digits <= MAX_SIGNIFICANT_DIGITS {
                return plain;
            }
            // Integer wider than the budget: zero out the excess digits.
            let scale = 10f64.powi((digits - MAX_SIGNIFICANT_DIGITS) as i32);
            format!("{}", (value / scale).round() * scale)
        }
    }
}

/// Convert an XRP quantity to a drops string for a transaction field.
///
/// Goes through `Decimal` so the drop count is exact rather than a float
/// rounding artifact.
pub fn xrp_to_drops(xrp: f64) -> anyhow::Result<String> {
    let amount = Decimal::try_from(xrp)
        .map_err(|e| anyhow::anyhow!("invalid XRP amount {}: {}", xrp, e))?;
    if amount < Decimal::ZERO {
        return Err(anyhow::anyhow!("XRP amount cannot be negative: {}", xrp));
    }

    let drops = (amount * Decimal::from(DROPS_PER_XRP)).round();
    let drops = drops
        .to_u64()
        .ok_or_else(|| anyhow::anyhow!("XRP amount {} overflows the drops range", xrp))?;

    Ok(drops.to_string())
}

/// Convert a drops string from a ledger response back to XRP.
///
/// Returns `None` for malformed input so callers can skip the entry instead
/// of trading on a bogus quantity.
pub fn drops_to_xrp(drops: &str) -> Option<f64> {
    drops
        .parse::<u64>()
        .ok()
        .map(|d| d as f64 / DROPS_PER_XRP as f64)
}
