//! Token amounts and the transfer-fee formula.
//!
//! The ledger counts in base units; operators think in token units. A token
//! unit is `10^decimals` base units. All conversion here is exact integer
//! arithmetic, so nothing on the supply path ever passes through a float.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One basis point is 1/10000.
pub const MAX_FEE_BASIS_POINTS: u16 = 10_000;

/// Largest decimal precision a mint may be configured with.
pub const MAX_DECIMALS: u8 = 18;

/// Errors converting between token units and base units.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount format: {0:?}")]
    Format(String),

    #[error("amount {0:?} has more than {1} fractional digits")]
    Precision(String, u8),

    #[error("amount overflows the ledger's 64-bit range")]
    Overflow,
}

/// `10^decimals` as a u64.
pub fn pow10(decimals: u8) -> u64 {
    10u64.pow(decimals as u32)
}

/// Scale whole token units to base units.
pub fn to_base_units(tokens: u64, decimals: u8) -> Option<u64> {
    tokens.checked_mul(pow10(decimals))
}

/// Render base units as a fixed-point token amount, e.g. `"9900.000000000"`.
pub fn format_amount(base_units: u64, decimals: u8) -> String {
    let scale = pow10(decimals);
    let whole = base_units / scale;
    if decimals == 0 {
        return whole.to_string();
    }
    let frac = base_units % scale;
    format!("{}.{:0width$}", whole, frac, width = decimals as usize)
}

/// Parse a token amount such as `"10000"` or `"0.5"` into base units.
pub fn parse_amount(input: &str, decimals: u8) -> Result<u64, AmountError> {
    let s = input.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Format(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::Precision(input.to_string(), decimals));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| AmountError::Overflow)?
    };

    to_base_units(whole, decimals)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or(AmountError::Overflow)
}

/// Absolute tolerance for the transfer-fee probe: 0.001 token units.
pub fn verification_tolerance(decimals: u8) -> u64 {
    pow10(decimals) / 1000
}

/// Transfer-fee parameters of a mint, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFeeConfig {
    /// Fee rate in basis points.
    pub fee_rate_bps: u16,

    /// Ceiling on the fee for a single transfer.
    pub maximum_fee: u64,
}

impl TransferFeeConfig {
    pub fn new(fee_rate_bps: u16, maximum_fee: u64) -> Self {
        Self {
            fee_rate_bps,
            maximum_fee,
        }
    }

    /// Fee withheld on a transfer of `amount` base units.
    ///
    /// The rate fee rounds up to the next base unit, then the cap applies.
    pub fn calculate_fee(&self, amount: u64) -> u64 {
        if self.fee_rate_bps == 0 || amount == 0 {
            return 0;
        }
        let numerator = amount as u128 * self.fee_rate_bps as u128;
        let bps = MAX_FEE_BASIS_POINTS as u128;
        let raw_fee = (numerator + bps - 1) / bps;
        raw_fee.min(self.maximum_fee as u128) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECIMALS: u8 = 9;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(9_900_000_000_000, DECIMALS), "9900.000000000");
        assert_eq!(format_amount(1, DECIMALS), "0.000000001");
        assert_eq!(format_amount(0, DECIMALS), "0.000000000");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10000", DECIMALS).unwrap(), 10_000_000_000_000);
        assert_eq!(parse_amount("0.5", DECIMALS).unwrap(), 500_000_000);
        assert_eq!(parse_amount(".25", DECIMALS).unwrap(), 250_000_000);
        assert_eq!(parse_amount("7.", DECIMALS).unwrap(), 7_000_000_000);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(parse_amount("", DECIMALS), Err(AmountError::Format(_))));
        assert!(matches!(parse_amount("-1", DECIMALS), Err(AmountError::Format(_))));
        assert!(matches!(parse_amount("1e3", DECIMALS), Err(AmountError::Format(_))));
        assert!(matches!(
            parse_amount("0.0000000001", DECIMALS),
            Err(AmountError::Precision(_, 9))
        ));
        assert_eq!(
            parse_amount("18446744073709551615", DECIMALS),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn test_format_parse_agree() {
        for base in [0u64, 1, 999, 1_000_000_000, 123_456_789_012] {
            assert_eq!(parse_amount(&format_amount(base, DECIMALS), DECIMALS).unwrap(), base);
        }
    }

    #[test]
    fn test_fee_at_one_percent() {
        let cfg = TransferFeeConfig::new(100, to_base_units(1_000_000, DECIMALS).unwrap());
        let amount = to_base_units(10_000, DECIMALS).unwrap();
        assert_eq!(cfg.calculate_fee(amount), to_base_units(100, DECIMALS).unwrap());
    }

    #[test]
    fn test_fee_cap_dominates() {
        let cap = to_base_units(5, DECIMALS).unwrap();
        let cfg = TransferFeeConfig::new(100, cap);
        let amount = to_base_units(10_000, DECIMALS).unwrap();
        assert_eq!(cfg.calculate_fee(amount), cap);
    }

    #[test]
    fn test_fee_rounds_up() {
        let cfg = TransferFeeConfig::new(100, u64::MAX);
        // 1% of 150 base units is 1.5, withheld as 2
        assert_eq!(cfg.calculate_fee(150), 2);
        assert_eq!(cfg.calculate_fee(1), 1);
    }

    #[test]
    fn test_zero_rate_or_amount_is_free() {
        assert_eq!(TransferFeeConfig::new(0, 100).calculate_fee(1_000), 0);
        assert_eq!(TransferFeeConfig::new(100, 100).calculate_fee(0), 0);
    }

    #[test]
    fn test_fee_does_not_overflow() {
        let cfg = TransferFeeConfig::new(MAX_FEE_BASIS_POINTS, u64::MAX);
        assert_eq!(cfg.calculate_fee(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_tolerance_is_a_thousandth_of_a_token() {
        assert_eq!(verification_tolerance(9), 1_000_000);
        assert_eq!(verification_tolerance(3), 1);
        assert_eq!(verification_tolerance(2), 0);
    }
}
