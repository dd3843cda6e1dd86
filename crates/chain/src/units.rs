//! Decimal amount parsing and formatting.

use alloy::primitives::{
    U256,
    utils::{ParseUnits, UnitsError, format_units, parse_units},
};

/// Decimals of the native token and of freshly minted space tokens.
pub const NATIVE_DECIMALS: u8 = 18;
/// Decimals of USDC-style stablecoins.
pub const USDC_DECIMALS: u8 = 6;

/// Parse a human decimal (`"0.0001"`) into base units with `decimals`.
/// Negative amounts are refused.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
    match parse_units(amount.trim(), decimals)? {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(UnitsError::InvalidUnit(format!("negative amount: {}", amount.trim()))),
    }
}

/// Render base units as a decimal string, e.g. for balances.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_token_decimals() {
        assert_eq!(parse_amount("0.0001", USDC_DECIMALS).unwrap(), U256::from(100u64));
        assert_eq!(parse_amount("100", USDC_DECIMALS).unwrap(), U256::from(100_000_000u64));
        assert_eq!(
            parse_amount("0.0002", NATIVE_DECIMALS).unwrap(),
            U256::from(200_000_000_000_000u64)
        );
        assert!(parse_amount("ten", NATIVE_DECIMALS).is_err());
    }

    #[test]
    fn negative_amounts_are_refused() {
        assert!(parse_amount("-0.0002", NATIVE_DECIMALS).is_err());
        assert!(parse_amount("-1", USDC_DECIMALS).is_err());
        assert_eq!(parse_amount(" 0 ", USDC_DECIMALS).unwrap(), U256::ZERO);
    }

    #[test]
    fn formats_base_units() {
        assert_eq!(format_amount(U256::from(1_500_000u64), USDC_DECIMALS), "1.500000");
    }
}
