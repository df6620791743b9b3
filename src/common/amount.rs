use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("not a decimal number: {0:?}")]
    InvalidFormat(String),

    #[error("amount must be positive: {0}")]
    NotPositive(String),

    #[error("{value} has more than {decimals} decimal places")]
    TooManyDecimals { value: String, decimals: u8 },

    #[error("amount overflows: {0}")]
    Overflow(String),
}

/// 사용자 입력 10진수 금액을 토큰 최소 단위 정수로 변환.
///
/// "100" (decimals 6) -> 100_000_000
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    let parsed = Decimal::from_str(trimmed)
        .map_err(|_| AmountError::InvalidFormat(trimmed.to_string()))?
        .normalize();

    if parsed <= Decimal::ZERO {
        return Err(AmountError::NotPositive(trimmed.to_string()));
    }

    let scale = parsed.scale();
    if scale > decimals as u32 {
        return Err(AmountError::TooManyDecimals {
            value: trimmed.to_string(),
            decimals,
        });
    }

    let mantissa = U256::from(parsed.mantissa().unsigned_abs());
    let factor = U256::from(10u64)
        .checked_pow(U256::from(decimals as u32 - scale))
        .ok_or_else(|| AmountError::Overflow(trimmed.to_string()))?;

    mantissa
        .checked_mul(factor)
        .ok_or_else(|| AmountError::Overflow(trimmed.to_string()))
}

/// 최소 단위 정수를 10진수 문자열로 (후행 0 제거)
pub fn format_units(amount: U256, decimals: u8) -> String {
    let raw = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }

    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };

    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("100", 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(parse_units(" 0.5 ", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_units("1.000000", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(
            parse_units("40", 18).unwrap(),
            U256::from(40u64) * U256::from(10u64).pow(U256::from(18u64))
        );
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        assert!(matches!(parse_units("abc", 6), Err(AmountError::InvalidFormat(_))));
        assert!(matches!(parse_units("", 6), Err(AmountError::InvalidFormat(_))));
        assert!(matches!(parse_units("0", 6), Err(AmountError::NotPositive(_))));
        assert!(matches!(parse_units("-5", 6), Err(AmountError::NotPositive(_))));
        assert!(matches!(
            parse_units("0.0000001", 6),
            Err(AmountError::TooManyDecimals { decimals: 6, .. })
        ));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(100_000_000u64), 6), "100");
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::ZERO, 6), "0");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }
}
