use alloy::primitives::U256;

use crate::constants::BPS_DENOMINATOR;

/// 슬리피지를 적용한 최소 수령량.
///
/// `amount * (10000 - bps) / 10000`을 정수 내림으로 계산한다. 곱셈 오버플로를
/// 피하려고 몫과 나머지를 나눠 계산하지만 결과는 동일하다.
pub fn apply_slippage(amount: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(BPS_DENOMINATOR);
    let denominator = U256::from(BPS_DENOMINATOR);
    let keep = U256::from(BPS_DENOMINATOR - bps);

    let whole = amount / denominator;
    let remainder = amount % denominator;
    whole * keep + remainder * keep / denominator
}

/// 가스 추정치에 안전 배수(percent)를 적용
pub fn apply_gas_multiplier(estimate: u64, multiplier_pct: u64) -> u64 {
    let scaled = (estimate as u128) * (multiplier_pct as u128) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// 가스 비용 (wei)
pub fn gas_cost_wei(gas_limit: u64, gas_price: u128) -> U256 {
    U256::from(gas_limit) * U256::from(gas_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_slippage() {
        assert_eq!(apply_slippage(U256::from(1_000_000u64), 500), U256::from(950_000u64));
        assert_eq!(apply_slippage(U256::from(1_000_000u64), 0), U256::from(1_000_000u64));
        assert_eq!(apply_slippage(U256::from(1_000_000u64), 10_000), U256::ZERO);
        // 9999 * 0.95 = 9499.05 -> 9499 (내림)
        assert_eq!(apply_slippage(U256::from(9_999u64), 500), U256::from(9_499u64));
    }

    #[test]
    fn test_apply_slippage_matches_naive_formula() {
        let quote = U256::from(40_000_000_000u64);
        let naive = quote * U256::from(9_500u64) / U256::from(10_000u64);
        assert_eq!(apply_slippage(quote, 500), naive);

        let odd = U256::from(123_456_789_123u64);
        let naive = odd * U256::from(9_950u64) / U256::from(10_000u64);
        assert_eq!(apply_slippage(odd, 50), naive);
    }

    #[test]
    fn test_apply_slippage_no_overflow_near_max() {
        let result = apply_slippage(U256::MAX, 500);
        assert!(result < U256::MAX);
    }

    #[test]
    fn test_apply_gas_multiplier() {
        assert_eq!(apply_gas_multiplier(100_000, 120), 120_000);
        assert_eq!(apply_gas_multiplier(150_001, 120), 180_001);
        assert_eq!(apply_gas_multiplier(u64::MAX, 200), u64::MAX);
    }

    #[test]
    fn test_gas_cost() {
        assert_eq!(gas_cost_wei(21_000, 1_000_000_000), U256::from(21_000_000_000_000u64));
    }
}
