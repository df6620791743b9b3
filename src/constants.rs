use alloy::primitives::{address, Address};

use crate::types::FeeTier;

// Fee tier 선호 순서 (유동성 동률이면 앞쪽 tier 우선)
pub const FEE_TIER_PREFERENCE: [FeeTier; 4] = [
    FeeTier::Medium,
    FeeTier::Low,
    FeeTier::High,
    FeeTier::Lowest,
];

// Slippage (basis points)
pub const BPS_DENOMINATOR: u32 = 10_000;
pub const DEFAULT_SLIPPAGE_BPS: u32 = 500; // 5%
pub const MAX_SLIPPAGE_BPS: u32 = 5_000;

// Gas
pub const DEFAULT_GAS_MULTIPLIER_PCT: u64 = 120; // 1.2x
pub const MIN_GAS_MULTIPLIER_PCT: u64 = 100;

// Time constants (in seconds)
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_QUOTE_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_MAX_PREDICTION_AGE_SECS: u64 = 600;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_DEADLINE_SECS: u64 = 300;
pub const DEFAULT_AUTO_TRADE_INTERVAL_SECS: u64 = 60;

// RPC
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;

// Prediction score 범위
pub const MAX_SCORE: u8 = 100;

// Portfolio risk level 범위
pub const MIN_RISK_LEVEL: u8 = 1;
pub const MAX_RISK_LEVEL: u8 = 10;

// Uniswap V3 (mainnet)
pub const UNISWAP_V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
pub const UNISWAP_V3_QUOTER: Address = address!("b27308f9F90D607463bb33eA1BeBb41C27CE5AB6");
pub const UNISWAP_V3_ROUTER: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");

// Common token addresses (mainnet)
pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");

/// 잘 알려진 토큰의 심볼 → 주소
pub fn get_token_address(symbol: &str) -> Option<Address> {
    match symbol.to_uppercase().as_str() {
        "WETH" => Some(WETH),
        "USDC" => Some(USDC),
        "USDT" => Some(USDT),
        "DAI" => Some(DAI),
        _ => None,
    }
}

/// 잘 알려진 토큰의 decimals (체인 조회 없이 고정값 사용)
pub fn known_decimals(token: Address) -> Option<u8> {
    if token == USDC || token == USDT {
        Some(6)
    } else if token == WETH || token == DAI {
        Some(18)
    } else {
        None
    }
}
