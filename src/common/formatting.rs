use alloy::primitives::U256;

use super::amount::format_units;
use crate::types::TokenRef;

/// 토큰 금액 표시 (예: "100.5 USDC")
pub fn format_token_amount(amount: U256, token: &TokenRef) -> String {
    format!("{} {}", format_units(amount, token.decimals), token.symbol)
}

/// Format wei amount to ETH
pub fn format_eth(wei: U256) -> String {
    format_units(wei, 18)
}

/// Format gas price from wei to gwei
pub fn format_gas_price_gwei(gas_price_wei: u128) -> String {
    let gwei = gas_price_wei as f64 / 1_000_000_000.0;
    format!("{:.2} gwei", gwei)
}

/// basis points -> "5.00%"
pub fn format_bps(bps: u32) -> String {
    format!("{:.2}%", bps as f64 / 100.0)
}
