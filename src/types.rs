use std::fmt;

use alloy::primitives::{aliases::U24, Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::common::math::apply_slippage;

/// DEX 풀 수수료 등급 (Uniswap V3 fee, 1/100 bps 단위)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FeeTier {
    /// 0.01%
    Lowest,
    /// 0.05%
    Low,
    /// 0.3%
    Medium,
    /// 1%
    High,
}

impl FeeTier {
    pub const ALL: [FeeTier; 4] = [FeeTier::Lowest, FeeTier::Low, FeeTier::Medium, FeeTier::High];

    pub fn as_u32(self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10_000,
        }
    }

    pub fn from_u32(fee: u32) -> Option<Self> {
        match fee {
            100 => Some(FeeTier::Lowest),
            500 => Some(FeeTier::Low),
            3000 => Some(FeeTier::Medium),
            10_000 => Some(FeeTier::High),
            _ => None,
        }
    }

    /// ABI `uint24` 값
    pub fn to_u24(self) -> U24 {
        U24::from(self.as_u32())
    }

    /// 표시용 퍼센트 문자열 (예: "0.05%")
    pub fn percent_label(self) -> &'static str {
        match self {
            FeeTier::Lowest => "0.01%",
            FeeTier::Low => "0.05%",
            FeeTier::Medium => "0.3%",
            FeeTier::High => "1%",
        }
    }
}

impl TryFrom<u32> for FeeTier {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        FeeTier::from_u32(value).ok_or_else(|| format!("unsupported fee tier: {}", value))
    }
}

impl From<FeeTier> for u32 {
    fn from(tier: FeeTier) -> Self {
        tier.as_u32()
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u32(), self.percent_label())
    }
}

/// 해석이 끝난 토큰 정보. decimals가 틀리면 모든 금액 계산이 틀어진다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

/// 풀 후보 (한 번의 거래 흐름 동안만 유효)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCandidate {
    pub pool_address: Address,
    pub fee: FeeTier,
    /// 풀이 보유한 입력 토큰 잔액 (TVL이 아닌 유동성 근사치)
    pub observed_liquidity: U256,
}

/// 견적 획득 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    /// quoteExactInputSingle
    Direct,
    /// quoteExactInput + 인코딩된 path
    Path,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSource::Direct => write!(f, "direct"),
            QuoteSource::Path => write!(f, "path"),
        }
    }
}

/// 견적 캐시 키: (tokenIn, tokenOut, amountIn, fee)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub fee: FeeTier,
}

/// 시뮬레이션된 견적. 0이 아닌 amount_out만 Quote로 존재할 수 있다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: FeeTier,
    pub pool: Address,
    pub source: QuoteSource,
    /// 견적 획득 시각 (unix seconds)
    pub obtained_at: u64,
}

impl Quote {
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            token_in: self.token_in,
            token_out: self.token_out,
            amount_in: self.amount_in,
            fee: self.fee,
        }
    }

    /// 슬리피지 적용 최소 수령량
    pub fn min_amount_out(&self, slippage_bps: u32) -> U256 {
        apply_slippage(self.amount_out, slippage_bps)
    }
}

/// 제출 직전의 거래 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub recipient: Address,
    pub min_amount_out: U256,
    /// 견적을 받은 (pool, fee) 튜플. 실행도 반드시 같은 튜플로 한다.
    pub fee: FeeTier,
    pub pool: Address,
}

impl TradeRequest {
    pub fn from_quote(quote: &Quote, recipient: Address, slippage_bps: u32) -> Self {
        Self {
            token_in: quote.token_in,
            token_out: quote.token_out,
            amount_in: quote.amount_in,
            recipient,
            min_amount_out: quote.min_amount_out(slippage_bps),
            fee: quote.fee,
            pool: quote.pool,
        }
    }
}

/// 토큰별 자동 거래 설정 (세션 단위)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSettings {
    pub enabled: bool,
    /// 0 - 100
    pub min_confidence: u8,
    /// 0 - 100
    pub max_risk_score: u8,
    /// 사용자 입력 그대로의 10진수 금액 (입력 토큰 단위)
    pub trade_amount: String,
    /// 마지막 거래 성공 시각 (unix seconds)
    #[serde(default)]
    pub last_fired_at: Option<u64>,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 70,
            max_risk_score: 30,
            trade_amount: "0".to_string(),
            last_fired_at: None,
        }
    }
}

/// AI 오라클 예측 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub confidence: u8,
    /// 양수: 상승, 음수: 하락
    pub price_direction: i64,
    pub is_honeypot: bool,
    pub risk_score: u8,
    pub timestamp: u64,
}

impl Prediction {
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Confirmed,
    Reverted,
}

/// 트랜잭션 영수증 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// 거래 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub tx_hash: TxHash,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub amount_in: U256,
    pub min_amount_out: U256,
}
