use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use thiserror::Error;

use crate::types::{FeeTier, QuoteSource};

/// 에러 분류. UI/로그 계층은 문자열이 아니라 이 값으로 분기한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 노드/지갑 연결 문제 (재시도하지 않음)
    Connectivity,
    /// whitelist / cooldown / threshold 거절
    Validation,
    /// 풀 없음, 유동성 부족, 미초기화 풀, 시뮬레이션 revert
    Liquidity,
    /// 잔액 또는 allowance 부족
    Balance,
    /// 온체인 revert, 실패 영수증, 가스 자금 부족
    Execution,
    /// 사용자가 흐름을 중단함
    Cancelled,
    Config,
}

/// 체인 협력자 호출 에러
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("execution reverted: {reason}")]
    Revert { reason: String },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("no signer configured")]
    NoSigner,

    #[error("signer error: {0}")]
    Signer(String),

    #[error("{0} contract address not configured")]
    NotConfigured(&'static str),

    #[error("wrong chain: expected {expected}, connected to {actual}")]
    WrongChain { expected: u64, actual: u64 },
}

/// 견적 실패 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuoteFailure {
    PoolUninitialized,
    InsufficientLiquidity,
    SimulationReverted,
    Unknown,
}

impl QuoteFailure {
    /// 사용자 조치 힌트
    pub fn hint(&self) -> &'static str {
        match self {
            QuoteFailure::PoolUninitialized => "pool is not initialized yet; wait for liquidity to be added",
            QuoteFailure::InsufficientLiquidity => "try a smaller amount",
            QuoteFailure::SimulationReverted => "try a different fee tier",
            QuoteFailure::Unknown => "check the RPC node and retry",
        }
    }
}

/// 후보 하나에 대한 견적 시도 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteAttempt {
    pub pool: Address,
    pub fee: FeeTier,
    pub source: QuoteSource,
    pub failure: QuoteFailure,
    pub detail: String,
}

/// 실행 단계 실패 분류 (가스 추정/제출 에러 해석용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionFailure {
    /// 가스비를 낼 네이티브 잔액 부족
    GasFunds,
    /// 토큰 잔액 부족
    TokenBalance,
    /// 토큰 allowance 부족
    TokenAllowance,
    /// 최소 수령량 미달
    Slippage,
    Reverted,
    Unknown,
}

/// 검증 단계 거절 사유
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("trading is disabled for this token")]
    TradingDisabled,

    #[error("invalid trade amount: {value:?}")]
    InvalidAmount { value: String },

    #[error("trade amount {amount} is below the minimum {minimum}")]
    BelowMinimumTrade { amount: U256, minimum: U256 },

    #[error("token {token} is not whitelisted")]
    TokenNotWhitelisted { token: Address },

    #[error("cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("a trade for {token} is already in flight")]
    TradeInFlight { token: Address },

    #[error("confidence {confidence} is below the minimum {minimum}")]
    ConfidenceTooLow { confidence: u8, minimum: u8 },

    #[error("risk score {risk_score} exceeds the maximum {maximum}")]
    RiskTooHigh { risk_score: u8, maximum: u8 },

    #[error("token flagged as honeypot")]
    HoneypotDetected,

    #[error("prediction is {age_secs}s old (max {max_age_secs}s)")]
    PredictionStale { age_secs: u64, max_age_secs: u64 },

    #[error("no prediction available")]
    PredictionUnavailable,

    #[error("quote returned zero output")]
    ZeroQuote,

    #[error("quote does not match trade: {reason}")]
    QuoteMismatch { reason: String },

    #[error("risk level {value} is outside 1..=10")]
    InvalidRiskLevel { value: u8 },

    #[error("portfolio already exists")]
    PortfolioExists,

    #[error("no active portfolio")]
    NoPortfolio,

    #[error("token {token} is not approved for custody")]
    TokenNotApproved { token: Address },
}

/// 거래 엔진 최상위 에러
#[derive(Debug, Error)]
pub enum TradeError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("invalid token pair: {token_in} -> {token_out}")]
    InvalidPair { token_in: Address, token_out: Address },

    #[error("no pool found for {token_in} -> {token_out}")]
    NoPoolFound { token_in: Address, token_out: Address },

    #[error("no quote available after {} attempts", attempts.len())]
    NoQuoteAvailable { attempts: Vec<QuoteAttempt> },

    #[error("trade rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("insufficient balance of {token}: required {required}, available {available}")]
    InsufficientBalance { token: Address, required: U256, available: U256 },

    #[error("insufficient allowance of {token} for {spender}: required {required}, granted {granted}")]
    InsufficientAllowance { token: Address, spender: Address, required: U256, granted: U256 },

    #[error("insufficient native balance for gas: required {required}, available {available}")]
    InsufficientGasFunds { required: U256, available: U256 },

    #[error("approval transaction {tx_hash} failed")]
    ApprovalFailed { tx_hash: TxHash },

    #[error("gas estimation failed ({failure:?}): {reason}")]
    EstimationFailed { failure: ExecutionFailure, reason: String },

    #[error("transaction submission failed ({failure:?}): {reason}")]
    SubmissionFailed { failure: ExecutionFailure, reason: String },

    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: TxHash, reason: String },

    #[error("transaction {tx_hash} not confirmed within {timeout_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_secs: u64 },

    #[error("trade flow cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl TradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // 컨트랙트가 응답한 revert는 연결 문제가 아니다
            TradeError::Chain(ChainError::Revert { .. }) => ErrorKind::Execution,
            TradeError::Chain(_) => ErrorKind::Connectivity,
            TradeError::InvalidPair { .. } | TradeError::Rejected(_) => ErrorKind::Validation,
            TradeError::NoPoolFound { .. } | TradeError::NoQuoteAvailable { .. } => ErrorKind::Liquidity,
            TradeError::InsufficientBalance { .. } | TradeError::InsufficientAllowance { .. } => {
                ErrorKind::Balance
            }
            TradeError::EstimationFailed { failure, .. } | TradeError::SubmissionFailed { failure, .. } => {
                match failure {
                    ExecutionFailure::TokenBalance | ExecutionFailure::TokenAllowance => ErrorKind::Balance,
                    _ => ErrorKind::Execution,
                }
            }
            TradeError::InsufficientGasFunds { .. }
            | TradeError::ApprovalFailed { .. }
            | TradeError::Reverted { .. }
            | TradeError::ConfirmationTimeout { .. } => ErrorKind::Execution,
            TradeError::Cancelled => ErrorKind::Cancelled,
            TradeError::Config(_) => ErrorKind::Config,
        }
    }

    /// 같은 입력으로 다시 시도할 가치가 있는지
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Liquidity)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TradeError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TradeError::from(ChainError::Transport("refused".into())).kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(
            TradeError::from(ChainError::Revert { reason: "Not whitelisted".into() }).kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            TradeError::from(Rejection::HoneypotDetected).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TradeError::NoQuoteAvailable { attempts: vec![] }.kind(),
            ErrorKind::Liquidity
        );
        assert_eq!(
            TradeError::InsufficientGasFunds { required: U256::from(1u8), available: U256::ZERO }.kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            TradeError::EstimationFailed {
                failure: ExecutionFailure::TokenAllowance,
                reason: "insufficient allowance".into()
            }
            .kind(),
            ErrorKind::Balance
        );
        assert!(TradeError::NoPoolFound { token_in: Address::ZERO, token_out: Address::ZERO }.is_retryable());
        assert!(!TradeError::Cancelled.is_retryable());
    }

    #[test]
    fn test_quote_failure_hints_are_distinct() {
        let hints = [
            QuoteFailure::PoolUninitialized.hint(),
            QuoteFailure::InsufficientLiquidity.hint(),
            QuoteFailure::SimulationReverted.hint(),
            QuoteFailure::Unknown.hint(),
        ];
        for (i, a) in hints.iter().enumerate() {
            for b in hints.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
