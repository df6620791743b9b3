//! Trade Validator
//!
//! 네트워크 없이 고정 입력만으로 판단하는 순수 함수들.
//!
//! ```text
//! START -> CheckEnabled -> CheckAmount -> CheckMinimum -> CheckWhitelist -> CheckCooldown
//!        -> [strict] CheckPrediction -> CheckConfidence -> CheckRisk -> CheckHoneypot -> PASS
//!        -> [bypass] 실패 항목마다 경고 -> PASS
//! ```

use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::amount::parse_units;
use crate::common::time::remaining_secs;
use crate::errors::Rejection;
use crate::types::{Prediction, Quote, TradeRequest, TradeSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// 예측 기반 검사 실패 시 거절
    Strict,
    /// 예측 기반 검사 실패를 경고로만 남김
    Bypass,
}

/// 견적 전 거래 의도
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub token_in: Address,
    pub token_out: Address,
    /// 설정/쿨다운의 기준 토큰
    pub subject: Address,
    /// 사용자 입력 10진수 금액
    pub amount: String,
    /// token_in decimals
    pub decimals: u8,
}

pub struct ValidationContext<'a> {
    pub request: &'a TradeIntent,
    pub settings: &'a TradeSettings,
    pub prediction: Option<&'a Prediction>,
    /// 온체인 whitelist에 있는 토큰들
    pub whitelist: &'a HashSet<Address>,
    pub min_trade_amount: U256,
    pub last_fired_at: Option<u64>,
    pub cooldown_secs: u64,
    /// 사용자가 명시적으로 쿨다운을 무시한 경우
    pub ignore_cooldown: bool,
    pub max_prediction_age_secs: u64,
    pub now: u64,
    pub mode: ValidationMode,
}

/// 검증 통과 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// 최소 단위로 변환된 입력 금액
    pub amount_in: U256,
    pub warnings: Vec<String>,
}

pub fn validate(ctx: &ValidationContext<'_>) -> Result<ValidationReport, Rejection> {
    let request = ctx.request;
    let mut warnings = Vec::new();

    if !ctx.settings.enabled {
        return Err(Rejection::TradingDisabled);
    }

    let amount_in = parse_units(&request.amount, request.decimals).map_err(|_| Rejection::InvalidAmount {
        value: request.amount.clone(),
    })?;

    if amount_in < ctx.min_trade_amount {
        return Err(Rejection::BelowMinimumTrade {
            amount: amount_in,
            minimum: ctx.min_trade_amount,
        });
    }

    for token in [request.token_in, request.token_out] {
        if !ctx.whitelist.contains(&token) {
            return Err(Rejection::TokenNotWhitelisted { token });
        }
    }

    if let Some(last) = ctx.last_fired_at {
        let remaining = remaining_secs(last, ctx.cooldown_secs, ctx.now);
        if remaining > 0 {
            if !ctx.ignore_cooldown {
                return Err(Rejection::CooldownActive {
                    remaining_secs: remaining,
                });
            }
            warnings.push(format!("cooldown ignored with {}s remaining", remaining));
        }
    }

    for rejection in prediction_checks(ctx) {
        match ctx.mode {
            ValidationMode::Strict => return Err(rejection),
            ValidationMode::Bypass => {
                warn!("⚠️ [bypass] {}", rejection);
                warnings.push(rejection.to_string());
            }
        }
    }

    debug!("✅ 검증 통과: amount_in={} warnings={}", amount_in, warnings.len());
    Ok(ValidationReport { amount_in, warnings })
}

/// 예측 기반 검사. 실패 항목을 검사 순서대로 반환한다.
fn prediction_checks(ctx: &ValidationContext<'_>) -> Vec<Rejection> {
    let prediction = match ctx.prediction {
        Some(prediction) => prediction,
        None => return vec![Rejection::PredictionUnavailable],
    };

    let mut failures = Vec::new();

    let age_secs = prediction.age_secs(ctx.now);
    if age_secs > ctx.max_prediction_age_secs {
        failures.push(Rejection::PredictionStale {
            age_secs,
            max_age_secs: ctx.max_prediction_age_secs,
        });
    }

    if prediction.confidence < ctx.settings.min_confidence {
        failures.push(Rejection::ConfidenceTooLow {
            confidence: prediction.confidence,
            minimum: ctx.settings.min_confidence,
        });
    }

    if prediction.risk_score > ctx.settings.max_risk_score {
        failures.push(Rejection::RiskTooHigh {
            risk_score: prediction.risk_score,
            maximum: ctx.settings.max_risk_score,
        });
    }

    if prediction.is_honeypot {
        failures.push(Rejection::HoneypotDetected);
    }

    failures
}

/// 견적 의존 검사: 같은 (tokenIn, tokenOut, amountIn, fee, pool) 튜플의 0이 아닌 견적이어야 한다.
pub fn validate_quote(request: &TradeRequest, quote: &Quote, slippage_bps: u32) -> Result<(), Rejection> {
    if quote.amount_out.is_zero() {
        return Err(Rejection::ZeroQuote);
    }

    let mismatch = |reason: &str| Rejection::QuoteMismatch {
        reason: reason.to_string(),
    };

    if request.token_in != quote.token_in || request.token_out != quote.token_out {
        return Err(mismatch("token pair differs from quote"));
    }
    if request.amount_in != quote.amount_in {
        return Err(mismatch("amount_in differs from quote"));
    }
    if request.fee != quote.fee || request.pool != quote.pool {
        return Err(mismatch("pool/fee differs from quote"));
    }
    if request.min_amount_out != quote.min_amount_out(slippage_bps) {
        return Err(mismatch("min_amount_out does not follow slippage tolerance"));
    }

    Ok(())
}
