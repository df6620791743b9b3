use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::blockchain::traits::OracleApi;
use crate::errors::ChainError;
use crate::types::Prediction;

/// 예측 신선도 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale { age_secs: u64 },
}

/// AI 오라클 예측 조회
pub struct PredictionService {
    oracle: Arc<dyn OracleApi>,
    max_age_secs: u64,
}

impl PredictionService {
    pub fn new(oracle: Arc<dyn OracleApi>, max_age_secs: u64) -> Self {
        Self { oracle, max_age_secs }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// 예측이 없으면 `Ok(None)`. 연결 문제만 에러로 올린다.
    pub async fn fetch(&self, token: Address) -> Result<Option<Prediction>, ChainError> {
        match self.oracle.get_prediction(token).await {
            // timestamp 0 = 한 번도 기록되지 않은 슬롯
            Ok(prediction) if prediction.timestamp == 0 => {
                debug!("🔮 {} 예측 없음 (빈 슬롯)", token);
                Ok(None)
            }
            Ok(prediction) => {
                debug!(
                    "🔮 {} 예측: confidence={} risk={} honeypot={} direction={}",
                    token,
                    prediction.confidence,
                    prediction.risk_score,
                    prediction.is_honeypot,
                    prediction.price_direction
                );
                Ok(Some(prediction))
            }
            Err(ChainError::Revert { reason }) => {
                warn!("⚠️ {} 예측 조회 revert: {}", token, reason);
                Ok(None)
            }
            Err(ChainError::NotConfigured(what)) => {
                warn!("⚠️ {} 컨트랙트 미설정 - 예측 없이 진행", what);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn freshness(&self, prediction: &Prediction, now: u64) -> Freshness {
        let age_secs = prediction.age_secs(now);
        if age_secs > self.max_age_secs {
            Freshness::Stale { age_secs }
        } else {
            Freshness::Fresh
        }
    }
}

/// 표시용 방향 라벨
pub fn direction_label(prediction: &Prediction) -> &'static str {
    match prediction.price_direction.signum() {
        1 => "up",
        -1 => "down",
        _ => "flat",
    }
}
