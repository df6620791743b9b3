use std::sync::Arc;

use alloy::primitives::{Address, U160, U256};
use tracing::{debug, info, warn};

use super::classifier::classify_quote_error;
use super::path::encode_single_hop;
use super::pool_locator::PoolLocator;
use crate::blockchain::traits::QuoterApi;
use crate::common::time::current_timestamp;
use crate::errors::{QuoteAttempt, QuoteFailure, TradeError};
use crate::types::{PoolCandidate, Quote, QuoteSource};

/// Quote Resolver
///
/// 후보를 순위대로 시도한다. 후보마다 direct 견적을 먼저, 실패하거나 0이면
/// path 견적을 한 번 더 시도한다. 읽기 전용 시뮬레이션이라 재시도해도 안전하다.
pub struct QuoteResolver {
    quoter: Arc<dyn QuoterApi>,
}

impl QuoteResolver {
    pub fn new(quoter: Arc<dyn QuoterApi>) -> Self {
        Self { quoter }
    }

    pub async fn quote(
        &self,
        candidates: &[PoolCandidate],
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<Quote, TradeError> {
        let mut attempts = Vec::new();

        for candidate in candidates {
            match self.quote_candidate(candidate, token_in, token_out, amount_in).await {
                Ok(quote) => return Ok(quote),
                Err(mut failed) => attempts.append(&mut failed),
            }
        }

        warn!("❌ 견적 실패: {}개 후보, {}회 시도", candidates.len(), attempts.len());
        Err(TradeError::NoQuoteAvailable { attempts })
    }

    /// 후보 하나에 대해 direct -> path 순서로 견적
    pub async fn quote_candidate(
        &self,
        candidate: &PoolCandidate,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<Quote, Vec<QuoteAttempt>> {
        let mut attempts = Vec::with_capacity(2);
        let fee = candidate.fee;

        let direct = self
            .quoter
            .quote_exact_input_single(token_in, token_out, fee, amount_in, U160::ZERO)
            .await;
        match self.accept(candidate, QuoteSource::Direct, direct) {
            Ok(amount_out) => return Ok(self.build(candidate, token_in, token_out, amount_in, amount_out, QuoteSource::Direct)),
            Err(attempt) => {
                debug!("  ↪️ direct 견적 실패 (fee {}): {}, path 견적 시도", fee, attempt.detail);
                attempts.push(attempt);
            }
        }

        let path = encode_single_hop(token_in, fee, token_out);
        debug!("  🧵 path: 0x{}", hex::encode(&path));
        let via_path = self.quoter.quote_exact_input(path, amount_in).await;
        match self.accept(candidate, QuoteSource::Path, via_path) {
            Ok(amount_out) => Ok(self.build(candidate, token_in, token_out, amount_in, amount_out, QuoteSource::Path)),
            Err(attempt) => {
                warn!(
                    "⚠️ 풀 {} (fee {}) 견적 불가: {:?} - {}",
                    candidate.pool_address,
                    fee,
                    attempt.failure,
                    attempt.failure.hint()
                );
                attempts.push(attempt);
                Err(attempts)
            }
        }
    }

    fn accept(
        &self,
        candidate: &PoolCandidate,
        source: QuoteSource,
        result: Result<U256, crate::errors::ChainError>,
    ) -> Result<U256, QuoteAttempt> {
        let (failure, detail) = match result {
            Ok(amount_out) if !amount_out.is_zero() => return Ok(amount_out),
            // 0 출력은 유효한 거래가 아니다
            Ok(_) => (QuoteFailure::InsufficientLiquidity, "quote returned zero output".to_string()),
            Err(e) => (classify_quote_error(&e), e.to_string()),
        };

        Err(QuoteAttempt {
            pool: candidate.pool_address,
            fee: candidate.fee,
            source,
            failure,
            detail,
        })
    }

    fn build(
        &self,
        candidate: &PoolCandidate,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        amount_out: U256,
        source: QuoteSource,
    ) -> Quote {
        info!(
            "💱 견적 성공 ({}): {} -> {} (fee {})",
            source, amount_in, amount_out, candidate.fee
        );
        Quote {
            token_in,
            token_out,
            amount_in,
            amount_out,
            fee: candidate.fee,
            pool: candidate.pool_address,
            source,
            obtained_at: current_timestamp(),
        }
    }
}

/// 후보별 견적 결과 (유동성 확인 화면용)
#[derive(Debug, Clone)]
pub struct CandidateQuote {
    pub candidate: PoolCandidate,
    pub result: Result<Quote, Vec<QuoteAttempt>>,
}

#[derive(Debug, Clone)]
pub struct LiquidityReport {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    /// 풀 순위 순서
    pub entries: Vec<CandidateQuote>,
}

impl LiquidityReport {
    /// 순위상 첫 번째 성공 견적
    pub fn best(&self) -> Option<&Quote> {
        self.entries.iter().find_map(|entry| entry.result.as_ref().ok())
    }

    pub fn quotable_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.result.is_ok()).count()
    }
}

/// 읽기 전용 유동성 확인: 모든 후보의 견적을 수집한다 (첫 성공에서 멈추지 않음)
pub async fn check_liquidity(
    locator: &PoolLocator,
    resolver: &QuoteResolver,
    token_in: Address,
    token_out: Address,
    amount_in: U256,
) -> Result<LiquidityReport, TradeError> {
    let candidates = locator.locate(token_in, token_out).await?;

    let mut entries = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let result = resolver.quote_candidate(&candidate, token_in, token_out, amount_in).await;
        entries.push(CandidateQuote { candidate, result });
    }

    let report = LiquidityReport {
        token_in,
        token_out,
        amount_in,
        entries,
    };
    info!(
        "📊 유동성 확인: {}/{}개 풀 견적 가능",
        report.quotable_count(),
        report.entries.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FEE_TIER_PREFERENCE;
    use crate::errors::ChainError;
    use crate::mocks::{MockChain, QuoteBehavior};
    use crate::types::FeeTier;

    fn token_in() -> Address {
        Address::repeat_byte(0x0A)
    }

    fn token_out() -> Address {
        Address::repeat_byte(0x0B)
    }

    fn candidate(fee: FeeTier, pool: u8) -> PoolCandidate {
        PoolCandidate {
            pool_address: Address::repeat_byte(pool),
            fee,
            observed_liquidity: U256::from(1_000u64),
        }
    }

    fn revert(reason: &str) -> QuoteBehavior {
        QuoteBehavior::Fail(ChainError::Revert {
            reason: reason.to_string(),
        })
    }

    #[tokio::test]
    async fn test_direct_quote_wins() {
        let mock = Arc::new(MockChain::new().with_direct_quote(
            token_in(),
            token_out(),
            FeeTier::Low,
            QuoteBehavior::Fixed(U256::from(40u64)),
        ));
        let resolver = QuoteResolver::new(mock.clone());

        let quote = resolver
            .quote(&[candidate(FeeTier::Low, 1)], token_in(), token_out(), U256::from(100u64))
            .await
            .unwrap();
        assert_eq!(quote.amount_out, U256::from(40u64));
        assert_eq!(quote.source, QuoteSource::Direct);
        assert_eq!(quote.pool, Address::repeat_byte(1));
        assert_eq!(mock.call_count("quote_exact_input"), 0);
    }

    #[tokio::test]
    async fn test_direct_revert_falls_back_to_path() {
        let mock = Arc::new(
            MockChain::new()
                .with_direct_quote(token_in(), token_out(), FeeTier::Low, revert("Unexpected error"))
                .with_path_quote(token_in(), token_out(), FeeTier::Low, QuoteBehavior::Fixed(U256::from(39u64))),
        );
        let resolver = QuoteResolver::new(mock.clone());

        let quote = resolver
            .quote(&[candidate(FeeTier::Low, 1)], token_in(), token_out(), U256::from(100u64))
            .await
            .unwrap();
        assert_eq!(quote.source, QuoteSource::Path);
        assert_eq!(quote.amount_out, U256::from(39u64));
        assert_eq!(mock.call_count("quote_exact_input_single"), 1);
        assert_eq!(mock.call_count("quote_exact_input"), 1);
    }

    #[tokio::test]
    async fn test_both_methods_failing_is_no_quote() {
        let mock = Arc::new(
            MockChain::new()
                .with_direct_quote(token_in(), token_out(), FeeTier::Low, revert("LOK"))
                .with_path_quote(token_in(), token_out(), FeeTier::Low, QuoteBehavior::Fixed(U256::ZERO)),
        );
        let resolver = QuoteResolver::new(mock.clone());

        let err = resolver
            .quote(&[candidate(FeeTier::Low, 1)], token_in(), token_out(), U256::from(100u64))
            .await
            .unwrap_err();
        match err {
            TradeError::NoQuoteAvailable { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].source, QuoteSource::Direct);
                assert_eq!(attempts[0].failure, QuoteFailure::PoolUninitialized);
                assert_eq!(attempts[1].source, QuoteSource::Path);
                assert_eq!(attempts[1].failure, QuoteFailure::InsufficientLiquidity);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(mock.call_count("quote_exact_input"), 1);
    }

    #[tokio::test]
    async fn test_zero_direct_quote_is_failure() {
        let mock = Arc::new(
            MockChain::new()
                .with_direct_quote(token_in(), token_out(), FeeTier::Medium, QuoteBehavior::Fixed(U256::ZERO))
                .with_direct_quote(token_in(), token_out(), FeeTier::Low, QuoteBehavior::Fixed(U256::from(5u64))),
        );
        let resolver = QuoteResolver::new(mock);

        let quote = resolver
            .quote(
                &[candidate(FeeTier::Medium, 3), candidate(FeeTier::Low, 1)],
                token_in(),
                token_out(),
                U256::from(100u64),
            )
            .await
            .unwrap();
        // 0 견적 후보를 건너뛰고 다음 후보 사용
        assert_eq!(quote.fee, FeeTier::Low);
        assert!(!quote.amount_out.is_zero());
    }

    #[tokio::test]
    async fn test_check_liquidity_reports_every_candidate() {
        let mock = Arc::new(MockChain::demo());
        let locator = PoolLocator::new(mock.clone(), mock.clone(), FEE_TIER_PREFERENCE.to_vec());
        let resolver = QuoteResolver::new(mock);

        let report = check_liquidity(
            &locator,
            &resolver,
            crate::constants::USDC,
            crate::mocks::demo_token(),
            U256::from(100_000_000u64),
        )
        .await
        .unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.quotable_count(), 1);
        let best = report.best().unwrap();
        assert_eq!(best.fee, FeeTier::Low);
        assert_eq!(best.amount_out, U256::from(40_000_000_000u64));
    }
}
