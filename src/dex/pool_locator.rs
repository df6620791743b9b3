use std::sync::Arc;

use alloy::primitives::{Address, U256};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::blockchain::traits::{PoolFactoryApi, TokenApi};
use crate::common::validation::is_valid_pair;
use crate::errors::{ChainError, TradeError};
use crate::types::{FeeTier, PoolCandidate};

/// Pool Locator
///
/// fee tier별로 factory에 풀 주소를 묻고, 풀이 보유한 입력 토큰 잔액으로
/// 후보를 정렬한다. 잔액은 TVL이 아니지만 순위 매기기에는 충분하다.
pub struct PoolLocator {
    factory: Arc<dyn PoolFactoryApi>,
    tokens: Arc<dyn TokenApi>,
    /// 선호 순서 (유동성 동률이면 앞쪽 우선)
    fee_tiers: Vec<FeeTier>,
}

impl PoolLocator {
    pub fn new(factory: Arc<dyn PoolFactoryApi>, tokens: Arc<dyn TokenApi>, fee_tiers: Vec<FeeTier>) -> Self {
        Self {
            factory,
            tokens,
            fee_tiers,
        }
    }

    pub fn fee_tiers(&self) -> &[FeeTier] {
        &self.fee_tiers
    }

    pub async fn locate(&self, token_in: Address, token_out: Address) -> Result<Vec<PoolCandidate>, TradeError> {
        if !is_valid_pair(token_in, token_out) {
            return Err(TradeError::InvalidPair { token_in, token_out });
        }

        debug!("🔍 풀 탐색: {} -> {} ({}개 tier)", token_in, token_out, self.fee_tiers.len());

        // tier별 factory 조회는 동시에, 결과는 선호 순서대로
        let lookups = join_all(self.fee_tiers.iter().map(|&fee| async move {
            (fee, self.factory.get_pool(token_in, token_out, fee).await)
        }))
        .await;

        let mut found: Vec<(FeeTier, Address)> = Vec::new();
        let mut failed = 0usize;
        let mut last_error: Option<ChainError> = None;

        for (fee, result) in lookups {
            match result {
                Ok(pool) if pool == Address::ZERO => {
                    debug!("  ⏭️ fee {}: 풀 없음", fee);
                }
                Ok(pool) => found.push((fee, pool)),
                Err(e) => {
                    warn!("⚠️ fee {} 풀 조회 실패: {}", fee, e);
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if found.is_empty() {
            if failed == self.fee_tiers.len() {
                if let Some(e) = last_error {
                    return Err(TradeError::Chain(e));
                }
            }
            info!("❌ 풀 없음: {} -> {}", token_in, token_out);
            return Err(TradeError::NoPoolFound { token_in, token_out });
        }

        let balances = join_all(
            found
                .iter()
                .map(|&(_, pool)| async move { self.tokens.balance_of(token_in, pool).await }),
        )
        .await;

        let mut candidates: Vec<PoolCandidate> = found
            .into_iter()
            .zip(balances)
            .map(|((fee, pool_address), balance)| {
                let observed_liquidity = balance.unwrap_or_else(|e| {
                    warn!("⚠️ 풀 {} 유동성 조회 실패: {}", pool_address, e);
                    U256::ZERO
                });
                PoolCandidate {
                    pool_address,
                    fee,
                    observed_liquidity,
                }
            })
            .collect();

        // stable sort: 동률이면 선호 순서 유지
        candidates.sort_by(|a, b| b.observed_liquidity.cmp(&a.observed_liquidity));

        for candidate in &candidates {
            debug!(
                "  🏊 pool {} fee {} liquidity {}",
                candidate.pool_address, candidate.fee, candidate.observed_liquidity
            );
        }
        info!("✅ {}개 풀 후보 발견: {} -> {}", candidates.len(), token_in, token_out);

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FEE_TIER_PREFERENCE;
    use crate::mocks::MockChain;

    fn a() -> Address {
        Address::repeat_byte(0x0A)
    }

    fn b() -> Address {
        Address::repeat_byte(0x0B)
    }

    fn locator(mock: Arc<MockChain>) -> PoolLocator {
        PoolLocator::new(mock.clone(), mock, FEE_TIER_PREFERENCE.to_vec())
    }

    #[tokio::test]
    async fn test_no_pool_found() {
        let mock = Arc::new(MockChain::new());
        let err = locator(mock.clone()).locate(a(), b()).await.unwrap_err();
        assert!(matches!(err, TradeError::NoPoolFound { .. }));
        assert_eq!(mock.call_count("get_pool"), 4);
        assert_eq!(mock.call_count("balance_of"), 0);
    }

    #[tokio::test]
    async fn test_ranks_by_liquidity_with_preference_tiebreak() {
        let mock = Arc::new(
            MockChain::new()
                .with_pool(a(), b(), FeeTier::Lowest, Address::repeat_byte(1), U256::from(500u64), U256::ZERO)
                .with_pool(a(), b(), FeeTier::Low, Address::repeat_byte(2), U256::from(900u64), U256::ZERO)
                .with_pool(a(), b(), FeeTier::Medium, Address::repeat_byte(3), U256::from(500u64), U256::ZERO),
        );

        let candidates = locator(mock).locate(a(), b()).await.unwrap();
        let fees: Vec<FeeTier> = candidates.iter().map(|c| c.fee).collect();
        // Medium이 Lowest보다 선호 순서가 앞
        assert_eq!(fees, vec![FeeTier::Low, FeeTier::Medium, FeeTier::Lowest]);
        assert_eq!(candidates[0].observed_liquidity, U256::from(900u64));
    }

    #[tokio::test]
    async fn test_locate_is_idempotent() {
        let mock = Arc::new(
            MockChain::new()
                .with_pool(a(), b(), FeeTier::Low, Address::repeat_byte(2), U256::from(7u64), U256::ZERO)
                .with_pool(a(), b(), FeeTier::High, Address::repeat_byte(4), U256::from(7u64), U256::ZERO),
        );
        let locator = locator(mock);
        let first = locator.locate(a(), b()).await.unwrap();
        let second = locator.locate(a(), b()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_invalid_pair_makes_no_calls() {
        let mock = Arc::new(MockChain::new());
        let err = locator(mock.clone()).locate(a(), a()).await.unwrap_err();
        assert!(matches!(err, TradeError::InvalidPair { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_tier_is_skipped() {
        let mock = Arc::new(
            MockChain::new()
                .with_factory_error(FeeTier::Medium, ChainError::Transport("connection reset".into()))
                .with_pool(a(), b(), FeeTier::Low, Address::repeat_byte(2), U256::from(1u64), U256::ZERO),
        );
        let candidates = locator(mock).locate(a(), b()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].fee, FeeTier::Low);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_is_connectivity_error() {
        let mut mock = MockChain::new();
        for fee in FeeTier::ALL {
            mock = mock.with_factory_error(fee, ChainError::Transport("connection refused".into()));
        }
        let err = locator(Arc::new(mock)).locate(a(), b()).await.unwrap_err();
        assert!(matches!(err, TradeError::Chain(ChainError::Transport(_))));
    }
}
