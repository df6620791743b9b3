use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::events::{EventSink, TradeEvent};
use super::executor::{ExecutorSettings, TradeExecutor};
use super::session::SessionState;
use super::validator::{validate, validate_quote, TradeIntent, ValidationContext};
use crate::blockchain::tokens::TokenRegistry;
use crate::blockchain::traits::ChainApis;
use crate::common::time::current_timestamp;
use crate::config::Config;
use crate::dex::{check_liquidity, LiquidityReport, PoolLocator, QuoteCache, QuoteResolver};
use crate::errors::TradeError;
use crate::oracle::PredictionService;
use crate::types::{PoolCandidate, Quote, QuoteKey, TradeRequest, TxResult};

/// 거래 주문 (사용자 액션 하나 또는 자동 거래 한 건)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOrder {
    pub token_in: Address,
    pub token_out: Address,
    /// 설정/쿨다운/예측의 기준 토큰
    pub subject: Address,
    /// 입력 토큰 단위 10진수 금액
    pub amount: String,
    pub ignore_cooldown: bool,
}

impl TradeOrder {
    /// 수동 매수: token_out이 기준 토큰
    pub fn buy(token_in: Address, token_out: Address, amount: impl Into<String>) -> Self {
        Self {
            token_in,
            token_out,
            subject: token_out,
            amount: amount.into(),
            ignore_cooldown: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub flow_id: Uuid,
    pub quote: Quote,
    pub request: TradeRequest,
    pub tx: TxResult,
    pub warnings: Vec<String>,
}

/// 거래 파이프라인
///
/// Validator(사전) -> Locator -> Resolver -> Validator(견적) -> Executor.
/// 제출 전까지는 `CancellationToken`으로 중단할 수 있다.
pub struct TradePipeline {
    apis: ChainApis,
    tokens: TokenRegistry,
    locator: PoolLocator,
    resolver: QuoteResolver,
    cache: QuoteCache,
    predictions: PredictionService,
    executor: TradeExecutor,
    session: Arc<SessionState>,
    events: EventSink,
    slippage_bps: u32,
    recipient: Option<Address>,
}

impl TradePipeline {
    pub fn new(apis: ChainApis, config: &Config, session: Arc<SessionState>, events: EventSink) -> Self {
        let trading = &config.trading;
        Self {
            tokens: TokenRegistry::new(apis.tokens.clone(), config.configured_decimals()),
            locator: PoolLocator::new(apis.factory.clone(), apis.tokens.clone(), trading.fee_tiers.clone()),
            resolver: QuoteResolver::new(apis.quoter.clone()),
            cache: QuoteCache::new(Duration::from_secs(trading.quote_cache_ttl_secs)),
            predictions: PredictionService::new(apis.oracle.clone(), trading.max_prediction_age_secs),
            executor: TradeExecutor::new(
                apis.clone(),
                session.clone(),
                events.clone(),
                ExecutorSettings::from(trading),
            ),
            apis,
            session,
            events,
            slippage_bps: trading.slippage_bps,
            recipient: trading.recipient,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    pub fn slippage_bps(&self) -> u32 {
        self.slippage_bps
    }

    /// 읽기 전용 유동성 확인
    pub async fn check_liquidity(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<LiquidityReport, TradeError> {
        check_liquidity(&self.locator, &self.resolver, token_in, token_out, amount_in).await
    }

    /// 견적만 조회 (캐시에 저장되어 뒤이은 실행에서 재사용)
    pub async fn quote(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<Quote, TradeError> {
        let candidates = self.locator.locate(token_in, token_out).await?;
        let (quote, _) = self.resolve(&candidates, token_in, token_out, amount_in).await?;
        Ok(quote)
    }

    pub async fn run(&self, order: &TradeOrder, cancel: &CancellationToken) -> Result<TradeOutcome, TradeError> {
        let flow_id = Uuid::new_v4();
        self.events.emit(TradeEvent::FlowStarted {
            flow_id,
            token_in: order.token_in,
            token_out: order.token_out,
            amount: order.amount.clone(),
        });

        let result = self.run_flow(flow_id, order, cancel).await;
        if let Err(e) = &result {
            self.events.emit(TradeEvent::TradeFailed {
                flow_id,
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        result
    }

    async fn run_flow(
        &self,
        flow_id: Uuid,
        order: &TradeOrder,
        cancel: &CancellationToken,
    ) -> Result<TradeOutcome, TradeError> {
        let _guard = self.session.try_begin(order.subject)?;

        // 사전 검증 입력 수집
        let token_in = cancellable(cancel, async { Ok::<_, TradeError>(self.tokens.resolve(order.token_in).await?) }).await?;
        let (in_listed, out_listed, min_trade_amount, prediction) = cancellable(cancel, async {
            let (in_listed, out_listed, min_trade, prediction) = futures::join!(
                self.apis.trade_contract.is_whitelisted(order.token_in),
                self.apis.trade_contract.is_whitelisted(order.token_out),
                self.apis.trade_contract.min_trade_amount(),
                self.predictions.fetch(order.subject),
            );
            Ok::<_, TradeError>((in_listed?, out_listed?, min_trade?, prediction?))
        })
        .await?;

        let mut whitelist = HashSet::new();
        if in_listed {
            whitelist.insert(order.token_in);
        }
        if out_listed {
            whitelist.insert(order.token_out);
        }

        let intent = TradeIntent {
            token_in: order.token_in,
            token_out: order.token_out,
            subject: order.subject,
            amount: order.amount.clone(),
            decimals: token_in.decimals,
        };
        let settings = self.session.settings(order.subject);
        let report = validate(&ValidationContext {
            request: &intent,
            settings: &settings,
            prediction: prediction.as_ref(),
            whitelist: &whitelist,
            min_trade_amount,
            last_fired_at: self.session.last_fired_at(order.subject),
            cooldown_secs: self.session.cooldown_secs(),
            ignore_cooldown: order.ignore_cooldown,
            max_prediction_age_secs: self.predictions.max_age_secs(),
            now: current_timestamp(),
            mode: self.session.mode(),
        })?;

        for message in &report.warnings {
            self.events.emit(TradeEvent::ValidationWarning {
                flow_id,
                message: message.clone(),
            });
        }

        // 풀 탐색 + 견적
        let amount_in = report.amount_in;
        let candidates = cancellable(cancel, self.locator.locate(order.token_in, order.token_out)).await?;
        self.events.emit(TradeEvent::PoolsLocated {
            flow_id,
            count: candidates.len(),
            best_fee: candidates[0].fee,
        });

        let resolved = cancellable(
            cancel,
            self.resolve(&candidates, order.token_in, order.token_out, amount_in),
        )
        .await;
        let (quote, cached) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                // 취소 시점에 이미 저장된 견적이 있을 수 있다
                self.forget_quotes(&candidates, order.token_in, order.token_out, amount_in);
                return Err(e);
            }
        };
        self.events.emit(TradeEvent::QuoteObtained {
            flow_id,
            fee: quote.fee,
            source: quote.source,
            amount_out: quote.amount_out,
            cached,
        });

        // 견적은 이 플로우 안에서만 유효하다. 성공/실패와 무관하게 캐시에서 제거
        let executed = self.execute_quote(flow_id, order.subject, &quote, cancel).await;
        self.cache.invalidate(&quote.key());
        let (request, tx) = executed?;

        info!("🎉 거래 완료: {} (flow {})", tx.tx_hash, flow_id);
        Ok(TradeOutcome {
            flow_id,
            quote,
            request,
            tx,
            warnings: report.warnings,
        })
    }

    async fn execute_quote(
        &self,
        flow_id: Uuid,
        subject: Address,
        quote: &Quote,
        cancel: &CancellationToken,
    ) -> Result<(TradeRequest, TxResult), TradeError> {
        // 견적 의존 검증
        let recipient = match self.recipient {
            Some(recipient) => recipient,
            None => self.apis.wallet.account()?,
        };
        let request = TradeRequest::from_quote(quote, recipient, self.slippage_bps);
        validate_quote(&request, quote, self.slippage_bps)?;
        debug!(
            "📐 min_amount_out {} ({} bps slippage)",
            request.min_amount_out, self.slippage_bps
        );

        if cancel.is_cancelled() {
            return Err(TradeError::Cancelled);
        }

        let tx = self.executor.execute(flow_id, subject, &request, cancel).await?;
        Ok((request, tx))
    }

    fn forget_quotes(&self, candidates: &[PoolCandidate], token_in: Address, token_out: Address, amount_in: U256) {
        for candidate in candidates {
            self.cache.invalidate(&QuoteKey {
                token_in,
                token_out,
                amount_in,
                fee: candidate.fee,
            });
        }
    }

    /// 순위대로 후보마다 캐시를 먼저 보고, 없으면 견적 시뮬레이션.
    /// 견적은 받은 (pool, fee) 튜플에만 귀속된다.
    async fn resolve(
        &self,
        candidates: &[PoolCandidate],
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<(Quote, bool), TradeError> {
        let mut attempts = Vec::new();

        for candidate in candidates {
            let key = QuoteKey {
                token_in,
                token_out,
                amount_in,
                fee: candidate.fee,
            };
            if let Some(quote) = self.cache.get(&key) {
                if quote.pool == candidate.pool_address {
                    debug!("♻️ 캐시된 견적 사용: fee {}", candidate.fee);
                    return Ok((quote, true));
                }
                self.cache.invalidate(&key);
            }

            match self.resolver.quote_candidate(candidate, token_in, token_out, amount_in).await {
                Ok(quote) => {
                    self.cache.insert(quote.clone());
                    return Ok((quote, false));
                }
                Err(mut failed) => attempts.append(&mut failed),
            }
        }

        Err(TradeError::NoQuoteAvailable { attempts })
    }
}

/// 취소 토큰과 경주. 취소되면 진행 중인 읽기 호출은 버려진다.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TradeError>
where
    F: Future<Output = Result<T, TradeError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TradeError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::USDC;
    use crate::errors::{ErrorKind, Rejection};
    use crate::mocks::{demo_token, MockChain, ReceiptBehavior};
    use crate::trading::validator::ValidationMode;
    use crate::types::{FeeTier, Prediction, TradeSettings, TxStatus};

    fn config() -> Config {
        let mut config = Config::default();
        config.contracts.trade_executor = Some(Address::repeat_byte(0x7E));
        config
    }

    fn pipeline(mock: Arc<MockChain>, mode: ValidationMode) -> TradePipeline {
        let session = Arc::new(SessionState::new(300, mode));
        session.set_settings(
            demo_token(),
            TradeSettings {
                enabled: true,
                trade_amount: "100".to_string(),
                ..TradeSettings::default()
            },
        );
        TradePipeline::new(ChainApis::from_backend(mock), &config(), session, EventSink::new(64))
    }

    #[tokio::test]
    async fn test_full_flow_on_demo_chain() {
        let mock = Arc::new(MockChain::demo());
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        let mut events = pipeline.events().subscribe();

        let outcome = pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.quote.fee, FeeTier::Low);
        assert_eq!(outcome.request.min_amount_out, U256::from(38_000_000_000u64));
        assert!(pipeline.session().last_fired_at(demo_token()).is_some());
        assert!(!pipeline.session().is_in_flight(demo_token()));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.flow_id(), outcome.flow_id);
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(TradeEvent::FlowStarted { .. })));
        assert!(matches!(seen.last(), Some(TradeEvent::TradeConfirmed { .. })));
    }

    #[tokio::test]
    async fn test_second_trade_hits_cooldown() {
        let mock = Arc::new(MockChain::demo());
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        let order = TradeOrder::buy(USDC, demo_token(), "100");

        pipeline.run(&order, &CancellationToken::new()).await.unwrap();
        let err = pipeline.run(&order, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::CooldownActive { .. })));
        assert_eq!(mock.swaps().len(), 1);
    }

    #[tokio::test]
    async fn test_no_pool_never_reaches_quoter_or_executor() {
        let other = Address::repeat_byte(0x99);
        let mock = Arc::new(
            MockChain::demo()
                .with_token(other, "OTH", 18)
                .with_whitelisted(&[other])
                .with_prediction(
                    other,
                    Prediction {
                        confidence: 90,
                        price_direction: 1,
                        is_honeypot: false,
                        risk_score: 5,
                        timestamp: current_timestamp(),
                    },
                ),
        );
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        pipeline.session().update_settings(other, |s| {
            s.enabled = true;
        });
        let mut events = pipeline.events().subscribe();

        let err = pipeline
            .run(&TradeOrder::buy(USDC, other, "100"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::NoPoolFound { .. }));
        assert_eq!(mock.call_count("quote_exact_input_single"), 0);
        assert!(mock.swaps().is_empty());

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if let TradeEvent::TradeFailed { kind, .. } = event {
                assert_eq!(kind, ErrorKind::Liquidity);
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_low_confidence_strict_vs_bypass() {
        let weak = Prediction {
            confidence: 40,
            price_direction: 1,
            is_honeypot: false,
            risk_score: 10,
            timestamp: current_timestamp(),
        };

        let mock = Arc::new(MockChain::demo().with_prediction(demo_token(), weak.clone()));
        let strict = pipeline(mock.clone(), ValidationMode::Strict);
        let err = strict
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::ConfidenceTooLow { .. })));
        assert_eq!(mock.call_count("get_pool"), 0);

        let mock = Arc::new(MockChain::demo().with_prediction(demo_token(), weak));
        let bypass = pipeline(mock.clone(), ValidationMode::Bypass);
        let outcome = bypass
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_quote_is_reused_from_cache() {
        let mock = Arc::new(MockChain::demo());
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        let amount = U256::from(100_000_000u64);

        let quote = pipeline.quote(USDC, demo_token(), amount).await.unwrap();
        let quotes_before = mock.call_count("quote_exact_input_single");

        let outcome = pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(mock.call_count("quote_exact_input_single"), quotes_before);
        assert_eq!(outcome.quote, quote);
    }

    #[tokio::test]
    async fn test_reverted_swap_does_not_leave_cached_quote() {
        let mock = Arc::new(MockChain::demo().with_swap_receipt(ReceiptBehavior::Revert));
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        let order = TradeOrder::buy(USDC, demo_token(), "100");

        let err = pipeline.run(&order, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TradeError::Reverted { .. }));
        assert!(pipeline.session().last_fired_at(demo_token()).is_none());
        let quotes_before = mock.call_count("quote_exact_input_single");

        mock.set_swap_receipt(ReceiptBehavior::Success);
        let outcome = pipeline.run(&order, &CancellationToken::new()).await.unwrap();
        assert_eq!(mock.call_count("quote_exact_input_single"), quotes_before + 1);
        assert_eq!(outcome.tx.status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancelled_flow_leaves_no_state() {
        let mock = Arc::new(MockChain::demo());
        let pipeline = pipeline(mock.clone(), ValidationMode::Strict);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Cancelled));
        assert!(mock.approvals().is_empty());
        assert!(pipeline.session().last_fired_at(demo_token()).is_none());
        assert!(!pipeline.session().is_in_flight(demo_token()));
    }

    #[tokio::test]
    async fn test_concurrent_trade_for_same_token_is_rejected() {
        let mock = Arc::new(MockChain::demo());
        let pipeline = pipeline(mock, ValidationMode::Strict);
        let _held = pipeline.session().try_begin(demo_token()).unwrap();

        let err = pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::TradeInFlight { .. })));
    }
}
