use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use oracle_trade_engine::constants::{FEE_TIER_PREFERENCE, UNISWAP_V3_ROUTER, USDC};
use oracle_trade_engine::dex::PoolLocator;
use oracle_trade_engine::mocks::{demo_token, MockChain, QuoteBehavior};
use oracle_trade_engine::types::{FeeTier, QuoteSource, TxStatus};
use oracle_trade_engine::{
    ChainApis, ChainError, Config, EventSink, Rejection, SessionState, TradeError, TradeEvent, TradeOrder,
    TradePipeline, ValidationMode,
};

fn usdc(amount: u64) -> U256 {
    U256::from(amount) * U256::from(1_000_000u64)
}

fn pipeline(mock: Arc<MockChain>) -> TradePipeline {
    let mut config = Config::default();
    config.contracts.trade_executor = mock.trade_contract();

    let session = Arc::new(SessionState::new(
        config.trading.cooldown_secs,
        ValidationMode::Strict,
    ));
    session.update_settings(demo_token(), |s| {
        s.enabled = true;
        s.trade_amount = "100".to_string();
    });
    TradePipeline::new(ChainApis::from_backend(mock), &config, session, EventSink::new(64))
}

/// 100 USDC -> TKN, 0.05% 풀, 견적 40,000 TKN, 5% 슬리피지
#[tokio::test]
async fn usdc_to_tkn_through_low_fee_pool() {
    let mock = Arc::new(MockChain::demo());
    let account = mock.signer_address().unwrap();
    let pipeline = pipeline(mock.clone());
    let mut events = pipeline.events().subscribe();

    let outcome = assert_ok!(
        pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
    );

    // 견적
    assert_eq!(outcome.quote.fee, FeeTier::Low);
    assert_eq!(outcome.quote.source, QuoteSource::Direct);
    assert_eq!(outcome.quote.amount_out, U256::from(40_000_000_000u64));

    // allowance: 라우터에 최소 amount_in
    let approvals = mock.approvals();
    assert_eq!(approvals.len(), 1);
    let (token, spender, amount) = approvals[0];
    assert_eq!(token, USDC);
    assert_eq!(spender, UNISWAP_V3_ROUTER);
    assert!(amount >= U256::from(100_000_000u64));

    // 스왑: 견적 x 0.95
    let swaps = mock.swaps();
    assert_eq!(swaps.len(), 1);
    let (params, _) = &swaps[0];
    assert_eq!(params.amount_in, U256::from(100_000_000u64));
    assert_eq!(params.amount_out_minimum, U256::from(38_000_000_000u64));
    assert_eq!(params.fee, FeeTier::Low);
    assert_eq!(params.recipient, account);

    // 확정 + 쿨다운 기록
    assert_eq!(outcome.tx.status, TxStatus::Confirmed);
    assert!(pipeline.session().last_fired_at(demo_token()).is_some());
    assert_eq!(mock.balance(USDC, account), usdc(9_900));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert_eq!(
        kinds,
        vec![
            "flow_started",
            "pools_located",
            "quote_obtained",
            "approval_submitted",
            "trade_submitted",
            "trade_confirmed",
        ]
    );

    // 같은 토큰은 쿨다운 동안 거절
    let err = assert_err!(
        pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
    );
    assert!(matches!(err.rejection(), Some(Rejection::CooldownActive { .. })));
}

#[tokio::test]
async fn direct_quote_revert_falls_back_to_path() {
    let mock = Arc::new(
        MockChain::demo()
            .with_direct_quote(
                USDC,
                demo_token(),
                FeeTier::Low,
                QuoteBehavior::Fail(ChainError::Revert {
                    reason: "Unexpected error".to_string(),
                }),
            )
            .with_path_quote(
                USDC,
                demo_token(),
                FeeTier::Low,
                QuoteBehavior::Fixed(U256::from(39_000_000_000u64)),
            ),
    );
    let pipeline = pipeline(mock.clone());

    let quote = assert_ok!(pipeline.quote(USDC, demo_token(), usdc(100)).await);
    assert_eq!(quote.source, QuoteSource::Path);
    assert_eq!(quote.fee, FeeTier::Low);
    assert_eq!(mock.call_count("quote_exact_input"), 1);
}

#[tokio::test]
async fn every_candidate_failing_reports_all_attempts() {
    let mock = Arc::new(MockChain::demo().with_direct_quote(
        USDC,
        demo_token(),
        FeeTier::Low,
        QuoteBehavior::Fixed(U256::ZERO),
    ));
    let pipeline = pipeline(mock.clone());
    let mut events = pipeline.events().subscribe();

    let err = assert_err!(
        pipeline
            .run(&TradeOrder::buy(USDC, demo_token(), "100"), &CancellationToken::new())
            .await
    );
    match err {
        // 두 풀 x (direct, path)
        TradeError::NoQuoteAvailable { attempts } => assert_eq!(attempts.len(), 4),
        other => panic!("unexpected error: {other}"),
    }
    assert!(mock.approvals().is_empty());
    assert!(pipeline.session().last_fired_at(demo_token()).is_none());

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, TradeEvent::TradeFailed { .. });
    }
    assert!(failed);
}

#[tokio::test]
async fn unknown_pair_never_reaches_quoter() {
    let mock = Arc::new(MockChain::demo());
    let apis = ChainApis::from_backend(mock.clone());
    let locator = PoolLocator::new(apis.factory.clone(), apis.tokens.clone(), FEE_TIER_PREFERENCE.to_vec());

    let err = assert_err!(locator.locate(USDC, Address::repeat_byte(0x99)).await);
    assert!(matches!(err, TradeError::NoPoolFound { .. }));
    assert_eq!(mock.call_count("quote_exact_input_single"), 0);
}

#[tokio::test]
async fn locate_is_idempotent() {
    let mock = Arc::new(MockChain::demo());
    let apis = ChainApis::from_backend(mock);
    let locator = PoolLocator::new(apis.factory.clone(), apis.tokens.clone(), FEE_TIER_PREFERENCE.to_vec());

    let first = assert_ok!(locator.locate(USDC, demo_token()).await);
    let second = assert_ok!(locator.locate(USDC, demo_token()).await);
    assert_eq!(first, second);
    assert_eq!(first[0].fee, FeeTier::Low);
    assert_eq!(first[1].fee, FeeTier::Medium);
}
