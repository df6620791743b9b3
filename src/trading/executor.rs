use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{EventSink, TradeEvent};
use super::session::SessionState;
use crate::blockchain::traits::{ChainApis, ManualTradeParams, SwapParams};
use crate::common::formatting::{format_eth, format_gas_price_gwei};
use crate::common::math::{apply_gas_multiplier, gas_cost_wei};
use crate::common::time::current_timestamp;
use crate::config::{ApprovalMode, ExecutionRoute, TradingConfig};
use crate::dex::classifier::classify_execution_error;
use crate::errors::{ChainError, ExecutionFailure, Rejection, TradeError};
use crate::types::{TradeRequest, TxResult, TxStatus};

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub route: ExecutionRoute,
    pub approval_mode: ApprovalMode,
    pub gas_multiplier_pct: u64,
    pub confirmation_timeout: Duration,
    pub deadline_secs: u64,
}

impl From<&TradingConfig> for ExecutorSettings {
    fn from(config: &TradingConfig) -> Self {
        Self {
            route: config.execution_route,
            approval_mode: config.approval_mode,
            gas_multiplier_pct: config.gas_multiplier_pct,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            deadline_secs: config.deadline_secs,
        }
    }
}

/// Trade Executor
///
/// 비가역 부작용이 있는 유일한 단계. 잔액 -> allowance -> 가스 추정 -> 제출 -> 확정 대기 순서.
/// 제출 이후에는 취소하지 않고 끝까지 추적해 쿨다운을 기록한다.
pub struct TradeExecutor {
    apis: ChainApis,
    session: Arc<SessionState>,
    events: EventSink,
    settings: ExecutorSettings,
}

impl TradeExecutor {
    pub fn new(apis: ChainApis, session: Arc<SessionState>, events: EventSink, settings: ExecutorSettings) -> Self {
        Self {
            apis,
            session,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// 스왑 spender (allowance 대상)
    pub fn spender(&self) -> Result<Address, ChainError> {
        match self.settings.route {
            ExecutionRoute::Router => Ok(self.apis.router.router_address()),
            ExecutionRoute::TradeContract => self.apis.trade_contract.trade_contract_address(),
        }
    }

    pub async fn execute(
        &self,
        flow_id: Uuid,
        subject: Address,
        request: &TradeRequest,
        cancel: &CancellationToken,
    ) -> Result<TxResult, TradeError> {
        let account = self.apis.wallet.account()?;

        // 1. 잔액
        let balance = self.apis.tokens.balance_of(request.token_in, account).await?;
        if balance < request.amount_in {
            return Err(TradeError::InsufficientBalance {
                token: request.token_in,
                required: request.amount_in,
                available: balance,
            });
        }

        if self.settings.route == ExecutionRoute::TradeContract {
            self.ensure_same_pool(request).await?;
        }

        // 2. allowance
        let spender = self.spender()?;
        self.ensure_allowance(flow_id, account, spender, request, cancel).await?;

        // 제출 전 마지막 취소 지점
        if cancel.is_cancelled() {
            return Err(TradeError::Cancelled);
        }

        // 3. 가스 추정
        let deadline = current_timestamp() + self.settings.deadline_secs;
        let estimate = match self.settings.route {
            ExecutionRoute::Router => {
                self.apis
                    .router
                    .estimate_exact_input_single(&self.swap_params(request, deadline))
                    .await
            }
            ExecutionRoute::TradeContract => {
                self.apis
                    .trade_contract
                    .estimate_manual_trade(&self.manual_params(request))
                    .await
            }
        }
        .map_err(|e| TradeError::EstimationFailed {
            failure: classify_execution_error(&e),
            reason: e.to_string(),
        })?;

        let gas_limit = apply_gas_multiplier(estimate, self.settings.gas_multiplier_pct);
        debug!("⛽ 가스 추정 {} -> limit {}", estimate, gas_limit);

        let gas_price = self.apis.wallet.gas_price().await?;
        let required = gas_cost_wei(gas_limit, gas_price);
        let available = self.apis.wallet.native_balance(account).await?;
        if available < required {
            warn!(
                "⛽ 가스비 부족: {} ETH 필요 ({} x {}), 보유 {} ETH",
                format_eth(required),
                gas_limit,
                format_gas_price_gwei(gas_price),
                format_eth(available)
            );
            return Err(TradeError::InsufficientGasFunds { required, available });
        }

        if cancel.is_cancelled() {
            return Err(TradeError::Cancelled);
        }

        // 4. 제출
        let submitted = match self.settings.route {
            ExecutionRoute::Router => {
                self.apis
                    .router
                    .exact_input_single(&self.swap_params(request, deadline), gas_limit)
                    .await
            }
            ExecutionRoute::TradeContract => {
                self.apis
                    .trade_contract
                    .execute_manual_trade(&self.manual_params(request), gas_limit)
                    .await
            }
        };
        let tx_hash = submitted.map_err(|e| {
            let failure = classify_execution_error(&e);
            match failure {
                ExecutionFailure::GasFunds => TradeError::InsufficientGasFunds {
                    required,
                    available,
                },
                _ => TradeError::SubmissionFailed {
                    failure,
                    reason: e.to_string(),
                },
            }
        })?;

        self.events.emit(TradeEvent::TradeSubmitted {
            flow_id,
            tx_hash,
            gas_limit,
        });

        // 5. 확정 대기 (취소 불가)
        let result = self.await_swap(tx_hash, request).await;

        // 6. 제출된 거래는 결과와 무관하게 쿨다운 대상 (revert 제외)
        match &result {
            Ok(tx) => {
                self.session.record_fire(subject, current_timestamp());
                self.events.emit(TradeEvent::TradeConfirmed {
                    flow_id,
                    tx_hash,
                    block_number: tx.block_number,
                    gas_used: tx.gas_used,
                });
            }
            Err(TradeError::ConfirmationTimeout { .. }) | Err(TradeError::Chain(_)) => {
                warn!("⏳ {} 결과 미확인 - 쿨다운을 기록합니다", tx_hash);
                self.session.record_fire(subject, current_timestamp());
            }
            Err(_) => {}
        }

        result
    }

    async fn await_swap(&self, tx_hash: TxHash, request: &TradeRequest) -> Result<TxResult, TradeError> {
        let outcome = tokio::time::timeout(self.settings.confirmation_timeout, self.apis.receipts.wait_for_receipt(tx_hash))
            .await
            .map_err(|_| TradeError::ConfirmationTimeout {
                tx_hash,
                timeout_secs: self.settings.confirmation_timeout.as_secs(),
            })??;

        let tx = TxResult {
            tx_hash,
            status: if outcome.success {
                TxStatus::Confirmed
            } else {
                TxStatus::Reverted
            },
            block_number: outcome.block_number,
            gas_used: outcome.gas_used,
            amount_in: request.amount_in,
            min_amount_out: request.min_amount_out,
        };

        match tx.status {
            TxStatus::Confirmed => {
                info!("✅ 스왑 확정: {} (block {:?})", tx_hash, tx.block_number);
                Ok(tx)
            }
            // 채굴되었지만 실패 - "미포함"과 구분
            TxStatus::Reverted => Err(TradeError::Reverted {
                tx_hash,
                reason: "receipt status 0".to_string(),
            }),
        }
    }

    /// 실행 컨트랙트가 고를 풀이 견적 풀과 같은지 확인
    async fn ensure_same_pool(&self, request: &TradeRequest) -> Result<(), TradeError> {
        let (pool, fee) = self
            .apis
            .trade_contract
            .find_best_pool(request.token_in, request.token_out)
            .await?;

        // ZERO: 컨트랙트가 풀을 찾지 못함
        if pool == Address::ZERO || pool != request.pool || fee != request.fee.as_u32() {
            return Err(Rejection::QuoteMismatch {
                reason: format!(
                    "trade contract would route through {} (fee {}), quote used {} (fee {})",
                    pool,
                    fee,
                    request.pool,
                    request.fee.as_u32()
                ),
            }
            .into());
        }
        Ok(())
    }

    async fn ensure_allowance(
        &self,
        flow_id: Uuid,
        account: Address,
        spender: Address,
        request: &TradeRequest,
        cancel: &CancellationToken,
    ) -> Result<(), TradeError> {
        let granted = self.apis.tokens.allowance(request.token_in, account, spender).await?;
        if granted >= request.amount_in {
            debug!("👍 allowance 충분: {} >= {}", granted, request.amount_in);
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(TradeError::Cancelled);
        }

        let amount = match self.settings.approval_mode {
            ApprovalMode::Exact => request.amount_in,
            ApprovalMode::Infinite => U256::MAX,
        };

        let tx_hash = self
            .apis
            .tokens
            .approve(request.token_in, spender, amount)
            .await
            .map_err(|e| TradeError::SubmissionFailed {
                failure: classify_execution_error(&e),
                reason: format!("approve: {}", e),
            })?;

        self.events.emit(TradeEvent::ApprovalSubmitted {
            flow_id,
            token: request.token_in,
            spender,
            amount,
            tx_hash,
        });

        let outcome = tokio::time::timeout(self.settings.confirmation_timeout, self.apis.receipts.wait_for_receipt(tx_hash))
            .await
            .map_err(|_| {
                warn!("⏳ approve {} 미확정", tx_hash);
                TradeError::ApprovalFailed { tx_hash }
            })??;

        if !outcome.success {
            return Err(TradeError::ApprovalFailed { tx_hash });
        }

        // 확정 후 allowance 재확인
        let granted = self.apis.tokens.allowance(request.token_in, account, spender).await?;
        if granted < request.amount_in {
            return Err(TradeError::InsufficientAllowance {
                token: request.token_in,
                spender,
                required: request.amount_in,
                granted,
            });
        }

        info!("🔓 approve 확정: {} ({})", tx_hash, amount);
        Ok(())
    }

    fn swap_params(&self, request: &TradeRequest, deadline: u64) -> SwapParams {
        SwapParams {
            token_in: request.token_in,
            token_out: request.token_out,
            fee: request.fee,
            recipient: request.recipient,
            deadline,
            amount_in: request.amount_in,
            amount_out_minimum: request.min_amount_out,
        }
    }

    fn manual_params(&self, request: &TradeRequest) -> ManualTradeParams {
        ManualTradeParams {
            token_in: request.token_in,
            token_out: request.token_out,
            amount_in: request.amount_in,
            recipient: request.recipient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{UNISWAP_V3_ROUTER, USDC};
    use crate::mocks::{MockChain, ReceiptBehavior};
    use crate::trading::validator::ValidationMode;
    use crate::types::FeeTier;

    fn tkn() -> Address {
        Address::repeat_byte(0x77)
    }

    fn request(recipient: Address) -> TradeRequest {
        TradeRequest {
            token_in: USDC,
            token_out: tkn(),
            amount_in: U256::from(100_000_000u64),
            recipient,
            min_amount_out: U256::from(38_000_000_000u64),
            fee: FeeTier::Low,
            pool: Address::repeat_byte(0x51),
        }
    }

    fn settings(route: ExecutionRoute, approval_mode: ApprovalMode) -> ExecutorSettings {
        ExecutorSettings {
            route,
            approval_mode,
            gas_multiplier_pct: 120,
            confirmation_timeout: Duration::from_secs(180),
            deadline_secs: 300,
        }
    }

    fn funded(mock: MockChain) -> MockChain {
        let account = mock.signer_address().unwrap();
        mock.with_balance(USDC, account, U256::from(1_000_000_000u64))
    }

    fn executor(mock: Arc<MockChain>, settings: ExecutorSettings) -> (TradeExecutor, Arc<SessionState>) {
        let session = Arc::new(SessionState::new(300, ValidationMode::Strict));
        let executor = TradeExecutor::new(
            ChainApis::from_backend(mock),
            session.clone(),
            EventSink::new(16),
            settings,
        );
        (executor, session)
    }

    #[tokio::test]
    async fn test_router_swap_with_exact_approval() {
        let mock = Arc::new(funded(MockChain::new()));
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let result = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, TxStatus::Confirmed);
        assert_eq!(mock.approvals(), vec![(USDC, UNISWAP_V3_ROUTER, U256::from(100_000_000u64))]);

        let swaps = mock.swaps();
        assert_eq!(swaps.len(), 1);
        let (params, gas_limit) = &swaps[0];
        assert_eq!(params.amount_out_minimum, U256::from(38_000_000_000u64));
        assert_eq!(params.fee, FeeTier::Low);
        assert_eq!(*gas_limit, 180_000); // 150_000 * 1.2
        assert!(session.last_fired_at(tkn()).is_some());
    }

    #[tokio::test]
    async fn test_existing_allowance_skips_approval() {
        let base = funded(MockChain::new());
        let account = base.signer_address().unwrap();
        let mock = Arc::new(base.with_allowance(USDC, account, UNISWAP_V3_ROUTER, U256::MAX));
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap();
        assert!(mock.approvals().is_empty());
    }

    #[tokio::test]
    async fn test_infinite_approval() {
        let mock = Arc::new(funded(MockChain::new()));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Infinite));

        executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(mock.approvals()[0].2, U256::MAX);
    }

    #[tokio::test]
    async fn test_insufficient_balance_spends_no_gas() {
        let mock = Arc::new(MockChain::new());
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::InsufficientBalance { .. }));
        assert!(mock.approvals().is_empty());
        assert_eq!(mock.call_count("estimate_exact_input_single"), 0);
        assert!(session.last_fired_at(tkn()).is_none());
    }

    #[tokio::test]
    async fn test_gas_funds_reported_distinctly() {
        let base = funded(MockChain::new());
        let account = base.signer_address().unwrap();
        let mock = Arc::new(base.with_native_balance(account, U256::from(1u64)));
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::InsufficientGasFunds { .. }));
        assert!(mock.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_mined_revert_is_not_confirmed() {
        let mock = Arc::new(funded(MockChain::new()).with_swap_receipt(ReceiptBehavior::Revert));
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Reverted { .. }));
        assert!(session.last_fired_at(tkn()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_records_cooldown() {
        let mock = Arc::new(funded(MockChain::new()).with_swap_receipt(ReceiptBehavior::Never));
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::ConfirmationTimeout { timeout_secs: 180, .. }));
        assert!(session.last_fired_at(tkn()).is_some());
    }

    #[tokio::test]
    async fn test_failed_approval_stops_flow() {
        let mock = Arc::new(funded(MockChain::new()).with_approval_receipt(ReceiptBehavior::Revert));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::ApprovalFailed { .. }));
        assert!(mock.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_trade_contract_route_checks_pool() {
        let mock = Arc::new(funded(MockChain::new()).with_best_pool(Address::repeat_byte(0x53), 3000));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::TradeContract, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::QuoteMismatch { .. })));
        assert!(mock.manual_trades().is_empty());
    }

    #[tokio::test]
    async fn test_trade_contract_without_pool_is_mismatch() {
        let mock = Arc::new(funded(MockChain::new()).with_best_pool(Address::ZERO, 500));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::TradeContract, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::QuoteMismatch { .. })));
        assert!(mock.approvals().is_empty());
        assert!(mock.manual_trades().is_empty());
    }

    #[tokio::test]
    async fn test_trade_contract_route_executes() {
        let mock = Arc::new(funded(MockChain::new()).with_best_pool(Address::repeat_byte(0x51), 500));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::TradeContract, ApprovalMode::Exact));

        executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap();

        let spender = mock.trade_contract().unwrap();
        assert_eq!(mock.approvals()[0].1, spender);
        assert_eq!(mock.manual_trades().len(), 1);
        assert!(mock.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_estimation_failure_is_classified() {
        let mock = Arc::new(funded(MockChain::new()).with_gas_estimate(Err(ChainError::Revert {
            reason: "Too little received".into(),
        })));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::EstimationFailed {
                failure: ExecutionFailure::Slippage,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_gas_funds_rejected_at_submission() {
        let mock = Arc::new(funded(MockChain::new()).with_submit_error(ChainError::Rpc {
            code: -32000,
            message: "insufficient funds for gas * price + value".into(),
        }));
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));
        let mut events = executor.events.subscribe();

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::InsufficientGasFunds { .. }));
        assert_eq!(mock.call_count("exact_input_single"), 1);
        assert!(mock.swaps().is_empty());
        assert!(session.last_fired_at(tkn()).is_none());

        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, TradeEvent::TradeSubmitted { .. }));
        }
    }

    #[tokio::test]
    async fn test_revert_at_submission_is_classified() {
        let mock = Arc::new(funded(MockChain::new()).with_submit_error(ChainError::Revert {
            reason: "revert: STF".into(),
        }));
        let account = mock.signer_address().unwrap();
        let (executor, session) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            TradeError::SubmissionFailed { failure, reason } => {
                assert_eq!(failure, ExecutionFailure::Reverted);
                assert!(reason.contains("STF"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(mock.swaps().is_empty());
        assert!(session.last_fired_at(tkn()).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_submission() {
        let mock = Arc::new(funded(MockChain::new()));
        let account = mock.signer_address().unwrap();
        let (executor, _) = executor(mock.clone(), settings(ExecutionRoute::Router, ApprovalMode::Exact));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(Uuid::new_v4(), tkn(), &request(account), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Cancelled));
        assert!(mock.swaps().is_empty());
        assert!(mock.approvals().is_empty());
    }
}
