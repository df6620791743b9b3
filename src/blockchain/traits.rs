//! 체인 협력자 인터페이스
//!
//! 엔진은 지갑, 토큰, DEX, 거래 실행/포트폴리오/오라클 컨트랙트를 요청/응답
//! 호출로만 다룬다. 실제 구현은 [`BlockchainClient`](super::BlockchainClient),
//! 테스트와 `--mock` 모드는 [`MockChain`](crate::mocks::MockChain)이 담당한다.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U160, U256};
use async_trait::async_trait;

use crate::errors::ChainError;
use crate::types::{FeeTier, Prediction, ReceiptOutcome};

/// DEX 라우터 exactInputSingle 파라미터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: FeeTier,
    pub recipient: Address,
    pub deadline: u64,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
}

/// 거래 실행 컨트랙트 executeManualTrade 파라미터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualTradeParams {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub recipient: Address,
}

/// userPortfolios(address) 결과
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortfolioInfo {
    pub total_value: U256,
    pub risk_level: u8,
    pub is_active: bool,
    pub created_at: u64,
}

/// 온체인에 저장되는 자동 거래 설정
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoTradingSettings {
    pub enabled: bool,
    pub min_confidence: u8,
    pub max_risk_score: u8,
    pub trade_amount: U256,
}

#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// 서명 계정. 서명자가 없으면 `ChainError::NoSigner`
    fn account(&self) -> Result<Address, ChainError>;

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;
}

#[async_trait]
pub trait TokenApi: Send + Sync {
    async fn decimals(&self, token: Address) -> Result<u8, ChainError>;
    async fn symbol(&self, token: Address) -> Result<String, ChainError>;
    async fn name(&self, token: Address) -> Result<String, ChainError>;
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError>;
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash, ChainError>;
}

#[async_trait]
pub trait PoolFactoryApi: Send + Sync {
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError>;
}

#[async_trait]
pub trait QuoterApi: Send + Sync {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
        sqrt_price_limit_x96: U160,
    ) -> Result<U256, ChainError>;

    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, ChainError>;
}

#[async_trait]
pub trait SwapRouterApi: Send + Sync {
    fn router_address(&self) -> Address;
    async fn estimate_exact_input_single(&self, params: &SwapParams) -> Result<u64, ChainError>;
    async fn exact_input_single(&self, params: &SwapParams, gas_limit: u64) -> Result<TxHash, ChainError>;
}

#[async_trait]
pub trait TradeContractApi: Send + Sync {
    fn trade_contract_address(&self) -> Result<Address, ChainError>;
    async fn is_whitelisted(&self, token: Address) -> Result<bool, ChainError>;
    async fn find_best_pool(&self, token_in: Address, token_out: Address) -> Result<(Address, u32), ChainError>;
    async fn min_trade_amount(&self) -> Result<U256, ChainError>;
    async fn estimate_manual_trade(&self, params: &ManualTradeParams) -> Result<u64, ChainError>;
    async fn execute_manual_trade(&self, params: &ManualTradeParams, gas_limit: u64) -> Result<TxHash, ChainError>;
}

#[async_trait]
pub trait OracleApi: Send + Sync {
    async fn get_prediction(&self, token: Address) -> Result<Prediction, ChainError>;
}

#[async_trait]
pub trait PortfolioApi: Send + Sync {
    fn portfolio_address(&self) -> Result<Address, ChainError>;
    async fn create_portfolio(&self, risk_level: u8) -> Result<TxHash, ChainError>;
    async fn deposit(&self, token: Address, amount: U256) -> Result<TxHash, ChainError>;
    async fn withdraw(&self, token: Address, amount: U256) -> Result<TxHash, ChainError>;
    async fn user_portfolio(&self, user: Address) -> Result<PortfolioInfo, ChainError>;
    async fn token_balance(&self, user: Address, token: Address) -> Result<U256, ChainError>;
    async fn update_auto_trading(&self, settings: &AutoTradingSettings) -> Result<TxHash, ChainError>;
    async fn auto_trading_settings(&self, user: Address) -> Result<AutoTradingSettings, ChainError>;
    async fn is_approved_token(&self, token: Address) -> Result<bool, ChainError>;
    async fn add_token(&self, token: Address) -> Result<TxHash, ChainError>;
}

#[async_trait]
pub trait ReceiptApi: Send + Sync {
    /// 영수증이 나올 때까지 대기. 상한 시간은 호출자가 건다.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<ReceiptOutcome, ChainError>;
}

/// 모든 협력자 인터페이스를 구현하는 체인 백엔드
pub trait ChainBackend:
    WalletApi
    + TokenApi
    + PoolFactoryApi
    + QuoterApi
    + SwapRouterApi
    + TradeContractApi
    + OracleApi
    + PortfolioApi
    + ReceiptApi
    + 'static
{
}

impl<T> ChainBackend for T where
    T: WalletApi
        + TokenApi
        + PoolFactoryApi
        + QuoterApi
        + SwapRouterApi
        + TradeContractApi
        + OracleApi
        + PortfolioApi
        + ReceiptApi
        + 'static
{
}

/// 협력자 핸들 묶음
#[derive(Clone)]
pub struct ChainApis {
    pub wallet: Arc<dyn WalletApi>,
    pub tokens: Arc<dyn TokenApi>,
    pub factory: Arc<dyn PoolFactoryApi>,
    pub quoter: Arc<dyn QuoterApi>,
    pub router: Arc<dyn SwapRouterApi>,
    pub trade_contract: Arc<dyn TradeContractApi>,
    pub oracle: Arc<dyn OracleApi>,
    pub portfolio: Arc<dyn PortfolioApi>,
    pub receipts: Arc<dyn ReceiptApi>,
}

impl ChainApis {
    pub fn from_backend<B: ChainBackend>(backend: Arc<B>) -> Self {
        Self {
            wallet: backend.clone(),
            tokens: backend.clone(),
            factory: backend.clone(),
            quoter: backend.clone(),
            router: backend.clone(),
            trade_contract: backend.clone(),
            oracle: backend.clone(),
            portfolio: backend.clone(),
            receipts: backend,
        }
    }
}
