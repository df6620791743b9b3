use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{Address, Bytes, TxHash, B256, U160, U256};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::blockchain::traits::*;
use crate::common::time::current_timestamp;
use crate::constants::{UNISWAP_V3_ROUTER, USDC};
use crate::dex::path::decode_path;
use crate::errors::ChainError;
use crate::types::{FeeTier, Prediction, ReceiptOutcome};

/// 견적 응답 방식
#[derive(Debug, Clone)]
pub enum QuoteBehavior {
    /// 입력과 무관한 고정 출력
    Fixed(U256),
    /// amount_in * numerator / denominator
    Rate { numerator: U256, denominator: U256 },
    Fail(ChainError),
}

impl QuoteBehavior {
    fn apply(&self, amount_in: U256) -> Result<U256, ChainError> {
        match self {
            QuoteBehavior::Fixed(out) => Ok(*out),
            QuoteBehavior::Rate { numerator, denominator } => Ok(amount_in * *numerator / *denominator),
            QuoteBehavior::Fail(e) => Err(e.clone()),
        }
    }
}

/// 트랜잭션 영수증 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptBehavior {
    Success,
    /// 채굴되었지만 status = 0
    Revert,
    /// 영수증이 영원히 나오지 않음
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxKind {
    Approval,
    Swap,
    Other,
}

struct MockState {
    tokens: HashMap<Address, (String, u8)>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    native: HashMap<Address, U256>,
    gas_price: u128,

    pools: HashMap<(Address, Address, FeeTier), Address>,
    pool_errors: HashMap<FeeTier, ChainError>,
    direct_quotes: HashMap<(Address, Address, FeeTier), QuoteBehavior>,
    path_quotes: HashMap<(Address, Address, FeeTier), QuoteBehavior>,

    whitelist: HashSet<Address>,
    min_trade: U256,
    best_pool: Option<(Address, u32)>,
    predictions: HashMap<Address, Result<Prediction, ChainError>>,

    swap_gas: Result<u64, ChainError>,
    submit_error: Option<ChainError>,
    approval_receipt: ReceiptBehavior,
    swap_receipt: ReceiptBehavior,
    receipts: HashMap<TxHash, TxKind>,
    nonce: u64,
    block_number: u64,

    portfolios: HashMap<Address, PortfolioInfo>,
    custody: HashMap<(Address, Address), U256>,
    auto_settings: HashMap<Address, AutoTradingSettings>,
    approved_tokens: HashSet<Address>,

    calls: Vec<String>,
    approvals: Vec<(Address, Address, U256)>,
    swaps: Vec<(SwapParams, u64)>,
    manual_trades: Vec<(ManualTradeParams, u64)>,
}

/// 메모리 기반 체인. 모든 협력자 인터페이스를 구현한다.
pub struct MockChain {
    state: Mutex<MockState>,
    chain_id: u64,
    account: Option<Address>,
    router: Address,
    trade_contract: Option<Address>,
    portfolio: Option<Address>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        let account = Address::repeat_byte(0xAA);
        let mut native = HashMap::new();
        native.insert(account, U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64)));

        Self {
            state: Mutex::new(MockState {
                tokens: HashMap::new(),
                balances: HashMap::new(),
                allowances: HashMap::new(),
                native,
                gas_price: 20_000_000_000,
                pools: HashMap::new(),
                pool_errors: HashMap::new(),
                direct_quotes: HashMap::new(),
                path_quotes: HashMap::new(),
                whitelist: HashSet::new(),
                min_trade: U256::ZERO,
                best_pool: None,
                predictions: HashMap::new(),
                swap_gas: Ok(150_000),
                submit_error: None,
                approval_receipt: ReceiptBehavior::Success,
                swap_receipt: ReceiptBehavior::Success,
                receipts: HashMap::new(),
                nonce: 0,
                block_number: 18_000_000,
                portfolios: HashMap::new(),
                custody: HashMap::new(),
                auto_settings: HashMap::new(),
                approved_tokens: HashSet::new(),
                calls: Vec::new(),
                approvals: Vec::new(),
                swaps: Vec::new(),
                manual_trades: Vec::new(),
            }),
            chain_id: 1,
            account: Some(account),
            router: UNISWAP_V3_ROUTER,
            trade_contract: Some(Address::repeat_byte(0x7E)),
            portfolio: Some(Address::repeat_byte(0x9F)),
        }
    }

    /// 락 poison은 무시 (테스트 패닉이 다른 테스트로 번지지 않도록)
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: &str) {
        self.state().calls.push(call.to_string());
    }

    fn next_tx(state: &mut MockState, kind: TxKind) -> TxHash {
        state.nonce += 1;
        let hash = B256::left_padding_from(&state.nonce.to_be_bytes());
        state.receipts.insert(hash, kind);
        hash
    }

    fn signer(&self) -> Result<Address, ChainError> {
        self.account.ok_or(ChainError::NoSigner)
    }

    fn revert(reason: &str) -> ChainError {
        ChainError::Revert {
            reason: reason.to_string(),
        }
    }

    // ---- 설정 (builder) ----

    pub fn without_signer(mut self) -> Self {
        self.account = None;
        self
    }

    pub fn without_trade_contract(mut self) -> Self {
        self.trade_contract = None;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_token(self, token: Address, symbol: &str, decimals: u8) -> Self {
        self.state().tokens.insert(token, (symbol.to_string(), decimals));
        self
    }

    pub fn with_balance(self, token: Address, owner: Address, amount: U256) -> Self {
        self.set_balance(token, owner, amount);
        self
    }

    pub fn with_native_balance(self, owner: Address, amount: U256) -> Self {
        self.state().native.insert(owner, amount);
        self
    }

    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.state().gas_price = gas_price;
        self
    }

    /// 풀 등록. `liquidity`는 풀이 보유한 각 토큰 잔액
    pub fn with_pool(
        self,
        token_a: Address,
        token_b: Address,
        fee: FeeTier,
        pool: Address,
        liquidity_a: U256,
        liquidity_b: U256,
    ) -> Self {
        {
            let mut state = self.state();
            state.pools.insert(pool_key(token_a, token_b, fee), pool);
            state.balances.insert((token_a, pool), liquidity_a);
            state.balances.insert((token_b, pool), liquidity_b);
        }
        self
    }

    pub fn with_factory_error(self, fee: FeeTier, error: ChainError) -> Self {
        self.state().pool_errors.insert(fee, error);
        self
    }

    pub fn with_direct_quote(self, token_in: Address, token_out: Address, fee: FeeTier, behavior: QuoteBehavior) -> Self {
        self.set_direct_quote(token_in, token_out, fee, behavior);
        self
    }

    pub fn with_path_quote(self, token_in: Address, token_out: Address, fee: FeeTier, behavior: QuoteBehavior) -> Self {
        self.state().path_quotes.insert((token_in, token_out, fee), behavior);
        self
    }

    pub fn with_whitelisted(self, tokens: &[Address]) -> Self {
        self.state().whitelist.extend(tokens.iter().copied());
        self
    }

    pub fn with_min_trade_amount(self, amount: U256) -> Self {
        self.state().min_trade = amount;
        self
    }

    pub fn with_best_pool(self, pool: Address, fee: u32) -> Self {
        self.state().best_pool = Some((pool, fee));
        self
    }

    pub fn with_prediction(self, token: Address, prediction: Prediction) -> Self {
        self.set_prediction(token, prediction);
        self
    }

    pub fn with_prediction_error(self, token: Address, error: ChainError) -> Self {
        self.state().predictions.insert(token, Err(error));
        self
    }

    pub fn with_gas_estimate(self, estimate: Result<u64, ChainError>) -> Self {
        self.state().swap_gas = estimate;
        self
    }

    pub fn with_submit_error(self, error: ChainError) -> Self {
        self.state().submit_error = Some(error);
        self
    }

    pub fn with_approval_receipt(self, behavior: ReceiptBehavior) -> Self {
        self.state().approval_receipt = behavior;
        self
    }

    pub fn with_swap_receipt(self, behavior: ReceiptBehavior) -> Self {
        self.state().swap_receipt = behavior;
        self
    }

    pub fn with_approved_portfolio_token(self, token: Address) -> Self {
        self.state().approved_tokens.insert(token);
        self
    }

    pub fn with_allowance(self, token: Address, owner: Address, spender: Address, amount: U256) -> Self {
        self.state().allowances.insert((token, owner, spender), amount);
        self
    }

    // ---- 런타임 변경 ----

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().balances.insert((token, owner), amount);
    }

    pub fn set_direct_quote(&self, token_in: Address, token_out: Address, fee: FeeTier, behavior: QuoteBehavior) {
        self.state().direct_quotes.insert((token_in, token_out, fee), behavior);
    }

    pub fn set_prediction(&self, token: Address, prediction: Prediction) {
        self.state().predictions.insert(token, Ok(prediction));
    }

    pub fn set_swap_receipt(&self, behavior: ReceiptBehavior) {
        self.state().swap_receipt = behavior;
    }

    // ---- 검증용 조회 ----

    pub fn signer_address(&self) -> Option<Address> {
        self.account
    }

    pub fn trade_contract(&self) -> Option<Address> {
        self.trade_contract
    }

    pub fn portfolio_contract(&self) -> Option<Address> {
        self.portfolio
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == call).count()
    }

    /// (token, spender, amount)
    pub fn approvals(&self) -> Vec<(Address, Address, U256)> {
        self.state().approvals.clone()
    }

    /// (params, gas_limit)
    pub fn swaps(&self) -> Vec<(SwapParams, u64)> {
        self.state().swaps.clone()
    }

    pub fn manual_trades(&self) -> Vec<(ManualTradeParams, u64)> {
        self.state().manual_trades.clone()
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.state().balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    pub fn custody_balance(&self, user: Address, token: Address) -> U256 {
        self.state().custody.get(&(user, token)).copied().unwrap_or_default()
    }

    /// CLI `--mock` 모드용 시나리오: USDC -> TKN, 0.05% 풀 하나 + 미초기화 0.3% 풀
    pub fn demo() -> Self {
        let tkn = demo_token();
        let account = Address::repeat_byte(0xAA);
        let usdc_unit = U256::from(1_000_000u64);
        let tkn_unit = U256::from(10u64).pow(U256::from(18u64));
        let now = current_timestamp();

        info!("🎭 [MOCK] 데모 체인 초기화 (USDC -> TKN)");

        MockChain::new()
            .with_token(USDC, "USDC", 6)
            .with_token(tkn, "TKN", 18)
            .with_balance(USDC, account, U256::from(10_000u64) * usdc_unit)
            .with_pool(
                USDC,
                tkn,
                FeeTier::Low,
                Address::repeat_byte(0x51),
                U256::from(5_000_000u64) * usdc_unit,
                U256::from(2_000u64) * tkn_unit,
            )
            .with_pool(
                USDC,
                tkn,
                FeeTier::Medium,
                Address::repeat_byte(0x53),
                U256::from(1_000u64) * usdc_unit,
                U256::ZERO,
            )
            .with_direct_quote(
                USDC,
                tkn,
                FeeTier::Low,
                QuoteBehavior::Rate {
                    numerator: U256::from(400u64),
                    denominator: U256::from(1u64),
                },
            )
            .with_direct_quote(USDC, tkn, FeeTier::Medium, QuoteBehavior::Fail(Self::revert("Unexpected error")))
            .with_path_quote(USDC, tkn, FeeTier::Medium, QuoteBehavior::Fail(Self::revert("Unexpected error")))
            .with_whitelisted(&[USDC, tkn])
            .with_min_trade_amount(usdc_unit)
            .with_best_pool(Address::repeat_byte(0x51), FeeTier::Low.as_u32())
            .with_prediction(
                tkn,
                Prediction {
                    confidence: 85,
                    price_direction: 1,
                    is_honeypot: false,
                    risk_score: 15,
                    timestamp: now,
                },
            )
            .with_approved_portfolio_token(USDC)
    }
}

/// 데모 시나리오의 TKN 주소
pub fn demo_token() -> Address {
    Address::repeat_byte(0x77)
}

fn pool_key(token_a: Address, token_b: Address, fee: FeeTier) -> (Address, Address, FeeTier) {
    if token_a < token_b {
        (token_a, token_b, fee)
    } else {
        (token_b, token_a, fee)
    }
}

#[async_trait]
impl WalletApi for MockChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.record("chain_id");
        Ok(self.chain_id)
    }

    fn account(&self) -> Result<Address, ChainError> {
        self.signer()
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("native_balance".to_string());
        Ok(state.native.get(&account).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let mut state = self.state();
        state.calls.push("gas_price".to_string());
        Ok(state.gas_price)
    }
}

#[async_trait]
impl TokenApi for MockChain {
    async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        let mut state = self.state();
        state.calls.push("decimals".to_string());
        state
            .tokens
            .get(&token)
            .map(|(_, decimals)| *decimals)
            .ok_or_else(|| Self::revert("call to non-contract"))
    }

    async fn symbol(&self, token: Address) -> Result<String, ChainError> {
        let mut state = self.state();
        state.calls.push("symbol".to_string());
        state
            .tokens
            .get(&token)
            .map(|(symbol, _)| symbol.clone())
            .ok_or_else(|| Self::revert("call to non-contract"))
    }

    async fn name(&self, token: Address) -> Result<String, ChainError> {
        let mut state = self.state();
        state.calls.push("name".to_string());
        state
            .tokens
            .get(&token)
            .map(|(symbol, _)| format!("{} Token", symbol))
            .ok_or_else(|| Self::revert("call to non-contract"))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("balance_of".to_string());
        Ok(state.balances.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("allowance".to_string());
        Ok(state.allowances.get(&(token, owner, spender)).copied().unwrap_or_default())
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("approve".to_string());
        state.approvals.push((token, spender, amount));
        if state.approval_receipt == ReceiptBehavior::Success {
            state.allowances.insert((token, owner, spender), amount);
        }
        let hash = Self::next_tx(&mut state, TxKind::Approval);
        debug!("🎭 [MOCK] approve {} -> {} : {}", token, spender, amount);
        Ok(hash)
    }
}

#[async_trait]
impl PoolFactoryApi for MockChain {
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError> {
        let mut state = self.state();
        state.calls.push("get_pool".to_string());
        if let Some(error) = state.pool_errors.get(&fee) {
            return Err(error.clone());
        }
        Ok(state.pools.get(&pool_key(token_a, token_b, fee)).copied().unwrap_or(Address::ZERO))
    }
}

#[async_trait]
impl QuoterApi for MockChain {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
        _sqrt_price_limit_x96: U160,
    ) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("quote_exact_input_single".to_string());
        match state.direct_quotes.get(&(token_in, token_out, fee)) {
            Some(behavior) => behavior.apply(amount_in),
            None => Err(Self::revert("Unexpected error")),
        }
    }

    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("quote_exact_input".to_string());
        let (tokens, fees) = decode_path(&path).map_err(|e| ChainError::Revert { reason: e.to_string() })?;
        if tokens.len() != 2 {
            return Err(Self::revert("multi-hop paths are not simulated"));
        }
        match state.path_quotes.get(&(tokens[0], tokens[1], fees[0])) {
            Some(behavior) => behavior.apply(amount_in),
            None => Err(Self::revert("Unexpected error")),
        }
    }
}

#[async_trait]
impl SwapRouterApi for MockChain {
    fn router_address(&self) -> Address {
        self.router
    }

    async fn estimate_exact_input_single(&self, _params: &SwapParams) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.calls.push("estimate_exact_input_single".to_string());
        state.swap_gas.clone()
    }

    async fn exact_input_single(&self, params: &SwapParams, gas_limit: u64) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("exact_input_single".to_string());
        if let Some(error) = state.submit_error.clone() {
            return Err(error);
        }
        state.swaps.push((params.clone(), gas_limit));

        if state.swap_receipt == ReceiptBehavior::Success {
            let paid = state.balances.get(&(params.token_in, owner)).copied().unwrap_or_default();
            state.balances.insert((params.token_in, owner), paid.saturating_sub(params.amount_in));
            let received = state.balances.get(&(params.token_out, params.recipient)).copied().unwrap_or_default();
            state
                .balances
                .insert((params.token_out, params.recipient), received + params.amount_out_minimum);
        }

        Ok(Self::next_tx(&mut state, TxKind::Swap))
    }
}

#[async_trait]
impl TradeContractApi for MockChain {
    fn trade_contract_address(&self) -> Result<Address, ChainError> {
        self.trade_contract.ok_or(ChainError::NotConfigured("trade executor"))
    }

    async fn is_whitelisted(&self, token: Address) -> Result<bool, ChainError> {
        self.trade_contract_address()?;
        let mut state = self.state();
        state.calls.push("is_whitelisted".to_string());
        Ok(state.whitelist.contains(&token))
    }

    async fn find_best_pool(&self, _token_in: Address, _token_out: Address) -> Result<(Address, u32), ChainError> {
        self.trade_contract_address()?;
        let mut state = self.state();
        state.calls.push("find_best_pool".to_string());
        state.best_pool.ok_or_else(|| Self::revert("No pool found"))
    }

    async fn min_trade_amount(&self) -> Result<U256, ChainError> {
        self.trade_contract_address()?;
        let mut state = self.state();
        state.calls.push("min_trade_amount".to_string());
        Ok(state.min_trade)
    }

    async fn estimate_manual_trade(&self, _params: &ManualTradeParams) -> Result<u64, ChainError> {
        self.trade_contract_address()?;
        let mut state = self.state();
        state.calls.push("estimate_manual_trade".to_string());
        state.swap_gas.clone()
    }

    async fn execute_manual_trade(&self, params: &ManualTradeParams, gas_limit: u64) -> Result<TxHash, ChainError> {
        self.trade_contract_address()?;
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("execute_manual_trade".to_string());
        if let Some(error) = state.submit_error.clone() {
            return Err(error);
        }
        state.manual_trades.push((params.clone(), gas_limit));

        if state.swap_receipt == ReceiptBehavior::Success {
            let paid = state.balances.get(&(params.token_in, owner)).copied().unwrap_or_default();
            state.balances.insert((params.token_in, owner), paid.saturating_sub(params.amount_in));
        }

        Ok(Self::next_tx(&mut state, TxKind::Swap))
    }
}

#[async_trait]
impl OracleApi for MockChain {
    async fn get_prediction(&self, token: Address) -> Result<Prediction, ChainError> {
        let mut state = self.state();
        state.calls.push("get_prediction".to_string());
        state
            .predictions
            .get(&token)
            .cloned()
            .unwrap_or_else(|| Err(Self::revert("No prediction available")))
    }
}

#[async_trait]
impl PortfolioApi for MockChain {
    fn portfolio_address(&self) -> Result<Address, ChainError> {
        self.portfolio.ok_or(ChainError::NotConfigured("portfolio"))
    }

    async fn create_portfolio(&self, risk_level: u8) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("create_portfolio".to_string());
        if state.portfolios.get(&owner).map(|p| p.is_active).unwrap_or(false) {
            return Err(Self::revert("Portfolio already exists"));
        }
        state.portfolios.insert(
            owner,
            PortfolioInfo {
                total_value: U256::ZERO,
                risk_level,
                is_active: true,
                created_at: current_timestamp(),
            },
        );
        Ok(Self::next_tx(&mut state, TxKind::Other))
    }

    async fn deposit(&self, token: Address, amount: U256) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let manager = self.portfolio_address()?;
        let mut state = self.state();
        state.calls.push("deposit".to_string());

        if !state.approved_tokens.contains(&token) {
            return Err(Self::revert("Token not approved"));
        }
        let allowance = state.allowances.get(&(token, owner, manager)).copied().unwrap_or_default();
        if allowance < amount {
            return Err(Self::revert("ERC20: insufficient allowance"));
        }
        let balance = state.balances.get(&(token, owner)).copied().unwrap_or_default();
        if balance < amount {
            return Err(Self::revert("ERC20: transfer amount exceeds balance"));
        }

        state.allowances.insert((token, owner, manager), allowance - amount);
        state.balances.insert((token, owner), balance - amount);
        *state.custody.entry((owner, token)).or_default() += amount;
        if let Some(portfolio) = state.portfolios.get_mut(&owner) {
            portfolio.total_value += amount;
        }
        Ok(Self::next_tx(&mut state, TxKind::Other))
    }

    async fn withdraw(&self, token: Address, amount: U256) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("withdraw".to_string());

        let held = state.custody.get(&(owner, token)).copied().unwrap_or_default();
        if held < amount {
            return Err(Self::revert("Insufficient balance"));
        }
        state.custody.insert((owner, token), held - amount);
        *state.balances.entry((token, owner)).or_default() += amount;
        if let Some(portfolio) = state.portfolios.get_mut(&owner) {
            portfolio.total_value = portfolio.total_value.saturating_sub(amount);
        }
        Ok(Self::next_tx(&mut state, TxKind::Other))
    }

    async fn user_portfolio(&self, user: Address) -> Result<PortfolioInfo, ChainError> {
        let mut state = self.state();
        state.calls.push("user_portfolio".to_string());
        Ok(state.portfolios.get(&user).cloned().unwrap_or_default())
    }

    async fn token_balance(&self, user: Address, token: Address) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls.push("token_balance".to_string());
        Ok(state.custody.get(&(user, token)).copied().unwrap_or_default())
    }

    async fn update_auto_trading(&self, settings: &AutoTradingSettings) -> Result<TxHash, ChainError> {
        let owner = self.signer()?;
        let mut state = self.state();
        state.calls.push("update_auto_trading".to_string());
        if !state.portfolios.get(&owner).map(|p| p.is_active).unwrap_or(false) {
            return Err(Self::revert("No active portfolio"));
        }
        state.auto_settings.insert(owner, settings.clone());
        Ok(Self::next_tx(&mut state, TxKind::Other))
    }

    async fn auto_trading_settings(&self, user: Address) -> Result<AutoTradingSettings, ChainError> {
        let mut state = self.state();
        state.calls.push("auto_trading_settings".to_string());
        Ok(state.auto_settings.get(&user).cloned().unwrap_or_default())
    }

    async fn is_approved_token(&self, token: Address) -> Result<bool, ChainError> {
        let mut state = self.state();
        state.calls.push("is_approved_token".to_string());
        Ok(state.approved_tokens.contains(&token))
    }

    async fn add_token(&self, token: Address) -> Result<TxHash, ChainError> {
        self.signer()?;
        let mut state = self.state();
        state.calls.push("add_token".to_string());
        state.approved_tokens.insert(token);
        Ok(Self::next_tx(&mut state, TxKind::Other))
    }
}

#[async_trait]
impl ReceiptApi for MockChain {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<ReceiptOutcome, ChainError> {
        let behavior = {
            let mut state = self.state();
            state.calls.push("wait_for_receipt".to_string());
            let kind = state.receipts.get(&tx_hash).copied().ok_or_else(|| ChainError::Rpc {
                code: -32000,
                message: "transaction not found".to_string(),
            })?;
            match kind {
                TxKind::Approval => state.approval_receipt,
                TxKind::Swap => state.swap_receipt,
                TxKind::Other => ReceiptBehavior::Success,
            }
        };

        if behavior == ReceiptBehavior::Never {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        state.block_number += 1;
        Ok(ReceiptOutcome {
            tx_hash,
            success: behavior == ReceiptBehavior::Success,
            block_number: Some(state.block_number),
            gas_used: 120_000,
        })
    }
}
