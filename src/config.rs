use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::validation::is_valid_score;
use crate::constants::*;
use crate::trading::validator::ValidationMode;
use crate::types::{FeeTier, TradeSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    /// 읽기 호출 타임아웃 (밀리초)
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// 환경 변수 PRIVATE_KEY로 덮어쓸 수 있음
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub keystore_path: Option<String>,
    #[serde(skip)]
    pub keystore_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(default = "default_factory")]
    pub factory: Address,
    #[serde(default = "default_quoter")]
    pub quoter: Address,
    #[serde(default = "default_router")]
    pub swap_router: Address,
    /// executeManualTrade / whitelistedTokens / findBestPool / MIN_TRADE_AMOUNT
    #[serde(default)]
    pub trade_executor: Option<Address>,
    #[serde(default)]
    pub portfolio: Option<Address>,
    #[serde(default)]
    pub oracle: Option<Address>,
}

/// 스왑 제출 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionRoute {
    /// DEX 라우터 exactInputSingle (minAmountOut 보장)
    Router,
    /// 거래 실행 컨트랙트 executeManualTrade
    TradeContract,
}

/// ERC-20 승인 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Exact,
    Infinite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// 선호 순서대로 나열된 fee tier
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<FeeTier>,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_gas_multiplier_pct")]
    pub gas_multiplier_pct: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_quote_cache_ttl_secs")]
    pub quote_cache_ttl_secs: u64,
    #[serde(default = "default_max_prediction_age_secs")]
    pub max_prediction_age_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_execution_route")]
    pub execution_route: ExecutionRoute,
    #[serde(default = "default_approval_mode")]
    pub approval_mode: ApprovalMode,
    #[serde(default = "default_validation_mode")]
    pub validation_mode: ValidationMode,
    #[serde(default = "default_auto_trade_interval_secs")]
    pub auto_trade_interval_secs: u64,
    /// 자동 거래 시 지불 토큰 (심볼 또는 주소)
    pub base_token: String,
    /// 비어 있으면 서명 계정
    #[serde(default)]
    pub recipient: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    /// 지정하면 체인 조회 대신 사용
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// 자동 거래 대상 토큰과 초기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// 심볼 또는 주소
    pub token: String,
    #[serde(default)]
    pub enabled: bool,
    pub min_confidence: u8,
    pub max_risk_score: u8,
    pub trade_amount: String,
}

impl WatchConfig {
    pub fn to_settings(&self) -> TradeSettings {
        TradeSettings {
            enabled: self.enabled,
            min_confidence: self.min_confidence,
            max_risk_score: self.max_risk_score,
            trade_amount: self.trade_amount.clone(),
            last_fired_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    /// 이벤트 채널 버퍼 크기
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl MonitoringConfig {
    /// tracing 필터 지시어: CLI 플래그 > RUST_LOG > 설정 값 > info
    pub fn log_directive(&self, flag: Option<&str>, rust_log: Option<&str>) -> String {
        [flag, rust_log, Some(self.log_level.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|level| !level.is_empty())
            .unwrap_or("info")
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub contracts: ContractConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub tokens: HashMap<String, TokenConfig>, // symbol -> token
    #[serde(default)]
    pub watchlist: Vec<WatchConfig>,
    pub monitoring: MonitoringConfig,
}

// 기본값 함수들
fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_factory() -> Address {
    UNISWAP_V3_FACTORY
}

fn default_quoter() -> Address {
    UNISWAP_V3_QUOTER
}

fn default_router() -> Address {
    UNISWAP_V3_ROUTER
}

fn default_fee_tiers() -> Vec<FeeTier> {
    FEE_TIER_PREFERENCE.to_vec()
}

fn default_slippage_bps() -> u32 {
    DEFAULT_SLIPPAGE_BPS
}

fn default_gas_multiplier_pct() -> u64 {
    DEFAULT_GAS_MULTIPLIER_PCT
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_quote_cache_ttl_secs() -> u64 {
    DEFAULT_QUOTE_CACHE_TTL_SECS
}

fn default_max_prediction_age_secs() -> u64 {
    DEFAULT_MAX_PREDICTION_AGE_SECS
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

fn default_execution_route() -> ExecutionRoute {
    ExecutionRoute::Router
}

fn default_approval_mode() -> ApprovalMode {
    ApprovalMode::Exact
}

fn default_validation_mode() -> ValidationMode {
    ValidationMode::Strict
}

fn default_auto_trade_interval_secs() -> u64 {
    DEFAULT_AUTO_TRADE_INTERVAL_SECS
}

fn default_event_buffer() -> usize {
    256
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("설정 파일을 읽을 수 없습니다: {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("설정 파일 파싱 실패")?;
        Ok(config)
    }

    /// 환경 변수에서 민감한 정보 로드
    pub fn apply_env_overrides(&mut self) {
        if let Ok(private_key) = env::var("PRIVATE_KEY") {
            self.network.private_key = Some(private_key);
            info!("🔑 Private key loaded from environment");
        }

        if let Ok(rpc_url) = env::var("RPC_URL") {
            self.network.rpc_url = rpc_url;
            info!("🌐 RPC URL loaded from environment");
        }

        if let Ok(ws_url) = env::var("WS_URL") {
            self.network.ws_url = Some(ws_url);
            info!("🔌 WebSocket URL loaded from environment");
        }

        if let Ok(keystore_path) = env::var("KEYSTORE_PATH") {
            self.network.keystore_path = Some(keystore_path);
            info!("🗝️ Keystore path loaded from environment");
        }

        if let Ok(password) = env::var("KEYSTORE_PASSWORD") {
            self.network.keystore_password = Some(password);
        }
    }

    /// 심볼 또는 주소 문자열을 토큰 주소로 해석
    pub fn resolve_token(&self, symbol_or_address: &str) -> Result<Address> {
        if let Some(token) = self
            .tokens
            .iter()
            .find(|(symbol, _)| symbol.eq_ignore_ascii_case(symbol_or_address))
            .map(|(_, token)| token.address)
        {
            return Ok(token);
        }

        if let Some(address) = get_token_address(symbol_or_address) {
            return Ok(address);
        }

        Address::from_str(symbol_or_address)
            .map_err(|_| anyhow!("알 수 없는 토큰: {}", symbol_or_address))
    }

    /// 설정에 고정된 decimals (주소 기준)
    pub fn configured_decimals(&self) -> HashMap<Address, (String, u8)> {
        self.tokens
            .iter()
            .filter_map(|(symbol, token)| token.decimals.map(|d| (token.address, (symbol.clone(), d))))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            return Err(anyhow!("Network RPC URL cannot be empty"));
        }

        if self.network.rpc_timeout_ms == 0 {
            return Err(anyhow!("RPC timeout must be greater than 0"));
        }

        if self.trading.fee_tiers.is_empty() {
            return Err(anyhow!("At least one fee tier must be configured"));
        }

        for (i, tier) in self.trading.fee_tiers.iter().enumerate() {
            if self.trading.fee_tiers[..i].contains(tier) {
                return Err(anyhow!("Duplicate fee tier: {}", tier));
            }
        }

        if self.trading.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(anyhow!(
                "Slippage {} bps exceeds the maximum of {} bps",
                self.trading.slippage_bps,
                MAX_SLIPPAGE_BPS
            ));
        }

        if self.trading.gas_multiplier_pct < MIN_GAS_MULTIPLIER_PCT {
            return Err(anyhow!("Gas multiplier must be at least 100%"));
        }

        if self.trading.confirmation_timeout_secs == 0 {
            return Err(anyhow!("Confirmation timeout must be greater than 0"));
        }

        if self.trading.auto_trade_interval_secs == 0 {
            return Err(anyhow!("Auto trade interval must be greater than 0"));
        }

        // whitelist / MIN_TRADE_AMOUNT 조회에 필요
        if self.contracts.trade_executor.is_none() {
            return Err(anyhow!("contracts.trade_executor must be configured"));
        }

        self.resolve_token(&self.trading.base_token)
            .context("trading.base_token")?;

        for watch in &self.watchlist {
            self.resolve_token(&watch.token)
                .with_context(|| format!("watchlist token {}", watch.token))?;
            if !is_valid_score(watch.min_confidence) || !is_valid_score(watch.max_risk_score) {
                return Err(anyhow!("Watchlist thresholds for {} must be within 0-100", watch.token));
            }
        }

        Ok(())
    }

    pub fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: 1,
                name: "mainnet".to_string(),
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY".to_string(),
                ws_url: None,
                rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
                private_key: None,
                keystore_path: None,
                keystore_password: None,
            },
            contracts: ContractConfig {
                factory: UNISWAP_V3_FACTORY,
                quoter: UNISWAP_V3_QUOTER,
                swap_router: UNISWAP_V3_ROUTER,
                trade_executor: None,
                portfolio: None,
                oracle: None,
            },
            trading: TradingConfig {
                fee_tiers: default_fee_tiers(),
                slippage_bps: DEFAULT_SLIPPAGE_BPS,
                gas_multiplier_pct: DEFAULT_GAS_MULTIPLIER_PCT,
                cooldown_secs: DEFAULT_COOLDOWN_SECS,
                quote_cache_ttl_secs: DEFAULT_QUOTE_CACHE_TTL_SECS,
                max_prediction_age_secs: DEFAULT_MAX_PREDICTION_AGE_SECS,
                confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
                deadline_secs: DEFAULT_DEADLINE_SECS,
                execution_route: ExecutionRoute::Router,
                approval_mode: ApprovalMode::Exact,
                validation_mode: ValidationMode::Strict,
                auto_trade_interval_secs: DEFAULT_AUTO_TRADE_INTERVAL_SECS,
                base_token: "USDC".to_string(),
                recipient: None,
            },
            tokens: HashMap::new(),
            watchlist: vec![],
            monitoring: MonitoringConfig {
                log_level: "info".to_string(),
                event_buffer: default_event_buffer(),
            },
        }
    }
}
