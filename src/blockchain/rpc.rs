use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, Bytes, TxHash, U160, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::abi::{map_contract_error, map_transport_error};
use super::contracts::{
    IAIOracle, IERC20, IPortfolioManager, IQuoter, ISwapRouter, ITradeExecutor, IUniswapV3Factory,
};
use super::traits::*;
use crate::config::{ContractConfig, NetworkConfig};
use crate::constants::{MAX_SCORE, RECEIPT_POLL_INTERVAL_MS};
use crate::errors::ChainError;
use crate::types::{FeeTier, Prediction, ReceiptOutcome};

/// 블록체인 RPC 클라이언트
/// 모든 체인 협력자 인터페이스를 하나의 alloy provider 위에 구현한다.
pub struct BlockchainClient {
    provider: DynProvider,
    /// 트랜잭션 서명 계정 (읽기 전용 모드면 None)
    signer_address: Option<Address>,
    chain_id: u64,
    contracts: ContractConfig,
    /// 읽기 호출 상한 시간
    rpc_timeout: Duration,
    poll_interval: Duration,
}

impl BlockchainClient {
    /// 노드 연결, 서명자 로드, 체인 ID 확인
    pub async fn connect(network: &NetworkConfig, contracts: ContractConfig) -> Result<Self, ChainError> {
        let endpoint = network.ws_url.clone().unwrap_or_else(|| network.rpc_url.clone());
        info!("🔌 블록체인 RPC 클라이언트 초기화: {}", network.name);

        let signer = Self::load_signer(network)?;
        let signer_address = signer.as_ref().map(|s| s.address());

        let provider = match signer {
            Some(signer) => {
                info!("🔑 Wallet 초기화 완료: {}", signer.address());
                ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect(&endpoint)
                    .await
                    .map_err(map_transport_error)?
                    .erased()
            }
            None => {
                warn!("⚠️ Private key 없음 - 트랜잭션 서명 불가 (읽기 전용 모드)");
                ProviderBuilder::new()
                    .connect(&endpoint)
                    .await
                    .map_err(map_transport_error)?
                    .erased()
            }
        };

        let rpc_timeout = Duration::from_millis(network.rpc_timeout_ms);
        let actual = tokio::time::timeout(rpc_timeout, provider.get_chain_id())
            .await
            .map_err(|_| ChainError::Timeout {
                operation: "eth_chainId".to_string(),
                millis: network.rpc_timeout_ms,
            })?
            .map_err(map_transport_error)?;

        if actual != network.chain_id {
            return Err(ChainError::WrongChain {
                expected: network.chain_id,
                actual,
            });
        }
        info!("🔗 체인 ID: {}", actual);

        Ok(Self {
            provider,
            signer_address,
            chain_id: actual,
            contracts,
            rpc_timeout,
            poll_interval: Duration::from_millis(RECEIPT_POLL_INTERVAL_MS),
        })
    }

    fn load_signer(network: &NetworkConfig) -> Result<Option<PrivateKeySigner>, ChainError> {
        if let Some(pk) = &network.private_key {
            let signer = PrivateKeySigner::from_str(pk.trim_start_matches("0x"))
                .map_err(|e| ChainError::Signer(format!("invalid private key: {}", e)))?;
            return Ok(Some(signer));
        }

        if let Some(path) = &network.keystore_path {
            let password = network.keystore_password.clone().unwrap_or_default();
            let signer = PrivateKeySigner::decrypt_keystore(path, password)
                .map_err(|e| ChainError::Signer(format!("keystore {}: {}", path, e)))?;
            return Ok(Some(signer));
        }

        Ok(None)
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// 읽기 호출에 타임아웃 적용
    async fn timed<T, F>(&self, operation: &str, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        match tokio::time::timeout(self.rpc_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ {} 타임아웃 ({}ms)", operation, self.rpc_timeout.as_millis());
                Err(ChainError::Timeout {
                    operation: operation.to_string(),
                    millis: self.rpc_timeout.as_millis() as u64,
                })
            }
        }
    }

    fn signer(&self) -> Result<Address, ChainError> {
        self.signer_address.ok_or(ChainError::NoSigner)
    }

    fn trade_executor(&self) -> Result<Address, ChainError> {
        self.contracts.trade_executor.ok_or(ChainError::NotConfigured("trade executor"))
    }

    fn portfolio_manager(&self) -> Result<Address, ChainError> {
        self.contracts.portfolio.ok_or(ChainError::NotConfigured("portfolio"))
    }

    fn oracle(&self) -> Result<Address, ChainError> {
        self.contracts.oracle.ok_or(ChainError::NotConfigured("oracle"))
    }

    fn swap_call_params(params: &SwapParams) -> ISwapRouter::ExactInputSingleParams {
        ISwapRouter::ExactInputSingleParams {
            tokenIn: params.token_in,
            tokenOut: params.token_out,
            fee: params.fee.to_u24(),
            recipient: params.recipient,
            deadline: U256::from(params.deadline),
            amountIn: params.amount_in,
            amountOutMinimum: params.amount_out_minimum,
            sqrtPriceLimitX96: U160::ZERO,
        }
    }
}

#[async_trait]
impl WalletApi for BlockchainClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    fn account(&self) -> Result<Address, ChainError> {
        self.signer()
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        self.timed("eth_getBalance", async {
            self.provider.get_balance(account).await.map_err(map_transport_error)
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.timed("eth_gasPrice", async {
            self.provider.get_gas_price().await.map_err(map_transport_error)
        })
        .await
    }
}

#[async_trait]
impl TokenApi for BlockchainClient {
    async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.timed("decimals", async { erc20.decimals().call().await.map_err(map_contract_error) })
            .await
    }

    async fn symbol(&self, token: Address) -> Result<String, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.timed("symbol", async { erc20.symbol().call().await.map_err(map_contract_error) })
            .await
    }

    async fn name(&self, token: Address) -> Result<String, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.timed("name", async { erc20.name().call().await.map_err(map_contract_error) })
            .await
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.timed("balanceOf", async {
            erc20.balanceOf(owner).call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.provider.clone());
        self.timed("allowance", async {
            erc20.allowance(owner, spender).call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let erc20 = IERC20::new(token, self.provider.clone());
        let pending = erc20
            .approve(spender, amount)
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;

        debug!("📝 approve 전송: {:?}", pending.tx_hash());
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl PoolFactoryApi for BlockchainClient {
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError> {
        let factory = IUniswapV3Factory::new(self.contracts.factory, self.provider.clone());
        self.timed("getPool", async {
            factory
                .getPool(token_a, token_b, fee.to_u24())
                .call()
                .await
                .map_err(map_contract_error)
        })
        .await
    }
}

#[async_trait]
impl QuoterApi for BlockchainClient {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
        sqrt_price_limit_x96: U160,
    ) -> Result<U256, ChainError> {
        let quoter = IQuoter::new(self.contracts.quoter, self.provider.clone());
        self.timed("quoteExactInputSingle", async {
            quoter
                .quoteExactInputSingle(token_in, token_out, fee.to_u24(), amount_in, sqrt_price_limit_x96)
                .call()
                .await
                .map_err(map_contract_error)
        })
        .await
    }

    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, ChainError> {
        let quoter = IQuoter::new(self.contracts.quoter, self.provider.clone());
        self.timed("quoteExactInput", async {
            quoter
                .quoteExactInput(path, amount_in)
                .call()
                .await
                .map_err(map_contract_error)
        })
        .await
    }
}

#[async_trait]
impl SwapRouterApi for BlockchainClient {
    fn router_address(&self) -> Address {
        self.contracts.swap_router
    }

    async fn estimate_exact_input_single(&self, params: &SwapParams) -> Result<u64, ChainError> {
        let from = self.signer()?;
        let router = ISwapRouter::new(self.contracts.swap_router, self.provider.clone());
        let call = router.exactInputSingle(Self::swap_call_params(params)).from(from);
        self.timed("estimateGas(exactInputSingle)", async {
            call.estimate_gas().await.map_err(map_contract_error)
        })
        .await
    }

    async fn exact_input_single(&self, params: &SwapParams, gas_limit: u64) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let router = ISwapRouter::new(self.contracts.swap_router, self.provider.clone());
        let pending = router
            .exactInputSingle(Self::swap_call_params(params))
            .from(from)
            .gas(gas_limit)
            .send()
            .await
            .map_err(map_contract_error)?;

        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl TradeContractApi for BlockchainClient {
    fn trade_contract_address(&self) -> Result<Address, ChainError> {
        self.trade_executor()
    }

    async fn is_whitelisted(&self, token: Address) -> Result<bool, ChainError> {
        let executor = ITradeExecutor::new(self.trade_executor()?, self.provider.clone());
        self.timed("whitelistedTokens", async {
            executor.whitelistedTokens(token).call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn find_best_pool(&self, token_in: Address, token_out: Address) -> Result<(Address, u32), ChainError> {
        let executor = ITradeExecutor::new(self.trade_executor()?, self.provider.clone());
        let ret = self
            .timed("findBestPool", async {
                executor.findBestPool(token_in, token_out).call().await.map_err(map_contract_error)
            })
            .await?;

        Ok((ret.pool, ret.fee.to::<u32>()))
    }

    async fn min_trade_amount(&self) -> Result<U256, ChainError> {
        let executor = ITradeExecutor::new(self.trade_executor()?, self.provider.clone());
        self.timed("MIN_TRADE_AMOUNT", async {
            executor.MIN_TRADE_AMOUNT().call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn estimate_manual_trade(&self, params: &ManualTradeParams) -> Result<u64, ChainError> {
        let from = self.signer()?;
        let executor = ITradeExecutor::new(self.trade_executor()?, self.provider.clone());
        let call = executor
            .executeManualTrade(params.token_in, params.token_out, params.amount_in, params.recipient)
            .from(from);
        self.timed("estimateGas(executeManualTrade)", async {
            call.estimate_gas().await.map_err(map_contract_error)
        })
        .await
    }

    async fn execute_manual_trade(&self, params: &ManualTradeParams, gas_limit: u64) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let executor = ITradeExecutor::new(self.trade_executor()?, self.provider.clone());
        let pending = executor
            .executeManualTrade(params.token_in, params.token_out, params.amount_in, params.recipient)
            .from(from)
            .gas(gas_limit)
            .send()
            .await
            .map_err(map_contract_error)?;

        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl OracleApi for BlockchainClient {
    async fn get_prediction(&self, token: Address) -> Result<Prediction, ChainError> {
        let oracle = IAIOracle::new(self.oracle()?, self.provider.clone());
        let ret = self
            .timed("getPrediction", async {
                oracle.getPrediction(token).call().await.map_err(map_contract_error)
            })
            .await?;

        let score_cap = U256::from(MAX_SCORE);
        let direction = i64::try_from(ret.priceDirection).unwrap_or(if ret.priceDirection.is_negative() {
            i64::MIN
        } else {
            i64::MAX
        });

        Ok(Prediction {
            confidence: ret.confidence.min(score_cap).to::<u8>(),
            price_direction: direction,
            is_honeypot: ret.isHoneypot,
            risk_score: ret.riskScore.min(score_cap).to::<u8>(),
            timestamp: ret.timestamp.saturating_to::<u64>(),
        })
    }
}

#[async_trait]
impl PortfolioApi for BlockchainClient {
    fn portfolio_address(&self) -> Result<Address, ChainError> {
        self.portfolio_manager()
    }

    async fn create_portfolio(&self, risk_level: u8) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let pending = manager
            .createPortfolio(risk_level)
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn deposit(&self, token: Address, amount: U256) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let pending = manager
            .deposit(token, amount)
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw(&self, token: Address, amount: U256) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let pending = manager
            .withdraw(token, amount)
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn user_portfolio(&self, user: Address) -> Result<PortfolioInfo, ChainError> {
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let ret = self
            .timed("userPortfolios", async {
                manager.userPortfolios(user).call().await.map_err(map_contract_error)
            })
            .await?;

        Ok(PortfolioInfo {
            total_value: ret.totalValue,
            risk_level: ret.riskLevel,
            is_active: ret.isActive,
            created_at: ret.createdAt.saturating_to::<u64>(),
        })
    }

    async fn token_balance(&self, user: Address, token: Address) -> Result<U256, ChainError> {
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        self.timed("getTokenBalance", async {
            manager.getTokenBalance(user, token).call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn update_auto_trading(&self, settings: &AutoTradingSettings) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let pending = manager
            .updateAutoTrading(
                settings.enabled,
                U256::from(settings.min_confidence),
                U256::from(settings.max_risk_score),
                settings.trade_amount,
            )
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn auto_trading_settings(&self, user: Address) -> Result<AutoTradingSettings, ChainError> {
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let ret = self
            .timed("getAutoTradingSettings", async {
                manager.getAutoTradingSettings(user).call().await.map_err(map_contract_error)
            })
            .await?;

        let score_cap = U256::from(MAX_SCORE);
        Ok(AutoTradingSettings {
            enabled: ret.enabled,
            min_confidence: ret.minConfidence.min(score_cap).to::<u8>(),
            max_risk_score: ret.maxRiskScore.min(score_cap).to::<u8>(),
            trade_amount: ret.tradeAmount,
        })
    }

    async fn is_approved_token(&self, token: Address) -> Result<bool, ChainError> {
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        self.timed("approvedTokens", async {
            manager.approvedTokens(token).call().await.map_err(map_contract_error)
        })
        .await
    }

    async fn add_token(&self, token: Address) -> Result<TxHash, ChainError> {
        let from = self.signer()?;
        let manager = IPortfolioManager::new(self.portfolio_manager()?, self.provider.clone());
        let pending = manager
            .addToken(token)
            .from(from)
            .send()
            .await
            .map_err(map_contract_error)?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl ReceiptApi for BlockchainClient {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<ReceiptOutcome, ChainError> {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return Ok(ReceiptOutcome {
                        tx_hash,
                        success: receipt.status(),
                        block_number: receipt.block_number(),
                        gas_used: receipt.gas_used(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    // 일시적 RPC 오류는 다음 폴링에서 재시도
                    debug!("receipt 조회 실패 {:?}: {}", tx_hash, e);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
