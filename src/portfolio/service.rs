use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tracing::{debug, info};

use crate::blockchain::traits::{AutoTradingSettings, ChainApis, PortfolioInfo};
use crate::common::amount::parse_units;
use crate::constants::{MAX_RISK_LEVEL, MIN_RISK_LEVEL};
use crate::errors::{Rejection, TradeError};
use crate::types::{ReceiptOutcome, TokenRef, TradeSettings};

/// 커스터디 잔액 + 지갑 잔액
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioBalance {
    pub token: TokenRef,
    pub wallet: U256,
    pub custody: U256,
}

/// 포트폴리오/커스터디 컨트랙트 작업
///
/// 쓰기 호출은 영수증까지 기다리고, 실패 영수증은 `Reverted`로 돌려준다.
pub struct PortfolioService {
    apis: ChainApis,
    receipt_timeout: Duration,
}

impl PortfolioService {
    pub fn new(apis: ChainApis, receipt_timeout: Duration) -> Self {
        Self { apis, receipt_timeout }
    }

    pub async fn portfolio(&self, user: Address) -> Result<PortfolioInfo, TradeError> {
        Ok(self.apis.portfolio.user_portfolio(user).await?)
    }

    pub async fn create_portfolio(&self, risk_level: u8) -> Result<ReceiptOutcome, TradeError> {
        if !(MIN_RISK_LEVEL..=MAX_RISK_LEVEL).contains(&risk_level) {
            return Err(Rejection::InvalidRiskLevel { value: risk_level }.into());
        }

        let account = self.apis.wallet.account()?;
        if self.apis.portfolio.user_portfolio(account).await?.is_active {
            return Err(Rejection::PortfolioExists.into());
        }

        info!("📁 포트폴리오 생성 (risk level {})", risk_level);
        let tx_hash = self.apis.portfolio.create_portfolio(risk_level).await?;
        self.confirm(tx_hash).await
    }

    /// 승인 토큰 확인 -> 잔액 확인 -> 필요 시 approve -> deposit
    pub async fn deposit(&self, token: Address, amount: U256) -> Result<ReceiptOutcome, TradeError> {
        if amount.is_zero() {
            return Err(Rejection::InvalidAmount { value: "0".to_string() }.into());
        }
        if !self.apis.portfolio.is_approved_token(token).await? {
            return Err(Rejection::TokenNotApproved { token }.into());
        }

        let account = self.apis.wallet.account()?;
        let balance = self.apis.tokens.balance_of(token, account).await?;
        if balance < amount {
            return Err(TradeError::InsufficientBalance {
                token,
                required: amount,
                available: balance,
            });
        }

        let manager = self.apis.portfolio.portfolio_address()?;
        let allowance = self.apis.tokens.allowance(token, account, manager).await?;
        if allowance < amount {
            debug!("📝 커스터디 approve: {} ({})", token, amount);
            let tx_hash = self.apis.tokens.approve(token, manager, amount).await?;
            let receipt = self.wait(tx_hash).await?;
            if !receipt.success {
                return Err(TradeError::ApprovalFailed { tx_hash });
            }
        }

        info!("📥 입금: {} {}", amount, token);
        let tx_hash = self.apis.portfolio.deposit(token, amount).await?;
        self.confirm(tx_hash).await
    }

    pub async fn withdraw(&self, token: Address, amount: U256) -> Result<ReceiptOutcome, TradeError> {
        let account = self.apis.wallet.account()?;
        let held = self.apis.portfolio.token_balance(account, token).await?;
        if held < amount {
            return Err(TradeError::InsufficientBalance {
                token,
                required: amount,
                available: held,
            });
        }

        info!("📤 출금: {} {}", amount, token);
        let tx_hash = self.apis.portfolio.withdraw(token, amount).await?;
        self.confirm(tx_hash).await
    }

    pub async fn balances(&self, user: Address, tokens: &[TokenRef]) -> Result<Vec<PortfolioBalance>, TradeError> {
        let lookups = tokens.iter().map(|token| async move {
            let (wallet, custody) = futures::try_join!(
                self.apis.tokens.balance_of(token.address, user),
                self.apis.portfolio.token_balance(user, token.address),
            )?;
            Ok::<_, TradeError>(PortfolioBalance {
                token: token.clone(),
                wallet,
                custody,
            })
        });

        futures::future::try_join_all(lookups).await
    }

    /// 세션 설정을 온체인 자동 거래 설정으로 반영
    pub async fn sync_auto_trading(
        &self,
        settings: &TradeSettings,
        decimals: u8,
    ) -> Result<ReceiptOutcome, TradeError> {
        let account = self.apis.wallet.account()?;
        if !self.apis.portfolio.user_portfolio(account).await?.is_active {
            return Err(Rejection::NoPortfolio.into());
        }

        let trade_amount = parse_units(&settings.trade_amount, decimals).map_err(|_| Rejection::InvalidAmount {
            value: settings.trade_amount.clone(),
        })?;
        let onchain = AutoTradingSettings {
            enabled: settings.enabled,
            min_confidence: settings.min_confidence,
            max_risk_score: settings.max_risk_score,
            trade_amount,
        };

        info!("🔄 자동 거래 설정 동기화 (enabled: {})", onchain.enabled);
        let tx_hash = self.apis.portfolio.update_auto_trading(&onchain).await?;
        self.confirm(tx_hash).await
    }

    pub async fn auto_trading_settings(&self, user: Address) -> Result<AutoTradingSettings, TradeError> {
        Ok(self.apis.portfolio.auto_trading_settings(user).await?)
    }

    /// 커스터디 승인 토큰 등록 (컨트랙트 owner 전용). 이미 승인돼 있으면 None
    pub async fn approve_token(&self, token: Address) -> Result<Option<ReceiptOutcome>, TradeError> {
        if self.apis.portfolio.is_approved_token(token).await? {
            debug!("⏭️ 이미 승인된 토큰: {}", token);
            return Ok(None);
        }
        let tx_hash = self.apis.portfolio.add_token(token).await?;
        self.confirm(tx_hash).await.map(Some)
    }

    async fn wait(&self, tx_hash: TxHash) -> Result<ReceiptOutcome, TradeError> {
        tokio::time::timeout(self.receipt_timeout, self.apis.receipts.wait_for_receipt(tx_hash))
            .await
            .map_err(|_| TradeError::ConfirmationTimeout {
                tx_hash,
                timeout_secs: self.receipt_timeout.as_secs(),
            })?
            .map_err(TradeError::from)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<ReceiptOutcome, TradeError> {
        let receipt = self.wait(tx_hash).await?;
        if !receipt.success {
            return Err(TradeError::Reverted {
                tx_hash,
                reason: "receipt status 0".to_string(),
            });
        }
        info!("✅ 확정: {} (block {:?})", tx_hash, receipt.block_number);
        Ok(receipt)
    }
}
