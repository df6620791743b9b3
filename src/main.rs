use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oracle_trade_engine::blockchain::BlockchainClient;
use oracle_trade_engine::common::{format_bps, format_token_amount, parse_units};
use oracle_trade_engine::config::{Config, TokenConfig, WatchConfig};
use oracle_trade_engine::mocks::{demo_token, is_mock_mode, MockChain};
use oracle_trade_engine::oracle::{direction_label, Freshness};
use oracle_trade_engine::types::TokenRef;
use oracle_trade_engine::{
    current_timestamp, AutoTrader, ChainApis, EventSink, PortfolioService, SessionState, TradeError, TradeOrder,
    TradePipeline, ValidationMode,
};

/// 🦀 오라클 기반 DEX 거래 엔진
#[derive(Parser, Debug)]
#[command(name = "trader", author, version, about, long_about = None)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    config: String,

    /// 로그 레벨 (trace, debug, info, warn, error). 없으면 RUST_LOG
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// 인메모리 mock 체인 사용 (API_MODE=mock 과 동일)
    #[arg(long)]
    mock: bool,

    /// 거래 이벤트를 JSON 줄로 stdout에 출력
    #[arg(long)]
    json_events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 모든 fee tier의 풀과 견적 조회 (읽기 전용)
    CheckLiquidity {
        token_in: String,
        token_out: String,
        amount: String,
    },
    /// 최적 견적 조회
    Quote {
        token_in: String,
        token_out: String,
        amount: String,
    },
    /// 검증 후 스왑 실행
    Trade {
        token_in: String,
        token_out: String,
        amount: String,
        /// 쿨다운을 경고로 낮춤
        #[arg(long)]
        ignore_cooldown: bool,
        /// 예측 임계값 검사를 경고로 낮춤
        #[arg(long)]
        bypass: bool,
    },
    /// watchlist 자동 거래 루프
    Auto {
        /// 사이클 주기 (초). 없으면 설정값
        #[arg(long)]
        interval: Option<u64>,
    },
    /// 포트폴리오/커스터디 작업
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommand,
    },
    /// 오라클 예측 조회
    Prediction { token: String },
}

#[derive(Subcommand, Debug)]
enum PortfolioCommand {
    Create {
        /// 1 - 10
        risk_level: u8,
    },
    Deposit { token: String, amount: String },
    Withdraw { token: String, amount: String },
    /// 지갑/커스터디 잔액 (토큰 미지정 시 설정된 토큰 전체)
    Balance { tokens: Vec<String> },
    /// watchlist 설정을 온체인 자동 거래 설정으로 반영
    Sync { token: String },
    /// 커스터디 승인 토큰 등록 (owner 전용)
    ApproveToken { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mock_mode = cli.mock || is_mock_mode();
    let (mut config, from_file) = load_config(&cli.config, mock_mode).await?;

    // 로깅 초기화: 플래그 > RUST_LOG > 설정 파일
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = config
        .monitoring
        .log_directive(cli.log_level.as_deref(), rust_log.as_deref());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(directive))
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    if from_file {
        info!("📋 설정 파일 로드: {}", cli.config);
    } else {
        warn!("📋 설정 파일 없음 ({}), 기본 설정 사용", cli.config);
    }
    config.apply_env_overrides();

    let apis = if mock_mode {
        warn!("🎭 [MOCK] 인메모리 체인으로 실행합니다");
        let mock = Arc::new(MockChain::demo());
        prepare_mock_config(&mut config, &mock);
        config.validate().context("설정 검증 실패")?;
        ChainApis::from_backend(mock)
    } else {
        config.validate().context("설정 검증 실패")?;
        info!("🔌 노드 연결 중: {}", config.network.rpc_url);
        let client = BlockchainClient::connect(&config.network, config.contracts.clone())
            .await
            .context("노드 연결 실패")?;
        ChainApis::from_backend(Arc::new(client))
    };
    info!("✅ 설정 로드 완료 ({}, chain {})", config.network.name, config.network.chain_id);

    let session = Arc::new(SessionState::new(
        config.trading.cooldown_secs,
        config.trading.validation_mode,
    ));
    for watch in &config.watchlist {
        let token = config.resolve_token(&watch.token)?;
        session.set_settings(token, watch.to_settings());
    }

    let events = EventSink::new(config.monitoring.event_buffer);
    if cli.json_events {
        spawn_event_printer(&events);
    }

    let pipeline = Arc::new(TradePipeline::new(apis.clone(), &config, session.clone(), events));

    match cli.command {
        Commands::CheckLiquidity { token_in, token_out, amount } => {
            let (token_in, token_out) = resolve_pair(&config, &pipeline, &token_in, &token_out).await?;
            let amount_in = parse_units(&amount, token_in.decimals).map_err(|e| anyhow!("{}: {}", amount, e))?;
            let report = pipeline
                .check_liquidity(token_in.address, token_out.address, amount_in)
                .await
                .map_err(|e| report_trade_error(&e))?;

            println!("\n🏊 {} -> {} ({} {})", token_in.symbol, token_out.symbol, amount, token_in.symbol);
            for entry in &report.entries {
                let candidate = &entry.candidate;
                match &entry.result {
                    Ok(quote) => println!(
                        "  ✅ fee {} pool {} liquidity {} -> {} ({})",
                        candidate.fee,
                        candidate.pool_address,
                        format_token_amount(candidate.observed_liquidity, &token_in),
                        format_token_amount(quote.amount_out, &token_out),
                        quote.source
                    ),
                    Err(attempts) => {
                        println!("  ❌ fee {} pool {}", candidate.fee, candidate.pool_address);
                        for attempt in attempts {
                            println!("     {} {:?}: {}", attempt.source, attempt.failure, attempt.failure.hint());
                        }
                    }
                }
            }
            println!("  {}/{} 풀에서 견적 가능", report.quotable_count(), report.entries.len());
        }

        Commands::Quote { token_in, token_out, amount } => {
            let (token_in, token_out) = resolve_pair(&config, &pipeline, &token_in, &token_out).await?;
            let amount_in = parse_units(&amount, token_in.decimals).map_err(|e| anyhow!("{}: {}", amount, e))?;
            let quote = pipeline
                .quote(token_in.address, token_out.address, amount_in)
                .await
                .map_err(|e| report_trade_error(&e))?;

            println!("\n💱 {} {} -> {}", amount, token_in.symbol, format_token_amount(quote.amount_out, &token_out));
            println!("  fee tier: {} ({})", quote.fee, quote.source);
            println!("  pool: {}", quote.pool);
            println!(
                "  min out ({} slippage): {}",
                format_bps(pipeline.slippage_bps()),
                format_token_amount(quote.min_amount_out(pipeline.slippage_bps()), &token_out)
            );
        }

        Commands::Trade { token_in, token_out, amount, ignore_cooldown, bypass } => {
            let token_in = config.resolve_token(&token_in)?;
            let token_out = config.resolve_token(&token_out)?;
            if bypass {
                session.set_mode(ValidationMode::Bypass);
            }
            // watchlist에 없는 토큰은 이번 수동 거래에 한해 활성화
            if !config.watchlist.iter().any(|w| config.resolve_token(&w.token).ok() == Some(token_out)) {
                session.update_settings(token_out, |s| {
                    s.enabled = true;
                    s.trade_amount = amount.clone();
                });
            }

            let order = TradeOrder {
                ignore_cooldown,
                ..TradeOrder::buy(token_in, token_out, amount.clone())
            };
            let cancel = cancel_on_ctrl_c();
            let outcome = pipeline.run(&order, &cancel).await.map_err(|e| report_trade_error(&e))?;

            let out_token = pipeline.tokens().resolve(token_out).await?;
            println!("\n🎉 거래 확정: {}", outcome.tx.tx_hash);
            println!("  block: {:?}, gas used: {}", outcome.tx.block_number, outcome.tx.gas_used);
            println!("  quoted out: {}", format_token_amount(outcome.quote.amount_out, &out_token));
            println!("  min out: {}", format_token_amount(outcome.request.min_amount_out, &out_token));
            for warning in &outcome.warnings {
                println!("  ⚠️ {}", warning);
            }
        }

        Commands::Auto { interval } => {
            let base_token = config.resolve_token(&config.trading.base_token)?;
            let interval = Duration::from_secs(interval.unwrap_or(config.trading.auto_trade_interval_secs));
            let trader = Arc::new(AutoTrader::new(pipeline.clone(), base_token, interval));

            let stopper = trader.clone();
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("🛑 종료 신호 수신됨, 자동 거래 중지 중...");
                        stopper.stop();
                    }
                    Err(err) => error!("❌ 신호 처리 오류: {}", err),
                }
            });

            trader.run().await?;
            let stats = trader.stats().await;
            println!(
                "\n📊 사이클 {}, 시도 {}, 체결 {}, 거절 {}, 실패 {}",
                stats.cycles, stats.attempts, stats.executed, stats.rejected, stats.failed
            );
        }

        Commands::Portfolio { action } => {
            let portfolio = PortfolioService::new(
                apis.clone(),
                Duration::from_secs(config.trading.confirmation_timeout_secs),
            );
            run_portfolio(action, &config, &pipeline, &portfolio, &apis).await?;
        }

        Commands::Prediction { token } => {
            let address = config.resolve_token(&token)?;
            let token = pipeline.tokens().resolve(address).await?;
            match pipeline.predictions().fetch(address).await? {
                Some(prediction) => {
                    println!("\n🔮 {}", token);
                    println!("  confidence: {}", prediction.confidence);
                    println!("  direction: {} ({})", direction_label(&prediction), prediction.price_direction);
                    println!("  risk score: {}", prediction.risk_score);
                    println!("  honeypot: {}", prediction.is_honeypot);
                    match pipeline.predictions().freshness(&prediction, current_timestamp()) {
                        Freshness::Fresh => println!("  freshness: fresh"),
                        Freshness::Stale { age_secs } => println!("  freshness: stale ({}s old)", age_secs),
                    }
                }
                None => println!("\n🔮 {}: 예측 없음", token),
            }
        }
    }

    Ok(())
}

async fn run_portfolio(
    action: PortfolioCommand,
    config: &Config,
    pipeline: &TradePipeline,
    portfolio: &PortfolioService,
    apis: &ChainApis,
) -> Result<()> {
    match action {
        PortfolioCommand::Create { risk_level } => {
            let receipt = portfolio.create_portfolio(risk_level).await.map_err(|e| report_trade_error(&e))?;
            println!("📁 포트폴리오 생성: {}", receipt.tx_hash);
        }
        PortfolioCommand::Deposit { token, amount } => {
            let token = pipeline.tokens().resolve(config.resolve_token(&token)?).await?;
            let value = parse_units(&amount, token.decimals).map_err(|e| anyhow!("{}: {}", amount, e))?;
            let receipt = portfolio.deposit(token.address, value).await.map_err(|e| report_trade_error(&e))?;
            println!("📥 입금 {} {}: {}", amount, token.symbol, receipt.tx_hash);
        }
        PortfolioCommand::Withdraw { token, amount } => {
            let token = pipeline.tokens().resolve(config.resolve_token(&token)?).await?;
            let value = parse_units(&amount, token.decimals).map_err(|e| anyhow!("{}: {}", amount, e))?;
            let receipt = portfolio.withdraw(token.address, value).await.map_err(|e| report_trade_error(&e))?;
            println!("📤 출금 {} {}: {}", amount, token.symbol, receipt.tx_hash);
        }
        PortfolioCommand::Balance { tokens } => {
            let account = apis.wallet.account()?;
            let symbols: Vec<String> = if tokens.is_empty() {
                config.tokens.keys().cloned().collect()
            } else {
                tokens
            };

            let mut refs = Vec::with_capacity(symbols.len());
            for symbol in &symbols {
                refs.push(pipeline.tokens().resolve(config.resolve_token(symbol)?).await?);
            }

            let info = portfolio.portfolio(account).await?;
            println!("\n💼 {} (active: {}, risk level {})", account, info.is_active, info.risk_level);
            for balance in portfolio.balances(account, &refs).await? {
                println!(
                    "  {}: wallet {}, custody {}",
                    balance.token.symbol,
                    format_token_amount(balance.wallet, &balance.token),
                    format_token_amount(balance.custody, &balance.token)
                );
            }
        }
        PortfolioCommand::Sync { token } => {
            let address = config.resolve_token(&token)?;
            let base = pipeline.tokens().resolve(config.resolve_token(&config.trading.base_token)?).await?;
            let settings = pipeline.session().settings(address);
            let receipt = portfolio
                .sync_auto_trading(&settings, base.decimals)
                .await
                .map_err(|e| report_trade_error(&e))?;
            println!("🔄 자동 거래 설정 동기화: {}", receipt.tx_hash);
        }
        PortfolioCommand::ApproveToken { token } => {
            let address = config.resolve_token(&token)?;
            match portfolio.approve_token(address).await.map_err(|e| report_trade_error(&e))? {
                Some(receipt) => println!("✅ 토큰 승인: {}", receipt.tx_hash),
                None => println!("⏭️ 이미 승인된 토큰: {}", address),
            }
        }
    }
    Ok(())
}

/// 로깅 설정 전에 호출되므로 결과(파일 사용 여부)만 돌려준다
async fn load_config(path: &str, mock_mode: bool) -> Result<(Config, bool)> {
    if Path::new(path).exists() {
        return Ok((Config::load(path).await?, true));
    }
    if mock_mode {
        return Ok((Config::default(), false));
    }
    bail!("설정 파일을 찾을 수 없습니다: {}", path)
}

/// mock 체인의 컨트랙트/데모 토큰을 설정에 반영
fn prepare_mock_config(config: &mut Config, mock: &MockChain) {
    config.contracts.trade_executor = mock.trade_contract();
    config.contracts.portfolio = mock.portfolio_contract();
    config.tokens.entry("TKN".to_string()).or_insert(TokenConfig {
        address: demo_token(),
        decimals: Some(18),
    });
    if config.watchlist.is_empty() {
        config.watchlist.push(WatchConfig {
            token: "TKN".to_string(),
            enabled: true,
            min_confidence: 70,
            max_risk_score: 30,
            trade_amount: "100".to_string(),
        });
    }
}

async fn resolve_pair(
    config: &Config,
    pipeline: &TradePipeline,
    token_in: &str,
    token_out: &str,
) -> Result<(TokenRef, TokenRef)> {
    let token_in: Address = config.resolve_token(token_in)?;
    let token_out: Address = config.resolve_token(token_out)?;
    let (token_in, token_out) = futures::try_join!(pipeline.tokens().resolve(token_in), pipeline.tokens().resolve(token_out))?;
    Ok((token_in, token_out))
}

/// Ctrl-C 시 제출 전 단계 취소
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("🛑 종료 신호 수신됨, 제출 전이면 거래를 취소합니다");
            token.cancel();
        }
    });
    cancel
}

fn spawn_event_printer(events: &EventSink) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("⚠️ 이벤트 직렬화 실패: {}", e),
            }
        }
    });
}

/// 견적 실패는 후보별 원인과 힌트까지 출력
fn report_trade_error(e: &TradeError) -> anyhow::Error {
    error!(kind = ?e.kind(), "❌ {}", e);
    if let TradeError::NoQuoteAvailable { attempts } = e {
        for attempt in attempts {
            error!(
                "  fee {} pool {} ({}): {:?} - {}",
                attempt.fee,
                attempt.pool,
                attempt.source,
                attempt.failure,
                attempt.failure.hint()
            );
        }
    }
    anyhow!("{} ({:?})", e, e.kind())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║  🦀 Oracle Trade Engine v{}                               ║
    ║                                                              ║
    ║  풀 탐색 → 견적 → 검증 → 실행                                ║
    ║     • Uniswap V3 fee tier 전수 탐색                          ║
    ║     • direct / path 견적 폴백                                ║
    ║     • AI 오라클 예측 기반 검증                               ║
    ║     • 쿨다운 / 슬리피지 / 가스 안전장치                      ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
"#,
        env!("CARGO_PKG_VERSION")
    );
}
