use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pipeline::{TradeOrder, TradePipeline};
use crate::errors::{ErrorKind, TradeError};

/// 자동 거래 스케줄러
///
/// 세션에 등록된 감시 토큰을 주기적으로 돌며 base 토큰으로 매수한다.
/// 한 사이클의 모든 파이프라인 실행이 끝나야 다음 tick을 받는다.
pub struct AutoTrader {
    pipeline: Arc<TradePipeline>,
    base_token: Address,
    interval: Duration,
    is_running: Arc<AtomicBool>,
    cycle_active: AtomicBool,
    /// 실행마다 새로 발급. `stop()`은 현재 토큰을 취소한다
    cancel: Mutex<CancellationToken>,
    stats: Arc<RwLock<AutoTraderStats>>,
}

#[derive(Debug, Clone, Default)]
pub struct AutoTraderStats {
    pub cycles: u64,
    pub attempts: u64,
    pub executed: u64,
    /// 검증 단계 거절 (쿨다운, 임계값 등)
    pub rejected: u64,
    pub failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// 사이클 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub executed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl AutoTrader {
    pub fn new(pipeline: Arc<TradePipeline>, base_token: Address, interval: Duration) -> Self {
        Self {
            pipeline,
            base_token,
            interval,
            is_running: Arc::new(AtomicBool::new(false)),
            cycle_active: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            stats: Arc::new(RwLock::new(AutoTraderStats::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> AutoTraderStats {
        self.stats.read().await.clone()
    }

    /// `stop()`이 호출될 때까지 사이클 반복
    pub async fn run(&self) -> Result<(), TradeError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(TradeError::Config("auto trader is already running".to_string()));
        }

        let cancel = CancellationToken::new();
        *self.cancel_slot() = cancel.clone();

        info!("⏰ 자동 거래 스케줄러 시작");
        info!("  📊 주기: {}s, base 토큰: {}", self.interval.as_secs(), self.base_token);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // 사이클이 끝나야 다음 tick으로 넘어간다
            self.run_cycle().await;
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("⏹️ 자동 거래 스케줄러 중지됨");
        Ok(())
    }

    /// 제출 전 단계의 작업을 취소하고 루프를 끝낸다.
    /// 이미 제출된 트랜잭션은 확정까지 추적된다.
    pub fn stop(&self) {
        self.cancel_slot().cancel();
    }

    fn cancel_slot(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 감시 토큰 한 바퀴. 이전 사이클이 진행 중이면 건너뛴다.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        if self.cycle_active.swap(true, Ordering::SeqCst) {
            debug!("⏭️ 이전 사이클 진행 중, 건너뜀");
            return None;
        }

        let cancel = self.cancel_slot().clone();
        let mut report = CycleReport::default();
        let watched = self.pipeline.session().watched_tokens();

        for (token, settings) in watched {
            if cancel.is_cancelled() {
                break;
            }
            if !settings.enabled || token == self.base_token {
                continue;
            }

            let order = TradeOrder {
                token_in: self.base_token,
                token_out: token,
                subject: token,
                amount: settings.trade_amount.clone(),
                ignore_cooldown: false,
            };

            report.attempted += 1;
            match self.pipeline.run(&order, &cancel).await {
                Ok(outcome) => {
                    report.executed += 1;
                    info!("🤖 자동 거래 체결: {} ({})", token, outcome.tx.tx_hash);
                }
                Err(e) if e.kind() == ErrorKind::Validation => {
                    report.rejected += 1;
                    debug!("🚫 {} 건너뜀: {}", token, e);
                }
                Err(TradeError::Cancelled) => break,
                Err(e) => {
                    report.failed += 1;
                    warn!("⚠️ 자동 거래 실패 {}: {}", token, e);
                }
            }
        }

        self.record(&report).await;
        self.cycle_active.store(false, Ordering::SeqCst);
        info!(
            "✅ 자동 거래 사이클 완료: 시도 {}, 체결 {}, 거절 {}, 실패 {}",
            report.attempted, report.executed, report.rejected, report.failed
        );
        Some(report)
    }

    async fn record(&self, report: &CycleReport) {
        let mut stats = self.stats.write().await;
        stats.cycles += 1;
        stats.attempts += report.attempted as u64;
        stats.executed += report.executed as u64;
        stats.rejected += report.rejected as u64;
        stats.failed += report.failed as u64;
        stats.last_cycle_at = Some(Utc::now());
    }
}
