use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

use super::validator::ValidationMode;
use crate::common::time::remaining_secs;
use crate::errors::Rejection;
use crate::types::TradeSettings;

/// 세션 상태 저장소
///
/// 토큰별 거래 설정, 쿨다운 타임스탬프, 검증 모드, 진행 중 거래 집합을
/// 한 곳에서 소유한다. 프로세스 재시작 시 사라진다.
pub struct SessionState {
    settings: DashMap<Address, TradeSettings>,
    cooldowns: DashMap<Address, u64>,
    in_flight: Arc<DashSet<Address>>,
    bypass: AtomicBool,
    cooldown_secs: u64,
}

impl SessionState {
    pub fn new(cooldown_secs: u64, mode: ValidationMode) -> Self {
        Self {
            settings: DashMap::new(),
            cooldowns: DashMap::new(),
            in_flight: Arc::new(DashSet::new()),
            bypass: AtomicBool::new(mode == ValidationMode::Bypass),
            cooldown_secs,
        }
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn mode(&self) -> ValidationMode {
        if self.bypass.load(Ordering::SeqCst) {
            ValidationMode::Bypass
        } else {
            ValidationMode::Strict
        }
    }

    pub fn set_mode(&self, mode: ValidationMode) {
        self.bypass.store(mode == ValidationMode::Bypass, Ordering::SeqCst);
        info!("🔧 검증 모드 변경: {:?}", mode);
    }

    /// 설정이 없으면 기본값 (비활성)
    pub fn settings(&self, token: Address) -> TradeSettings {
        self.settings.get(&token).map(|s| s.clone()).unwrap_or_default()
    }

    pub fn set_settings(&self, token: Address, mut settings: TradeSettings) {
        if let Some(last) = self.last_fired_at(token) {
            settings.last_fired_at = Some(last);
        }
        self.settings.insert(token, settings);
    }

    pub fn update_settings<F>(&self, token: Address, update: F)
    where
        F: FnOnce(&mut TradeSettings),
    {
        let mut entry = self.settings.entry(token).or_default();
        update(entry.value_mut());
    }

    /// 설정이 등록된 모든 토큰 (주소 순 정렬)
    pub fn watched_tokens(&self) -> Vec<(Address, TradeSettings)> {
        let mut tokens: Vec<(Address, TradeSettings)> = self
            .settings
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        tokens.sort_by_key(|(token, _)| *token);
        tokens
    }

    pub fn last_fired_at(&self, token: Address) -> Option<u64> {
        self.cooldowns.get(&token).map(|t| *t)
    }

    pub fn record_fire(&self, token: Address, now: u64) {
        self.cooldowns.insert(token, now);
        if let Some(mut settings) = self.settings.get_mut(&token) {
            settings.last_fired_at = Some(now);
        }
        debug!("⏱️ 쿨다운 기록: {} @ {}", token, now);
    }

    pub fn cooldown_remaining(&self, token: Address, now: u64) -> u64 {
        self.last_fired_at(token)
            .map(|last| remaining_secs(last, self.cooldown_secs, now))
            .unwrap_or(0)
    }

    pub fn clear_cooldown(&self, token: Address) {
        self.cooldowns.remove(&token);
        if let Some(mut settings) = self.settings.get_mut(&token) {
            settings.last_fired_at = None;
        }
    }

    /// 토큰별 진행 중 거래 표시. 가드가 drop 되면 해제된다.
    pub fn try_begin(&self, token: Address) -> Result<InFlightGuard, Rejection> {
        if !self.in_flight.insert(token) {
            return Err(Rejection::TradeInFlight { token });
        }
        Ok(InFlightGuard {
            set: self.in_flight.clone(),
            token,
        })
    }

    pub fn is_in_flight(&self, token: Address) -> bool {
        self.in_flight.contains(&token)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<DashSet<Address>>,
    token: Address,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.token);
    }
}
