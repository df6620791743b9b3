use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::common::time::current_timestamp;
use crate::types::{Quote, QuoteKey};

/// 견적 단기 캐시. "견적 조회"와 "실행" 사이의 일관성 유지용이며
/// 체인이 실행 시점에 다시 검증하므로 정확성 보장 수단은 아니다.
pub struct QuoteCache {
    entries: DashMap<QuoteKey, Quote>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, quote: Quote) {
        self.entries.insert(quote.key(), quote);
    }

    pub fn get(&self, key: &QuoteKey) -> Option<Quote> {
        self.get_at(key, current_timestamp())
    }

    /// 만료된 항목은 읽는 시점에 제거
    pub fn get_at(&self, key: &QuoteKey, now: u64) -> Option<Quote> {
        let expired = match self.entries.get(key) {
            Some(entry) if now.saturating_sub(entry.obtained_at) < self.ttl.as_secs() => {
                return Some(entry.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("🗑️ 만료된 견적 제거: fee={}", key.fee);
            self.entries.remove(key);
        }
        None
    }

    pub fn invalidate(&self, key: &QuoteKey) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
