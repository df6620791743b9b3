use chrono::Utc;

/// Get current timestamp
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// `last + duration`까지 남은 초 (이미 지났으면 0)
pub fn remaining_secs(last: u64, duration: u64, now: u64) -> u64 {
    last.saturating_add(duration).saturating_sub(now)
}
