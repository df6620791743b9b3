pub mod chain;

pub use chain::{demo_token, MockChain, QuoteBehavior, ReceiptBehavior};

use std::env;

/// `API_MODE=mock` 이면 실제 노드 대신 메모리 체인 사용
pub fn is_mock_mode() -> bool {
    env::var("API_MODE").unwrap_or_default() == "mock"
}
