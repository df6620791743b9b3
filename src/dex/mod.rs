//! DEX 견적 계층: 풀 탐색, path 인코딩, 견적, 실패 분류, 견적 캐시

pub mod classifier;
pub mod path;
pub mod pool_locator;
pub mod quote_cache;
pub mod quote_resolver;

pub use classifier::{classify_execution_error, classify_quote_error};
pub use path::{decode_path, encode_path, encode_single_hop, PathError};
pub use pool_locator::PoolLocator;
pub use quote_cache::QuoteCache;
pub use quote_resolver::{check_liquidity, CandidateQuote, LiquidityReport, QuoteResolver};
