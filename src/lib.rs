// Oracle Trade Engine Library

pub mod config;
pub mod common;
pub mod dex;
pub mod mocks;
pub mod blockchain;
pub mod oracle;
pub mod portfolio;
pub mod trading;

// Core types
pub mod types;
pub mod constants;
pub mod errors;

// Re-exports for convenience
pub use config::Config;
pub use errors::{ChainError, ErrorKind, Rejection, TradeError};
pub use blockchain::{BlockchainClient, ChainApis, TokenRegistry};
pub use trading::{AutoTrader, EventSink, SessionState, TradeEvent, TradeOrder, TradePipeline, ValidationMode};
pub use portfolio::PortfolioService;

// Re-export common types
pub use common::amount::*;
pub use common::formatting::*;
pub use common::math::*;
pub use common::time::*;
