//! 거래 흐름: 세션 상태, 검증, 실행, 이벤트, 파이프라인, 자동 거래

pub mod events;
pub mod executor;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod validator;

pub use events::{EventSink, TradeEvent};
pub use executor::{ExecutorSettings, TradeExecutor};
pub use pipeline::{TradeOrder, TradeOutcome, TradePipeline};
pub use scheduler::{AutoTrader, AutoTraderStats, CycleReport};
pub use session::{InFlightGuard, SessionState};
pub use validator::{validate, validate_quote, TradeIntent, ValidationContext, ValidationMode, ValidationReport};
