//! 포트폴리오/커스터디 컨트랙트 연동

pub mod service;

pub use service::{PortfolioBalance, PortfolioService};
