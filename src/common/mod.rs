//! 공통 유틸리티 모듈
//!
//! 금액 파싱/포맷팅, 슬리피지 및 가스 계산, 시간 함수 등
//! 거래 엔진 전체에서 사용하는 순수 함수들을 포함합니다.

pub mod amount;
pub mod formatting;
pub mod math;
pub mod time;
pub mod validation;

pub use amount::*;
pub use formatting::*;
pub use math::*;
pub use time::*;
pub use validation::*;
