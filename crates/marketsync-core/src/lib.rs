//! # MarketSync Core
//!
//! 시세 동기화 엔진 전반에서 사용하는 핵심 도메인 타입을 제공합니다.
//!
//! - 일봉 레코드와 가져오기 분류 타입
//! - 거래일 계산 유틸리티

pub mod calendar;
pub mod types;

pub use calendar::*;
pub use types::*;
