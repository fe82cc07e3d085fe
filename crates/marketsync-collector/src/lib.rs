//! Standalone sync engine for MarketSync.
//!
//! 이 crate는 시계열 시세 데이터를 외부 소스에서 가져와 영구 저장소와
//! 맞추는 바이너리를 제공합니다:
//! - subject 목록 분류 (MISSING / STALE / CURRENT)
//! - 우선순위 기반 fetch worker pool (rate limit + 재시도)
//! - 배치 upsert와 실행 요약

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use modules::{run_sync, CancelFlag, SyncContext, SyncOptions};
pub use stats::SyncRun;
