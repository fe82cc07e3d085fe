//! # MarketSync Data
//!
//! 시세 동기화 엔진의 내부 구성요소를 제공합니다.
//!
//! - fingerprint 키 2계층 캐시 (메모리 + Redis)
//! - 적응형 rate limiter
//! - 지수 backoff 재시도 컨트롤러
//! - 트랜잭션 배치 accumulator
//! - 외부 소스 / 영구 저장소 인터페이스와 구현

pub mod batch;
pub mod cache;
pub mod error;
pub mod ratelimit;
pub mod retry;
pub mod source;
pub mod storage;

// 오류 타입 재내보내기
pub use error::{DataError, Result};

// 캐시 재내보내기
pub use cache::{
    fingerprint, CacheEntry, CachePolicy, CacheStats, CacheTier, DurableTier, RedisTier,
    RedisTierConfig, TieredCache,
};

// throttle/재시도/배치 재내보내기
pub use batch::BatchAccumulator;
pub use ratelimit::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryConfig, RetryController};

// 소스/저장소 재내보내기
pub use source::{DataSource, HttpDataSource, HttpSourceConfig};
pub use storage::{MemoryStore, PersistentStore, PgStore, PgStoreConfig, StoreTransaction};
