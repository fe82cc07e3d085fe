//! 영구 저장소 인터페이스와 구현.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, PgStoreConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use marketsync_core::DailyBar;

/// 영구 저장소 계약.
///
/// 배치 accumulator (트랜잭션 upsert)와 orchestrator의 작업 분류
/// (최신 거래일, 존재 여부 조회)가 쓰는 표면 전부입니다.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// 새 트랜잭션을 시작합니다.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// subject의 가장 최근 저장 거래일.
    async fn latest_date_for(&self, subject_id: &str) -> Result<Option<NaiveDate>>;

    /// subject의 레코드가 하나라도 있는지 여부.
    async fn has_any_data(&self, subject_id: &str) -> Result<bool>;
}

/// 진행 중인 저장소 트랜잭션.
///
/// `commit`/`rollback`은 트랜잭션을 소비합니다. 커밋 없이 drop되면
/// 기록한 내용은 남지 않아야 합니다.
#[async_trait]
pub trait StoreTransaction: Send {
    /// 레코드를 (subject_id, trade_date) 키로 upsert하고 영향 받은
    /// 행 수를 반환합니다.
    async fn bulk_upsert(&mut self, records: &[DailyBar]) -> Result<u64>;

    /// 트랜잭션을 커밋합니다.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// 트랜잭션을 롤백합니다.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
