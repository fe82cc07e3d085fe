//! 트랜잭션 배치 accumulator.
//!
//! 여러 worker가 가져온 레코드를 모아 임계값에 도달하면 한 트랜잭션으로
//! 영구 저장소에 bulk upsert합니다.
//!
//! # 불변식
//!
//! - 버퍼 길이는 flush를 트리거하지 않고는 threshold를 넘지 못합니다
//! - flush는 원자적입니다: 전부 커밋되거나 전부 롤백됩니다
//! - 버퍼는 커밋이 성공한 뒤에만 비웁니다. 실패하면 레코드는 남아서
//!   다음 flush에서 다시 시도됩니다

use crate::error::Result;
use crate::storage::PersistentStore;
use marketsync_core::DailyBar;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 누적 버퍼 상태. `BatchAccumulator`의 Mutex 안에서만 접근합니다.
#[derive(Debug, Default)]
struct Buffer {
    records: Vec<DailyBar>,
    subject_count: usize,
}

/// 배치 accumulator.
pub struct BatchAccumulator {
    store: Arc<dyn PersistentStore>,
    threshold: usize,
    buffer: Mutex<Buffer>,
    flushed_total: AtomicU64,
}

impl BatchAccumulator {
    /// 새 accumulator를 만듭니다. threshold는 1 미만이면 1로 올립니다.
    pub fn new(store: Arc<dyn PersistentStore>, threshold: usize) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
            buffer: Mutex::new(Buffer::default()),
            flushed_total: AtomicU64::new(0),
        }
    }

    /// 레코드를 버퍼에 추가합니다. threshold에 도달하면 반환 전에
    /// 동기적으로 flush합니다. flush가 일어났으면 true를 반환합니다.
    ///
    /// flush 실패는 오류로 전파되지만 추가된 레코드는 버퍼에 남아
    /// 다음 flush에서 다시 시도됩니다.
    pub async fn add(&self, subject_id: &str, records: Vec<DailyBar>) -> Result<bool> {
        let mut buffer = self.buffer.lock().await;
        buffer.records.extend(records);
        buffer.subject_count += 1;

        debug!(
            subject_id,
            buffered = buffer.records.len(),
            threshold = self.threshold,
            "배치 버퍼에 추가"
        );

        if buffer.records.len() >= self.threshold {
            self.flush_buffer(&mut buffer).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 버퍼에 있는 모든 레코드를 한 트랜잭션으로 저장합니다.
    pub async fn flush(&self) -> Result<u64> {
        let mut buffer = self.buffer.lock().await;
        self.flush_buffer(&mut buffer).await
    }

    /// 더 이상 add가 없을 때 호출하는 마지막 무조건 flush.
    pub async fn finalize(&self) -> Result<u64> {
        self.flush().await
    }

    /// 현재 버퍼에 있는 레코드 수.
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.records.len()
    }

    /// 지금까지 커밋에 성공한 레코드 수 누계.
    pub fn total_flushed(&self) -> u64 {
        self.flushed_total.load(Ordering::Relaxed)
    }

    async fn flush_buffer(&self, buffer: &mut Buffer) -> Result<u64> {
        if buffer.records.is_empty() {
            return Ok(0);
        }

        let mut txn = self.store.begin().await?;
        let upserted = match txn.bulk_upsert(&buffer.records).await {
            Ok(count) => count,
            Err(err) => {
                // 명시적 롤백. 실패해도 트랜잭션 drop이 마저 정리합니다
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "트랜잭션 롤백 실패");
                }
                return Err(err);
            }
        };
        txn.commit().await?;

        info!(
            upserted,
            records = buffer.records.len(),
            subjects = buffer.subject_count,
            "배치 flush 완료"
        );

        self.flushed_total.fetch_add(upserted, Ordering::Relaxed);
        buffer.records.clear();
        buffer.subject_count = 0;
        Ok(upserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn bar(subject: &str, day_offset: i64) -> DailyBar {
        DailyBar {
            subject_id: subject.to_string(),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(day_offset),
            open: Decimal::new(1000, 2),
            high: Decimal::new(1050, 2),
            low: Decimal::new(990, 2),
            close: Decimal::new(1020, 2),
            volume: Decimal::new(150_000, 0),
            turnover: None,
        }
    }

    #[tokio::test]
    async fn test_flush_triggers_exactly_at_threshold() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store.clone()), 100);

        let mut flushes = 0;
        for i in 0..250 {
            if batch.add("000001", vec![bar("000001", i)]).await.unwrap() {
                flushes += 1;
            }
        }

        assert_eq!(flushes, 2);
        assert_eq!(batch.buffered().await, 50);
        assert_eq!(store.len().await, 200);

        batch.finalize().await.unwrap();
        assert_eq!(batch.buffered().await, 0);
        assert_eq!(store.len().await, 250);
        assert_eq!(batch.total_flushed(), 250);
    }

    #[tokio::test]
    async fn test_add_below_threshold_does_not_flush() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store.clone()), 10);

        let flushed = batch
            .add("000001", vec![bar("000001", 0), bar("000001", 1)])
            .await
            .unwrap();

        assert!(!flushed);
        assert_eq!(batch.buffered().await, 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_buffer_intact() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store.clone()), 100);

        for i in 0..5 {
            batch.add("000001", vec![bar("000001", i)]).await.unwrap();
        }

        store.fail_next_commit();
        assert!(batch.flush().await.is_err());

        // 실패한 flush는 아무것도 남기지 않고 버퍼도 그대로입니다
        assert_eq!(store.len().await, 0);
        assert_eq!(batch.buffered().await, 5);
        assert_eq!(batch.total_flushed(), 0);

        // 다음 flush에서 같은 레코드가 다시 시도됩니다
        assert_eq!(batch.flush().await.unwrap(), 5);
        assert_eq!(store.len().await, 5);
        assert_eq!(batch.buffered().await, 0);
    }

    #[tokio::test]
    async fn test_failed_upsert_rolls_back() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store.clone()), 100);

        batch.add("000001", vec![bar("000001", 0)]).await.unwrap();

        store.fail_next_upsert();
        assert!(batch.flush().await.is_err());

        assert_eq!(store.len().await, 0);
        assert_eq!(batch.buffered().await, 1);
    }

    #[tokio::test]
    async fn test_empty_flush_is_a_noop() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store), 10);

        assert_eq!(batch.flush().await.unwrap(), 0);
        assert_eq!(batch.finalize().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_threshold_reached_by_multi_record_add() {
        let store = MemoryStore::new();
        let batch = BatchAccumulator::new(Arc::new(store.clone()), 3);

        // 한 번의 add가 threshold를 넘어도 flush는 한 번입니다
        let records = vec![bar("000001", 0), bar("000001", 1), bar("000001", 2), bar("000001", 3)];
        let flushed = batch.add("000001", records).await.unwrap();

        assert!(flushed);
        assert_eq!(batch.buffered().await, 0);
        assert_eq!(store.len().await, 4);
    }
}
