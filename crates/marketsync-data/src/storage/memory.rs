//! 메모리 내 영구 저장소 구현.
//!
//! PostgreSQL 없이 엔진을 돌리는 개발/테스트용입니다. 키 의미는
//! `PgStore`와 같고 ((subject_id, trade_date) upsert), 커밋/업서트
//! 실패를 주입할 수 있습니다.

use crate::error::{DataError, Result};
use crate::storage::{PersistentStore, StoreTransaction};
use async_trait::async_trait;
use chrono::NaiveDate;
use marketsync_core::DailyBar;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type BarKey = (String, NaiveDate);

/// 메모리 저장소.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<BarKey, DailyBar>>>,
    fail_next_commit: Arc<AtomicBool>,
    fail_next_upsert: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 트랜잭션 없이 데이터를 미리 넣어둡니다.
    pub async fn seed(&self, records: Vec<DailyBar>) {
        let mut rows = self.rows.lock().await;
        for bar in records {
            rows.insert((bar.subject_id.clone(), bar.trade_date), bar);
        }
    }

    /// 저장된 행 수.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// subject의 모든 행 (거래일 오름차순).
    pub async fn rows_for(&self, subject_id: &str) -> Vec<DailyBar> {
        let rows = self.rows.lock().await;
        rows.values()
            .filter(|bar| bar.subject_id == subject_id)
            .cloned()
            .collect()
    }

    /// 다음 commit 한 번을 실패시킵니다.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// 다음 bulk_upsert 한 번을 실패시킵니다.
    pub fn fail_next_upsert(&self) {
        self.fail_next_upsert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
        }))
    }

    async fn latest_date_for(&self, subject_id: &str) -> Result<Option<NaiveDate>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .keys()
            .filter(|(id, _)| id.as_str() == subject_id)
            .map(|(_, date)| *date)
            .max())
    }

    async fn has_any_data(&self, subject_id: &str) -> Result<bool> {
        let rows = self.rows.lock().await;
        Ok(rows.keys().any(|(id, _)| id.as_str() == subject_id))
    }
}

/// 커밋 전까지 쓰기를 버퍼에 들고 있는 트랜잭션.
struct MemoryTransaction {
    store: MemoryStore,
    pending: Vec<DailyBar>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn bulk_upsert(&mut self, records: &[DailyBar]) -> Result<u64> {
        if self.store.fail_next_upsert.swap(false, Ordering::SeqCst) {
            return Err(DataError::InsertError("injected upsert failure".to_string()));
        }
        self.pending.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.store.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(DataError::TransactionError(
                "injected commit failure".to_string(),
            ));
        }

        let mut rows = self.store.rows.lock().await;
        for bar in self.pending {
            rows.insert((bar.subject_id.clone(), bar.trade_date), bar);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn bar(subject: &str, y: i32, m: u32, d: u32) -> DailyBar {
        DailyBar {
            subject_id: subject.to_string(),
            trade_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: Decimal::new(1000, 2),
            high: Decimal::new(1050, 2),
            low: Decimal::new(990, 2),
            close: Decimal::new(1020, 2),
            volume: Decimal::new(10_000, 0),
            turnover: None,
        }
    }

    #[tokio::test]
    async fn test_seed_and_queries() {
        let store = MemoryStore::new();
        store
            .seed(vec![
                bar("000001", 2024, 1, 2),
                bar("000001", 2024, 1, 3),
                bar("000002", 2024, 1, 2),
            ])
            .await;

        assert_eq!(store.len().await, 3);
        assert!(store.has_any_data("000001").await.unwrap());
        assert!(!store.has_any_data("000003").await.unwrap());
        assert_eq!(
            store.latest_date_for("000001").await.unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
        );
        assert_eq!(store.latest_date_for("000003").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.bulk_upsert(&[bar("000001", 2024, 1, 2)]).await.unwrap();
        assert_eq!(store.len().await, 0);

        txn.commit().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.bulk_upsert(&[bar("000001", 2024, 1, 2)]).await.unwrap();
        txn.rollback().await.unwrap();

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.fail_next_commit();

        let mut txn = store.begin().await.unwrap();
        txn.bulk_upsert(&[bar("000001", 2024, 1, 2)]).await.unwrap();
        assert!(txn.commit().await.is_err());
        assert_eq!(store.len().await, 0);

        // 실패는 한 번만 주입됩니다
        let mut txn = store.begin().await.unwrap();
        txn.bulk_upsert(&[bar("000001", 2024, 1, 2)]).await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let store = MemoryStore::new();

        let mut first = bar("000001", 2024, 1, 2);
        first.close = Decimal::new(1111, 2);
        store.seed(vec![first]).await;

        let mut txn = store.begin().await.unwrap();
        txn.bulk_upsert(&[bar("000001", 2024, 1, 2)]).await.unwrap();
        txn.commit().await.unwrap();

        let rows = store.rows_for("000001").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Decimal::new(1020, 2));
    }
}
