//! 휘발성 (프로세스 수명) 캐시 계층.

use crate::cache::CacheEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 메모리 내 휘발 계층.
///
/// 만료는 느긋하게 처리합니다: 조회가 만료된 항목을 만나면 그 자리에서
/// 제거하고 miss로 취급합니다. 주기적인 `compact`는 메모리 상한을 위한
/// 선택 사항이지 정합성에 필요한 것이 아닙니다.
pub struct MemoryTier<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> MemoryTier<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 만료되지 않은 항목을 조회합니다.
    pub async fn get(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<CacheEntry<T>> {
        {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // 만료된 항목은 그 자리에서 제거
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(fingerprint) {
            if entry.is_expired(now) {
                entries.remove(fingerprint);
            } else {
                // 잠금 전환 사이에 같은 키가 새로 쓰였으면 그대로 반환
                return Some(entry.clone());
            }
        }
        None
    }

    /// 항목을 저장합니다. 같은 fingerprint는 덮어씁니다.
    pub async fn set(&self, entry: CacheEntry<T>) {
        let mut entries = self.entries.write().await;
        entries.insert(entry.fingerprint.clone(), entry);
    }

    pub async fn remove(&self, fingerprint: &str) {
        self.entries.write().await.remove(fingerprint);
    }

    /// 만료된 항목을 일괄 제거하고 제거한 개수를 반환합니다.
    pub async fn compact(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Clone> Default for MemoryTier<T> {
    fn default() -> Self {
        Self::new()
    }
}
