//! fingerprint 기반 2계층 캐시.
//!
//! # 동작 방식
//!
//! 1. `get`은 휘발 계층을 먼저 보고, 없으면 내구 계층을 봅니다
//! 2. 내구 계층 hit는 휘발 계층으로 승격됩니다
//! 3. `set`은 기본적으로 두 계층 모두에 기록하고, 휘발 전용 지정도 가능합니다
//! 4. 만료는 느긋하게 처리합니다: 수명이 지난 항목은 조회 시 miss로 취급하고 제거
//! 5. 내구 계층 장애는 경고 로그 후 휘발 전용으로 동작합니다. 호출자는 중단되지 않습니다

pub mod fingerprint;
pub mod memory;
pub mod redis;

pub use fingerprint::fingerprint;
pub use memory::MemoryTier;
pub use redis::{RedisTier, RedisTierConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketsync_core::FetchCategory;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================
// 캐시 항목
// ============================================================

/// 캐시 계층 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheTier {
    /// 프로세스 수명 (메모리)
    Volatile,
    /// 재시작에도 유지 (Redis)
    Durable,
}

/// 캐시에 저장되는 envelope.
///
/// payload는 한 번 기록되면 바뀌지 않습니다. 같은 fingerprint를 다시
/// 가져오면 기존 항목을 고치는 게 아니라 새 항목으로 교체합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub fingerprint: String,
    pub payload: T,
    pub created_at: DateTime<Utc>,
    /// 수명 (초). 넘기면 조회 대상에서 빠집니다
    pub ttl_secs: f64,
    pub tier: CacheTier,
}

impl<T> CacheEntry<T> {
    /// `now` 기준으로 수명이 지났는지 판정합니다.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).to_std().unwrap_or_default();
        age > Duration::from_secs_f64(self.ttl_secs.max(0.0))
    }
}

// ============================================================
// 내구 계층 인터페이스
// ============================================================

/// 내구 계층 계약.
///
/// 직렬화된 envelope 문자열을 저장합니다. 구현체는 TTL 이후 항목이
/// 조회되지 않게만 하면 됩니다 (저장소 자체 만료 허용).
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn get_raw(&self, fingerprint: &str) -> Result<Option<String>>;

    async fn set_raw(&self, fingerprint: &str, raw: &str, ttl: Duration) -> Result<()>;

    async fn remove(&self, fingerprint: &str) -> Result<()>;
}

// ============================================================
// 캐시 정책
// ============================================================

/// 데이터 분류별 캐시 정책: TTL과 내구 계층 기록 여부.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub durable: bool,
}

impl CachePolicy {
    /// 분류별 기본 정책.
    ///
    /// 일봉 히스토리는 오래 두고 (7일) 내구 계층까지, 실시간 스냅샷은
    /// 짧게 (120초) 휘발 계층만 씁니다.
    pub fn for_category(category: FetchCategory) -> Self {
        match category {
            FetchCategory::DailyBars => Self {
                ttl: Duration::from_secs(7 * 24 * 3600),
                durable: true,
            },
            FetchCategory::Quote => Self {
                ttl: Duration::from_secs(120),
                durable: false,
            },
        }
    }
}

/// 캐시 hit/miss 통계 스냅샷.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub volatile_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

// ============================================================
// 2계층 캐시
// ============================================================

/// fingerprint 키 2계층 캐시.
///
/// 내구 계층 없이 만들면 (`durable = None`) 휘발 전용으로 동작합니다.
pub struct TieredCache<T> {
    memory: MemoryTier<T>,
    durable: Option<Arc<dyn DurableTier>>,
    volatile_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> TieredCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(durable: Option<Arc<dyn DurableTier>>) -> Self {
        Self {
            memory: MemoryTier::new(),
            durable,
            volatile_hits: AtomicU64::new(0),
            durable_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// fingerprint로 조회합니다.
    ///
    /// 휘발 계층 우선, 내구 계층 hit는 남은 수명 그대로 휘발 계층으로
    /// 승격됩니다. 내구 계층 오류는 miss로 취급합니다.
    pub async fn get(&self, fingerprint: &str) -> Option<T> {
        let now = Utc::now();

        if let Some(entry) = self.memory.get(fingerprint, now).await {
            self.volatile_hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.payload);
        }

        let Some(durable) = self.durable.as_ref() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let raw = match durable.get_raw(fingerprint).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                warn!(fingerprint, error = %e, "내구 계층 조회 실패, 휘발 전용으로 계속");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(mut entry) if !entry.is_expired(now) => {
                entry.tier = CacheTier::Volatile;
                self.memory.set(entry.clone()).await;
                self.durable_hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint, "내구 계층 hit, 휘발 계층으로 승격");
                Some(entry.payload)
            }
            Ok(_) => {
                // 만료된 항목은 내구 계층에서도 걷어냅니다
                let _ = durable.remove(fingerprint).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(fingerprint, error = %e, "캐시 envelope 파싱 실패, 항목 폐기");
                let _ = durable.remove(fingerprint).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 두 계층 모두에 기록합니다.
    pub async fn set(&self, fingerprint: &str, payload: T, ttl: Duration) {
        self.store(fingerprint, payload, ttl, true).await;
    }

    /// 휘발 계층에만 기록합니다 (수명이 짧은 분류용).
    pub async fn set_volatile(&self, fingerprint: &str, payload: T, ttl: Duration) {
        self.store(fingerprint, payload, ttl, false).await;
    }

    /// 분류 정책에 따라 기록합니다.
    pub async fn set_with_policy(&self, fingerprint: &str, payload: T, policy: CachePolicy) {
        self.store(fingerprint, payload, policy.ttl, policy.durable).await;
    }

    async fn store(&self, fingerprint: &str, payload: T, ttl: Duration, durable: bool) {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            payload,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs_f64(),
            tier: CacheTier::Volatile,
        };
        self.memory.set(entry.clone()).await;

        if !durable {
            return;
        }
        let Some(tier) = self.durable.as_ref() else {
            return;
        };

        let durable_entry = CacheEntry {
            tier: CacheTier::Durable,
            ..entry
        };
        match serde_json::to_string(&durable_entry) {
            Ok(raw) => {
                if let Err(e) = tier.set_raw(fingerprint, &raw, ttl).await {
                    warn!(fingerprint, error = %e, "내구 계층 기록 실패, 휘발 전용으로 계속");
                }
            }
            Err(e) => warn!(fingerprint, error = %e, "캐시 envelope 직렬화 실패"),
        }
    }

    /// 만료된 휘발 항목을 정리하고 제거 개수를 반환합니다.
    pub async fn compact(&self) -> usize {
        self.memory.compact(Utc::now()).await
    }

    /// 통계 스냅샷.
    pub fn stats(&self) -> CacheStats {
        let volatile_hits = self.volatile_hits.load(Ordering::Relaxed);
        let durable_hits = self.durable_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = volatile_hits + durable_hits + misses;

        CacheStats {
            volatile_hits,
            durable_hits,
            misses,
            hit_rate: if total > 0 {
                (volatile_hits + durable_hits) as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}
