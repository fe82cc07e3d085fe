//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use marketsync_data::{RateLimiterConfig, RetryConfig};
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// Redis URL. 없으면 내구 캐시 계층 없이 동작합니다
    pub redis_url: Option<String>,
    /// 시세 API base URL
    pub source_base_url: String,
    /// 동기화 설정
    pub sync: SyncTuning,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 동기화 동작 설정
#[derive(Debug, Clone)]
pub struct SyncTuning {
    /// 배치 flush 임계값 (레코드 수)
    pub batch_size: usize,
    /// 동시 fetch worker 수
    pub max_workers: usize,
    /// 신규 subject 초기 수집 기간 (일)
    pub lookback_days: i64,
    /// fetch 시도당 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 요청 간격 하한 (ms)
    pub rate_floor_ms: u64,
    /// 요청 간격 상한 (초)
    pub rate_ceiling_secs: u64,
    /// 첫 시도 이후 재시도 횟수
    pub max_retries: u32,
    /// 기본 subject 목록 (쉼표 구분, CLI --subjects 미지정 시)
    pub subjects: Option<String>,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 동기화 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let source_base_url = std::env::var("SOURCE_BASE_URL").map_err(|_| {
            CollectorError::Config("SOURCE_BASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        Ok(Self {
            database_url,
            redis_url: std::env::var("REDIS_URL").ok(),
            source_base_url,
            sync: SyncTuning {
                batch_size: env_var_parse("SYNC_BATCH_SIZE", 100),
                max_workers: env_var_parse("SYNC_MAX_WORKERS", 10),
                lookback_days: env_var_parse("SYNC_LOOKBACK_DAYS", 180),
                fetch_timeout_secs: env_var_parse("SYNC_FETCH_TIMEOUT_SECS", 30),
                rate_floor_ms: env_var_parse("SYNC_RATE_FLOOR_MS", 500),
                rate_ceiling_secs: env_var_parse("SYNC_RATE_CEILING_SECS", 30),
                max_retries: env_var_parse("SYNC_MAX_RETRIES", 5),
                subjects: std::env::var("SYNC_SUBJECTS").ok(),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }
}

impl SyncTuning {
    /// fetch 시도당 타임아웃을 Duration으로 반환
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// rate limiter 설정으로 변환
    pub fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            initial_interval: Duration::from_millis(self.rate_floor_ms),
            floor_interval: Duration::from_millis(self.rate_floor_ms),
            ceiling_interval: Duration::from_secs(self.rate_ceiling_secs),
            ..Default::default()
        }
    }

    /// 재시도 설정으로 변환
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..Default::default()
        }
    }

    /// 쉼표로 구분된 기본 subject 목록
    pub fn subject_list(&self) -> Vec<String> {
        self.subjects.as_deref().map(split_subjects).unwrap_or_default()
    }
}

impl DaemonConfig {
    /// 동기화 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 쉼표 구분 문자열을 subject 목록으로 변환
pub fn split_subjects(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_subjects() {
        assert_eq!(
            split_subjects("000001, 000002 ,000003"),
            vec!["000001", "000002", "000003"]
        );
        assert_eq!(split_subjects(""), Vec::<String>::new());
        assert_eq!(split_subjects("000001,,"), vec!["000001"]);
    }

    #[test]
    fn test_limiter_config_mapping() {
        let tuning = SyncTuning {
            batch_size: 100,
            max_workers: 10,
            lookback_days: 180,
            fetch_timeout_secs: 30,
            rate_floor_ms: 250,
            rate_ceiling_secs: 10,
            max_retries: 3,
            subjects: None,
        };

        let limiter = tuning.limiter_config();
        assert_eq!(limiter.floor_interval, Duration::from_millis(250));
        assert_eq!(limiter.ceiling_interval, Duration::from_secs(10));
        assert_eq!(tuning.retry_config().max_retries, 3);
    }
}
