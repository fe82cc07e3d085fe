//! 데이터 모듈 오류 타입.

use std::time::Duration;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 트랜잭션 오류
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 업스트림 rate limit 응답. `retry_after`는 초 단위
    #[error("Throttled by upstream (retry after {retry_after:?}s)")]
    Throttled { retry_after: Option<f64> },

    /// 요청한 subject/범위에 데이터가 정말 없음 (재시도 대상 아님)
    #[error("No data for subject: {0}")]
    NotFound(String),

    /// 일시적 업스트림 오류 (재시도 대상)
    #[error("Transient upstream error: {0}")]
    Transient(String),

    /// 요청 타임아웃 (재시도 대상)
    #[error("Request timed out")]
    Timeout,

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DataError {
    /// 재시도해도 되는 오류인지 판정합니다.
    ///
    /// `NotFound`는 데이터가 정말 없다는 뜻이므로 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::Throttled { .. } | DataError::Transient(_) | DataError::Timeout
        )
    }

    /// rate limit 신호 여부.
    pub fn is_throttle(&self) -> bool {
        matches!(self, DataError::Throttled { .. })
    }

    /// 업스트림이 알려준 대기 시간.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DataError::Throttled {
                retry_after: Some(secs),
            } if *secs >= 0.0 => Some(Duration::from_secs_f64(*secs)),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::QueryError("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout
        } else if err.is_decode() {
            DataError::ParseError(err.to_string())
        } else {
            DataError::Transient(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DataError::Timeout.is_retryable());
        assert!(DataError::Transient("connection reset".to_string()).is_retryable());
        assert!(DataError::Throttled { retry_after: None }.is_retryable());

        assert!(!DataError::NotFound("000001".to_string()).is_retryable());
        assert!(!DataError::ParseError("bad json".to_string()).is_retryable());
        assert!(!DataError::QueryError("syntax".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after_seconds() {
        let err = DataError::Throttled {
            retry_after: Some(2.5),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs_f64(2.5)));

        assert!(DataError::Throttled { retry_after: None }.retry_after().is_none());
        assert!(DataError::Timeout.retry_after().is_none());
    }
}
