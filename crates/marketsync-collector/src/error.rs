//! 에러 타입 정의.

use crate::stats::SyncRun;
use marketsync_data::DataError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터 계층 에러 (캐시, 저장소, 소스)
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 마지막 flush 실패. 그 시점까지의 부분 실행 요약을 함께 전달합니다
    Finalize {
        source: DataError,
        summary: Box<SyncRun>,
    },
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Data(e) => write!(f, "Data error: {}", e),
            CollectorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CollectorError::Finalize { source, summary } => write!(
                f,
                "Finalize flush failed after {} subjects: {}",
                summary.attempted, source
            ),
            CollectorError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        CollectorError::Data(err)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        CollectorError::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CollectorError::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
