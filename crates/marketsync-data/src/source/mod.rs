//! 외부 시세 소스 인터페이스와 구현.

pub mod http;

pub use http::{HttpDataSource, HttpSourceConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use marketsync_core::{DailyBar, FetchCategory};

/// 외부 시세 소스 계약.
///
/// 실패 모드 구분이 계약의 일부입니다:
/// - `DataError::Throttled`: rate limit 응답. `retry_after`가 올 수 있습니다
/// - `DataError::NotFound`: subject/범위에 데이터가 정말 없음 (재시도 금지)
/// - `DataError::Transient` / `Timeout`: 일시적 장애 (재시도 대상)
#[async_trait]
pub trait DataSource: Send + Sync {
    /// subject의 시세를 가져옵니다. `range_end`가 None이면 최신까지입니다.
    ///
    /// 범위 안에 거래일이 없으면 빈 Vec을 반환합니다.
    async fn fetch(
        &self,
        subject_id: &str,
        category: FetchCategory,
        range_start: NaiveDate,
        range_end: Option<NaiveDate>,
    ) -> Result<Vec<DailyBar>>;
}
