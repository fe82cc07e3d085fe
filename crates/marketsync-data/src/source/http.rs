//! HTTP 시세 API 클라이언트.
//!
//! 일봉 히스토리와 실시간 스냅샷 엔드포인트를 제공하는 JSON API를
//! 호출합니다. 응답 상태를 엔진의 오류 분류로 매핑하는 것까지가 이
//! 모듈의 책임입니다. 재시도와 pacing은 호출자 몫입니다.

use crate::error::{DataError, Result};
use crate::source::DataSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use marketsync_core::{DailyBar, FetchCategory};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// HTTP 소스 설정.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// API base URL
    pub base_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

/// HTTP 시세 소스.
#[derive(Clone)]
pub struct HttpDataSource {
    client: Client,
    base_url: String,
}

impl HttpDataSource {
    /// 새 클라이언트를 만듭니다.
    pub fn new(config: &HttpSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 응답 상태 코드를 엔진 오류 분류로 매핑합니다.
    fn check_status(response: Response, subject_id: &str) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            let retry_after = parse_retry_after(&response);
            return Err(DataError::Throttled { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DataError::NotFound(subject_id.to_string()));
        }
        if status.is_server_error() {
            return Err(DataError::Transient(format!("upstream returned {}", status)));
        }
        if !status.is_success() {
            return Err(DataError::ParseError(format!("unexpected status {}", status)));
        }

        Ok(response)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(
        &self,
        subject_id: &str,
        category: FetchCategory,
        range_start: NaiveDate,
        range_end: Option<NaiveDate>,
    ) -> Result<Vec<DailyBar>> {
        let url = match category {
            FetchCategory::DailyBars => {
                let mut url = format!(
                    "{}/api/v1/daily?symbol={}&start={}",
                    self.base_url,
                    subject_id,
                    range_start.format("%Y-%m-%d")
                );
                if let Some(end) = range_end {
                    url.push_str(&format!("&end={}", end.format("%Y-%m-%d")));
                }
                url
            }
            FetchCategory::Quote => {
                format!("{}/api/v1/quote?symbol={}", self.base_url, subject_id)
            }
        };

        let response = self.client.get(&url).send().await?;
        let response = Self::check_status(response, subject_id)?;

        let body: RawResponse = response
            .json()
            .await
            .map_err(|e| DataError::ParseError(e.to_string()))?;

        if body.code != 0 {
            let message = body.message.unwrap_or_default();
            return Err(DataError::Transient(format!(
                "upstream code {}: {}",
                body.code, message
            )));
        }

        let bars = body
            .data
            .iter()
            .map(|raw| raw.to_bar(subject_id))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subject_id,
            category = %category,
            rows = bars.len(),
            "시세 응답 수신"
        );

        Ok(bars)
    }
}

/// Retry-After 헤더. 초 단위 숫자 형식만 지원합니다.
fn parse_retry_after(response: &Response) -> Option<f64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

// ============================================================
// 응답 파싱
// ============================================================

/// API 응답 envelope.
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<RawBar>,
}

/// 일봉 한 건의 원시 표현. 숫자 필드는 문자열로 옵니다.
#[derive(Debug, Deserialize)]
struct RawBar {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    #[serde(default)]
    turnover: Option<String>,
}

impl RawBar {
    /// 도메인 레코드로 변환합니다.
    fn to_bar(&self, subject_id: &str) -> Result<DailyBar> {
        Ok(DailyBar {
            subject_id: subject_id.to_string(),
            trade_date: parse_date(&self.date)?,
            open: parse_decimal(&self.open)?,
            high: parse_decimal(&self.high)?,
            low: parse_decimal(&self.low)?,
            close: parse_decimal(&self.close)?,
            volume: parse_decimal(&self.volume)?,
            turnover: match &self.turnover {
                Some(raw) if !raw.trim().is_empty() => Some(parse_decimal(raw)?),
                _ => None,
            },
        })
    }
}

/// 쉼표가 섞인 숫자 문자열을 Decimal로 파싱합니다.
fn parse_decimal(raw: &str) -> Result<Decimal> {
    let cleaned = raw.trim().replace(',', "");
    Decimal::from_str(&cleaned)
        .map_err(|e| DataError::ParseError(format!("bad number {:?}: {}", raw, e)))
}

/// YYYY-MM-DD 형식 날짜를 파싱합니다.
fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| DataError::ParseError(format!("bad date {:?}: {}", raw, e)))
}
