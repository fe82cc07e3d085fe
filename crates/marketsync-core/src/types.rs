//! 도메인 타입 정의.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 하루치 시세 레코드 (일봉).
///
/// 업스트림 소스에서 가져와 영구 저장소에 upsert되는 기본 단위입니다.
/// (subject_id, trade_date)가 자연 키입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// 종목 코드 (예: "000001")
    pub subject_id: String,
    /// 거래일
    pub trade_date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량 (주)
    pub volume: Decimal,
    /// 거래대금. 소스에 따라 없을 수 있습니다
    pub turnover: Option<Decimal>,
}

/// 가져오기 데이터 분류.
///
/// cache TTL과 내구 계층 기록 여부가 분류에 따라 달라집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchCategory {
    /// 일봉 히스토리. 장기 cache, 내구 계층까지 기록
    DailyBars,
    /// 실시간 스냅샷. 단기 cache, 휘발 계층만
    Quote,
}

impl FetchCategory {
    /// cache 키와 로그에 쓰는 식별 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyBars => "daily",
            Self::Quote => "quote",
        }
    }
}

impl std::fmt::Display for FetchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_identifiers() {
        assert_eq!(FetchCategory::DailyBars.as_str(), "daily");
        assert_eq!(FetchCategory::Quote.as_str(), "quote");
        assert_eq!(format!("{}", FetchCategory::DailyBars), "daily");
    }

    #[test]
    fn test_daily_bar_serde_roundtrip() {
        let bar = DailyBar {
            subject_id: "000001".to_string(),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Decimal::new(1001, 2),
            high: Decimal::new(1020, 2),
            low: Decimal::new(995, 2),
            close: Decimal::new(1011, 2),
            volume: Decimal::new(1_284_500, 0),
            turnover: Some(Decimal::new(1_290_500_000, 2)),
        };

        let json = serde_json::to_string(&bar).unwrap();
        let parsed: DailyBar = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bar);
    }
}
