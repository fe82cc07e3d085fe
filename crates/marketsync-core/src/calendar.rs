//! 거래일 계산 유틸리티.
//!
//! 주말만 고려합니다. 공휴일 판정은 거래소 캘린더 없이는 할 수 없으므로
//! 여기서 추정하지 않습니다.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// 기준일 이전(포함)의 가장 최근 거래일을 반환합니다.
///
/// 토요일과 일요일은 직전 금요일로 되돌립니다.
pub fn most_recent_trading_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// 주말 여부.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekday_passes_through() {
        // 2024-01-03은 수요일
        assert_eq!(most_recent_trading_day(d(2024, 1, 3)), d(2024, 1, 3));
    }

    #[test]
    fn test_saturday_rolls_back_to_friday() {
        // 2024-01-06 토요일 -> 2024-01-05 금요일
        assert_eq!(most_recent_trading_day(d(2024, 1, 6)), d(2024, 1, 5));
    }

    #[test]
    fn test_sunday_rolls_back_to_friday() {
        assert_eq!(most_recent_trading_day(d(2024, 1, 7)), d(2024, 1, 5));
    }

    #[test]
    fn test_is_weekend() {
        assert!(is_weekend(d(2024, 1, 6)));
        assert!(is_weekend(d(2024, 1, 7)));
        assert!(!is_weekend(d(2024, 1, 8)));
    }

    proptest! {
        #[test]
        fn prop_result_is_never_a_weekend(days in 0i64..20_000) {
            let date = d(1990, 1, 1) + Duration::days(days);
            let rolled = most_recent_trading_day(date);

            prop_assert!(!is_weekend(rolled));
            prop_assert!(rolled <= date);
            prop_assert!(date - rolled <= Duration::days(2));
        }
    }
}
