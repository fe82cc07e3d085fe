//! 요청 fingerprint 생성.

use chrono::NaiveDate;
use marketsync_core::FetchCategory;
use sha2::{Digest, Sha256};

/// 요청 파라미터로부터 결정적 캐시 키를 만듭니다.
///
/// 같은 입력은 항상 같은 fingerprint가 되고, 파라미터가 하나라도 다르면
/// 다른 fingerprint가 됩니다 (SHA-256, 64자리 hex).
pub fn fingerprint(
    subject_id: &str,
    category: FetchCategory,
    range_start: NaiveDate,
    range_end: Option<NaiveDate>,
) -> String {
    let canonical = match range_end {
        Some(end) => format!(
            "{}|{}|{}|{}",
            subject_id,
            category.as_str(),
            range_start,
            end
        ),
        None => format!("{}|{}|{}|latest", subject_id, category.as_str(), range_start),
    };

    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_deterministic() {
        let a = fingerprint("000001", FetchCategory::DailyBars, d(2024, 1, 2), None);
        let b = fingerprint("000001", FetchCategory::DailyBars, d(2024, 1, 2), None);

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_any_parameter_changes_the_key() {
        let base = fingerprint("000001", FetchCategory::DailyBars, d(2024, 1, 2), None);

        assert_ne!(
            base,
            fingerprint("000002", FetchCategory::DailyBars, d(2024, 1, 2), None)
        );
        assert_ne!(
            base,
            fingerprint("000001", FetchCategory::Quote, d(2024, 1, 2), None)
        );
        assert_ne!(
            base,
            fingerprint("000001", FetchCategory::DailyBars, d(2024, 1, 3), None)
        );
        assert_ne!(
            base,
            fingerprint(
                "000001",
                FetchCategory::DailyBars,
                d(2024, 1, 2),
                Some(d(2024, 2, 1))
            )
        );
    }

    proptest! {
        #[test]
        fn prop_same_input_same_output(subject in "[0-9]{6}", days in 0i64..3650) {
            let start = d(2015, 1, 1) + chrono::Duration::days(days);

            let x = fingerprint(&subject, FetchCategory::DailyBars, start, None);
            let y = fingerprint(&subject, FetchCategory::DailyBars, start, None);
            prop_assert_eq!(x, y);
        }
    }
}
