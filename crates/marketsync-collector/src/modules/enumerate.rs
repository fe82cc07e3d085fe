//! subject 분류와 작업 목록 생성.
//!
//! 저장소 상태를 보고 subject마다 가져올 범위와 우선순위를 정합니다.
//! MISSING(데이터 전무)이 STALE(최신일 뒤처짐)보다 먼저이고, 같은
//! 우선순위 안에서는 입력 순서를 유지합니다.

use crate::error::Result;
use chrono::{Duration, NaiveDate};
use marketsync_core::calendar::most_recent_trading_day;
use marketsync_data::storage::PersistentStore;
use tracing::debug;

/// 작업 우선순위. 낮은 값이 먼저 처리됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// 저장소에 레코드가 전혀 없음
    Missing,
    /// 최신 저장일이 기대 거래일보다 과거
    Stale,
    /// 최신 상태. 전체 재수집 요청 시에만 목록에 들어갑니다
    Current,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Missing => "missing",
            Priority::Stale => "stale",
            Priority::Current => "current",
        }
    }
}

/// subject 하나의 동기화 작업.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub subject_id: String,
    /// 가져올 범위 시작일
    pub range_start: NaiveDate,
    /// 범위 종료일. None이면 최신까지
    pub range_end: Option<NaiveDate>,
    pub priority: Priority,
    /// 지금까지 실행된 fetch 시도 횟수
    pub attempt_count: u32,
}

/// 저장소 상태를 기준으로 작업 목록을 만듭니다.
///
/// `force_full`이 아니면 CURRENT subject는 빠집니다. 반환 목록은
/// 우선순위 오름차순이고, 같은 우선순위 안에서는 `subjects` 순서를
/// 그대로 따릅니다.
pub async fn enumerate_work(
    store: &dyn PersistentStore,
    subjects: &[String],
    today: NaiveDate,
    lookback_days: i64,
    force_full: bool,
) -> Result<Vec<WorkItem>> {
    let expected = most_recent_trading_day(today);
    let backfill_start = today - Duration::days(lookback_days);
    let mut items = Vec::with_capacity(subjects.len());

    for subject_id in subjects {
        let item = if !store.has_any_data(subject_id).await? {
            Some(WorkItem {
                subject_id: subject_id.clone(),
                range_start: backfill_start,
                range_end: None,
                priority: Priority::Missing,
                attempt_count: 0,
            })
        } else {
            match store.latest_date_for(subject_id).await? {
                Some(latest) if latest < expected => Some(WorkItem {
                    subject_id: subject_id.clone(),
                    range_start: latest + Duration::days(1),
                    range_end: None,
                    priority: Priority::Stale,
                    attempt_count: 0,
                }),
                _ if force_full => Some(WorkItem {
                    subject_id: subject_id.clone(),
                    range_start: backfill_start,
                    range_end: None,
                    priority: Priority::Current,
                    attempt_count: 0,
                }),
                _ => None,
            }
        };

        match item {
            Some(item) => {
                debug!(
                    subject_id = %item.subject_id,
                    priority = item.priority.as_str(),
                    range_start = %item.range_start,
                    "작업 항목 생성"
                );
                items.push(item);
            }
            None => debug!(subject_id = %subject_id, "최신 상태, 건너뜀"),
        }
    }

    // 같은 우선순위 안에서 입력 순서 유지 (stable sort)
    items.sort_by_key(|item| item.priority);
    Ok(items)
}
