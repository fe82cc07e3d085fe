//! 동기화 실행 요약 통계.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 번의 동기화 실행 요약
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    /// 처리를 시도한 subject 수
    pub attempted: usize,
    /// 가져와서 배치 누적까지 성공한 수
    pub succeeded: usize,
    /// 재시도 소진으로 실패한 수
    pub failed: usize,
    /// 캐시 hit로 건너뛴 수
    pub skipped_cached: usize,
    /// 데이터 없음 (성공으로 간주되는 no-op)
    pub no_data: usize,
    /// 저장소에 upsert된 레코드 수
    pub records_written: u64,
    /// 실패한 배치 flush 횟수 (버퍼는 유지되어 다음 flush에서 재시도)
    pub flush_failures: usize,
    /// 실행 시작 시각
    pub started_at: DateTime<Utc>,
    /// 실행 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncRun {
    /// 새 실행 요약 생성
    pub fn new() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped_cached: 0,
            no_data: 0,
            records_written: 0,
            flush_failures: 0,
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// 성공률 계산 (%)
    ///
    /// 캐시 hit와 no-op도 성공으로 칩니다.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            ((self.succeeded + self.skipped_cached + self.no_data) as f64
                / self.attempted as f64)
                * 100.0
        }
    }

    /// 실행을 종료 처리합니다 (종료 시각과 소요 시간 기록)
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.elapsed = (now - self.started_at).to_std().unwrap_or_default();
        self.finished_at = Some(now);
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            attempted = self.attempted,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped_cached = self.skipped_cached,
            no_data = self.no_data,
            records_written = self.records_written,
            flush_failures = self.flush_failures,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}

impl Default for SyncRun {
    fn default() -> Self {
        Self::new()
    }
}
