//! 일봉 동기화 orchestrator.
//!
//! # 실행 단계
//!
//! ```text
//! ENUMERATING -> FETCHING -> DRAINING -> COMPLETE
//! (작업 분류)   (worker pool)  (마지막 flush)  (요약 반환)
//! ```
//!
//! FETCHING 단계는 우선순위로 정렬된 작업 목록을 고정 크기 worker pool로
//! 처리합니다. 디스패치는 목록 순서를 따르므로 MISSING 전부가 시작된
//! 뒤에야 STALE이 시작됩니다. 완료 순서는 보장하지 않습니다.
//!
//! subject 하나의 실패는 그 subject에서 끝납니다. 실행 전체가 실패하는
//! 경우는 마지막 flush가 실패했을 때뿐입니다.

use crate::error::{CollectorError, Result};
use crate::modules::enumerate::{enumerate_work, WorkItem};
use crate::stats::SyncRun;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use marketsync_core::{DailyBar, FetchCategory};
use marketsync_data::batch::BatchAccumulator;
use marketsync_data::cache::{fingerprint, CachePolicy, TieredCache};
use marketsync_data::ratelimit::{RateLimiter, RateLimiterConfig};
use marketsync_data::retry::{RetryConfig, RetryController};
use marketsync_data::source::DataSource;
use marketsync_data::storage::PersistentStore;
use marketsync_data::DataError;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// 협조적 취소 신호.
///
/// worker는 작업 항목 사이에서만 확인합니다. 진행 중인 fetch는 완료되거나
/// 타임아웃될 때까지 그대로 둡니다.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 취소를 요청합니다.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 한 번의 실행에 쓰이는 협력자 묶음.
///
/// 전역 상태 없이 entry point에서 만들어 참조로 전달합니다. limiter,
/// 재시도 컨트롤러, 배치 accumulator는 실행마다 새로 만들고 캐시와
/// 저장소만 실행 간에 공유됩니다.
pub struct SyncContext {
    pub source: Arc<dyn DataSource>,
    pub store: Arc<dyn PersistentStore>,
    pub cache: Arc<TieredCache<Vec<DailyBar>>>,
    pub limiter_config: RateLimiterConfig,
    pub retry_config: RetryConfig,
    pub cancel: CancelFlag,
}

/// 실행 옵션.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 배치 flush 임계값 (레코드 수)
    pub batch_size: usize,
    /// 동시 fetch worker 수
    pub max_workers: usize,
    /// CURRENT subject도 전체 재수집할지 여부
    pub force_full: bool,
    /// 신규 subject 초기 수집 기간 (일)
    pub lookback_days: i64,
    /// fetch 시도당 타임아웃
    pub fetch_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 10,
            force_full: false,
            lookback_days: 180,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// 실행 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Enumerating,
    Fetching,
    Draining,
    Complete,
}

impl RunPhase {
    fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Enumerating => "enumerating",
            RunPhase::Fetching => "fetching",
            RunPhase::Draining => "draining",
            RunPhase::Complete => "complete",
        }
    }
}

/// worker들이 갱신하는 실행 카운터.
#[derive(Debug, Default)]
struct RunCounters {
    attempted: usize,
    succeeded: usize,
    failed: usize,
    skipped_cached: usize,
    no_data: usize,
    flush_failures: usize,
}

/// 동기화 entry point.
///
/// subject 목록을 분류해 우선순위 순으로 가져오고, 결과를 배치로 영구
/// 저장소에 upsert합니다. 정상 종료하면 실행 요약을 반환하고, 마지막
/// flush가 실패하면 부분 요약을 담은 오류를 반환합니다.
pub async fn run_sync(
    ctx: &SyncContext,
    subjects: &[String],
    options: &SyncOptions,
) -> Result<SyncRun> {
    let mut run = SyncRun::new();

    info!(
        subjects = subjects.len(),
        max_workers = options.max_workers,
        batch_size = options.batch_size,
        force_full = options.force_full,
        phase = RunPhase::Enumerating.as_str(),
        "동기화 시작"
    );

    let limiter = RateLimiter::new(ctx.limiter_config.clone());
    let retry = RetryController::new(ctx.retry_config.clone());
    let batch = BatchAccumulator::new(ctx.store.clone(), options.batch_size);
    let counters = Mutex::new(RunCounters::default());

    let today = Utc::now().date_naive();
    let items = enumerate_work(
        ctx.store.as_ref(),
        subjects,
        today,
        options.lookback_days,
        options.force_full,
    )
    .await?;

    info!(
        items = items.len(),
        phase = RunPhase::Fetching.as_str(),
        "작업 목록 확정, worker pool 시작"
    );

    let fetch_timeout = options.fetch_timeout;

    // 디스패치가 목록 순서를 따르는 bounded pool: 다음 항목은 앞선 항목이
    // 모두 시작된 뒤에만 시작됩니다
    stream::iter(items)
        .for_each_concurrent(options.max_workers.max(1), |item| {
            let limiter = &limiter;
            let retry = &retry;
            let batch = &batch;
            let counters = &counters;
            async move {
                if ctx.cancel.is_cancelled() {
                    return;
                }
                process_item(ctx, limiter, retry, batch, counters, item, fetch_timeout).await;
            }
        })
        .await;

    info!(
        buffered = batch.buffered().await,
        phase = RunPhase::Draining.as_str(),
        "worker pool 종료, 마지막 flush"
    );

    let finalize_result = batch.finalize().await;

    let c = counters.into_inner();
    run.attempted = c.attempted;
    run.succeeded = c.succeeded;
    run.failed = c.failed;
    run.skipped_cached = c.skipped_cached;
    run.no_data = c.no_data;
    run.flush_failures = c.flush_failures;
    run.records_written = batch.total_flushed();
    run.finish();

    if ctx.cancel.is_cancelled() {
        warn!("취소 신호 수신, 남은 작업은 건너뛰었습니다");
    }

    match finalize_result {
        Ok(_) => {
            info!(phase = RunPhase::Complete.as_str(), "동기화 실행 종료");
            Ok(run)
        }
        Err(source) => {
            run.flush_failures += 1;
            error!(error = %source, "마지막 flush 실패, 부분 요약 반환");
            Err(CollectorError::Finalize {
                source,
                summary: Box::new(run),
            })
        }
    }
}

/// 작업 항목 하나를 처리합니다: 캐시 확인, pacing된 fetch (재시도 포함),
/// 배치 누적까지. 실패는 카운터에 기록할 뿐 전파하지 않습니다.
async fn process_item(
    ctx: &SyncContext,
    limiter: &RateLimiter,
    retry: &RetryController,
    batch: &BatchAccumulator,
    counters: &Mutex<RunCounters>,
    mut item: WorkItem,
    fetch_timeout: Duration,
) {
    counters.lock().await.attempted += 1;

    debug!(
        subject_id = %item.subject_id,
        priority = item.priority.as_str(),
        range_start = %item.range_start,
        "작업 시작"
    );

    let fp = fingerprint(
        &item.subject_id,
        FetchCategory::DailyBars,
        item.range_start,
        item.range_end,
    );

    if let Some(rows) = ctx.cache.get(&fp).await {
        info!(subject_id = %item.subject_id, rows = rows.len(), "캐시 hit, fetch 생략");
        counters.lock().await.skipped_cached += 1;
        return;
    }

    let subject_id = item.subject_id.clone();
    let (range_start, range_end) = (item.range_start, item.range_end);
    let attempts = AtomicU32::new(0);

    let result = retry
        .execute(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                let subject_id = subject_id.clone();
                async move {
                    // 모든 시도는 공유 limiter의 pacing을 거칩니다
                    limiter.acquire().await;

                    let fetched = tokio::time::timeout(
                        fetch_timeout,
                        ctx.source
                            .fetch(&subject_id, FetchCategory::DailyBars, range_start, range_end),
                    )
                    .await;

                    let result = match fetched {
                        Ok(inner) => inner,
                        Err(_) => Err(DataError::Timeout),
                    };

                    // throttle 신호는 재시도 대기 전에 limiter에 바로 반영합니다
                    if let Err(err) = &result {
                        if err.is_throttle() {
                            limiter.report_throttled(err.retry_after()).await;
                        }
                    }
                    result
                }
            },
            |err: &DataError| err.is_retryable(),
        )
        .await;

    item.attempt_count = attempts.load(Ordering::SeqCst);

    match result {
        Ok(rows) => {
            limiter.report_success().await;

            // 빈 결과도 캐시해서 freshness window 안의 재조회를 막습니다
            ctx.cache
                .set_with_policy(
                    &fp,
                    rows.clone(),
                    CachePolicy::for_category(FetchCategory::DailyBars),
                )
                .await;

            if rows.is_empty() {
                info!(subject_id = %item.subject_id, "데이터 없음 (no-op)");
                counters.lock().await.no_data += 1;
                return;
            }

            let count = rows.len();
            match batch.add(&item.subject_id, rows).await {
                Ok(_) => {
                    counters.lock().await.succeeded += 1;
                    info!(
                        subject_id = %item.subject_id,
                        rows = count,
                        attempts = item.attempt_count,
                        "수집 성공"
                    );
                }
                Err(err) => {
                    // 레코드는 버퍼에 남아 다음 flush에서 다시 시도됩니다
                    error!(subject_id = %item.subject_id, error = %err, "배치 flush 실패");
                    let mut c = counters.lock().await;
                    c.flush_failures += 1;
                    c.succeeded += 1;
                }
            }
        }
        Err(DataError::NotFound(_)) => {
            limiter.report_success().await;
            ctx.cache
                .set_with_policy(
                    &fp,
                    Vec::new(),
                    CachePolicy::for_category(FetchCategory::DailyBars),
                )
                .await;

            info!(subject_id = %item.subject_id, "데이터 없음 (no-op)");
            counters.lock().await.no_data += 1;
        }
        Err(err) => {
            warn!(
                subject_id = %item.subject_id,
                attempts = item.attempt_count,
                error = %err,
                "수집 실패, 다음 subject 진행"
            );
            counters.lock().await.failed += 1;
        }
    }
}
