//! 적응형 rate limiter.
//!
//! 모든 worker가 공유하는 throttle 상태 하나를 관리합니다. 요청 간
//! 최소 간격을 강제하고, 연속 성공이 쌓이면 간격을 줄이고 rate limit
//! 신호가 오면 간격을 늘립니다.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// rate limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// 시작 최소 간격
    pub initial_interval: Duration,
    /// 간격 하한
    pub floor_interval: Duration,
    /// 간격 상한
    pub ceiling_interval: Duration,
    /// 간격을 줄이기까지 필요한 연속 성공 횟수
    pub success_threshold: u32,
    /// throttle 신호 시 간격에 곱하는 계수
    pub expand_factor: f64,
    /// 연속 성공 시 간격에 곱하는 계수 (1.0 미만)
    pub contract_factor: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            floor_interval: Duration::from_millis(500),
            ceiling_interval: Duration::from_secs(30),
            success_threshold: 10,
            expand_factor: 2.0,
            contract_factor: 0.9,
        }
    }
}

/// worker들이 공유하는 throttle 상태.
///
/// 반드시 `RateLimiter`의 Mutex 안에서만 읽고 씁니다.
#[derive(Debug)]
struct RateBudget {
    min_interval: Duration,
    last_request_at: Option<Instant>,
    consecutive_successes: u32,
    consecutive_throttles: u32,
}

/// 적응형 rate limiter.
///
/// `acquire`는 마지막 승인 이후 `min_interval`이 지날 때까지 호출자를
/// 기다리게 합니다. check-and-update 전체가 하나의 임계 구역이므로 두
/// worker가 같은 슬롯을 통과할 수 없습니다.
pub struct RateLimiter {
    config: RateLimiterConfig,
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let min_interval = config
            .initial_interval
            .clamp(config.floor_interval, config.ceiling_interval);

        Self {
            budget: Mutex::new(RateBudget {
                min_interval,
                last_request_at: None,
                consecutive_successes: 0,
                consecutive_throttles: 0,
            }),
            config,
        }
    }

    /// 요청 슬롯을 획득합니다. limiter는 실패하지 않고 지연만 시킵니다.
    pub async fn acquire(&self) {
        let mut budget = self.budget.lock().await;

        if let Some(last) = budget.last_request_at {
            // 잠금을 쥔 채로 기다려야 승인이 직렬화됩니다
            sleep_until(last + budget.min_interval).await;
        }

        budget.last_request_at = Some(Instant::now());
    }

    /// 성공을 보고합니다. 연속 성공이 threshold에 도달하면 간격을 줄입니다.
    pub async fn report_success(&self) {
        let mut budget = self.budget.lock().await;
        budget.consecutive_throttles = 0;
        budget.consecutive_successes += 1;

        if budget.consecutive_successes >= self.config.success_threshold {
            let contracted = budget.min_interval.mul_f64(self.config.contract_factor);
            budget.min_interval = contracted.max(self.config.floor_interval);
            budget.consecutive_successes = 0;

            debug!(
                min_interval_ms = budget.min_interval.as_millis() as u64,
                "연속 성공으로 요청 간격 축소"
            );
        }
    }

    /// rate limit 신호를 보고합니다. 간격을 즉시 늘립니다.
    ///
    /// 업스트림이 대기 시간을 알려줬으면 (`retry_after`) 그보다 짧게
    /// 잡지 않습니다. 결과는 항상 [floor, ceiling] 안에 있습니다.
    pub async fn report_throttled(&self, retry_after: Option<Duration>) {
        let mut budget = self.budget.lock().await;
        budget.consecutive_successes = 0;
        budget.consecutive_throttles += 1;

        let mut expanded = budget.min_interval.mul_f64(self.config.expand_factor);
        if let Some(after) = retry_after {
            expanded = expanded.max(after);
        }
        budget.min_interval = expanded.clamp(self.config.floor_interval, self.config.ceiling_interval);

        warn!(
            min_interval_ms = budget.min_interval.as_millis() as u64,
            consecutive_throttles = budget.consecutive_throttles,
            "rate limit 감지, 요청 간격 확대"
        );
    }

    /// 현재 최소 간격.
    pub async fn current_interval(&self) -> Duration {
        self.budget.lock().await.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(floor_ms: u64, ceiling_ms: u64) -> RateLimiterConfig {
        RateLimiterConfig {
            initial_interval: Duration::from_millis(floor_ms),
            floor_interval: Duration::from_millis(floor_ms),
            ceiling_interval: Duration::from_millis(ceiling_ms),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_enforces_min_interval() {
        let limiter = RateLimiter::new(config(500, 30_000));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        // 첫 승인은 즉시, 이후 두 번은 각각 500ms 대기
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_serialized() {
        let limiter = RateLimiter::new(config(500, 30_000));
        let start = Instant::now();

        tokio::join!(limiter.acquire(), limiter.acquire(), limiter.acquire());

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_throttle_doubles_interval() {
        let limiter = RateLimiter::new(config(500, 30_000));

        limiter.report_throttled(None).await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(1000));

        limiter.report_throttled(None).await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_interval_never_exceeds_ceiling() {
        let limiter = RateLimiter::new(config(500, 800));

        limiter.report_throttled(None).await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(800));

        // retry_after가 ceiling보다 커도 넘지 않습니다
        limiter
            .report_throttled(Some(Duration::from_secs(120)))
            .await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_retry_after_raises_interval() {
        let limiter = RateLimiter::new(config(500, 30_000));

        limiter
            .report_throttled(Some(Duration::from_secs(5)))
            .await;
        assert_eq!(limiter.current_interval().await, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sustained_success_contracts_toward_floor() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            initial_interval: Duration::from_millis(400),
            floor_interval: Duration::from_millis(100),
            ceiling_interval: Duration::from_secs(30),
            success_threshold: 3,
            expand_factor: 2.0,
            contract_factor: 0.5,
        });

        for _ in 0..3 {
            limiter.report_success().await;
        }
        assert_eq!(limiter.current_interval().await, Duration::from_millis(200));

        for _ in 0..3 {
            limiter.report_success().await;
        }
        assert_eq!(limiter.current_interval().await, Duration::from_millis(100));

        // floor 아래로는 내려가지 않습니다
        for _ in 0..3 {
            limiter.report_success().await;
        }
        assert_eq!(limiter.current_interval().await, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_throttle_resets_success_streak() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            initial_interval: Duration::from_millis(400),
            floor_interval: Duration::from_millis(100),
            ceiling_interval: Duration::from_secs(30),
            success_threshold: 3,
            expand_factor: 2.0,
            contract_factor: 0.5,
        });

        limiter.report_success().await;
        limiter.report_success().await;
        limiter.report_throttled(None).await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(800));

        // 두 번의 성공은 throttle로 무효화되었으므로 아직 축소되지 않습니다
        limiter.report_success().await;
        limiter.report_success().await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(800));

        limiter.report_success().await;
        assert_eq!(limiter.current_interval().await, Duration::from_millis(400));
    }
}
