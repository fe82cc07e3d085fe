//! 지수 backoff 재시도 컨트롤러.
//!
//! 실패할 수 있는 비동기 작업을 감싸고, 오류 분류 predicate로 재시도
//! 여부를 판단합니다. 동시에 도는 작업들이 같은 주기로 재시도하지
//! 않도록 대기 시간에 균등 jitter를 섞습니다.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 첫 시도 이후 허용되는 재시도 횟수
    pub max_retries: u32,
    /// 첫 재시도 전 대기 시간
    pub initial_backoff: Duration,
    /// 대기 시간 상한 (jitter 포함)
    pub max_backoff: Duration,
    /// 재시도마다 대기 시간에 곱하는 계수
    pub backoff_multiplier: f64,
    /// [0, delay * 0.5) 균등 jitter 추가 여부
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// 재시도 컨트롤러.
pub struct RetryController {
    config: RetryConfig,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// `operation`을 실행하고, 실패하면 `is_retryable`이 허용하는 한
    /// backoff 후 다시 실행합니다.
    ///
    /// 첫 시도는 즉시 실행됩니다. 재시도가 소진되거나 재시도 불가 오류를
    /// 만나면 마지막 원본 오류가 그대로 전파됩니다.
    pub async fn execute<F, Fut, T, E, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt: u32 = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt > self.config.max_retries || !is_retryable(&err) {
                        return Err(err);
                    }

                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "작업 실패, backoff 후 재시도"
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `attempt`번째 시도가 실패한 뒤의 대기 시간.
    ///
    /// 기본 수열은 initial * multiplier^(attempt-1)이고 max_backoff에서
    /// 잘립니다. jitter를 더한 최종 값도 max_backoff를 넘지 않습니다.
    fn delay_after(&self, attempt: u32) -> Duration {
        let max_secs = self.config.max_backoff.as_secs_f64();
        let exp = self
            .config
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let mut delay_secs = (self.config.initial_backoff.as_secs_f64() * exp).min(max_secs);

        if self.config.jitter && delay_secs > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..delay_secs * 0.5);
            delay_secs = (delay_secs + jitter).min(max_secs);
        }

        Duration::from_secs_f64(delay_secs)
    }
}
