//! Bounded exponential-backoff retry for single API calls.
//!
//! The delay schedule is a pure function of the attempt number; the actual
//! suspension goes through a [`Sleeper`] so tests can record delays instead of
//! waiting for them.

use async_trait::async_trait;
use std::{fmt::Debug, future::Future, time::Duration};
use tracing::{debug, warn};

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay: Duration::from_millis(1000) }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay after the failed attempt `attempt` (0-indexed): `initial_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `operation` until it succeeds, fails with a not-found error, or the
/// retry budget is spent. The last error is returned on exhaustion.
pub async fn retry_request<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("request succeeded after {} attempts", attempt + 1);
                }
                return Ok(value);
            }
            Err(err) if err.is_not_found() => {
                debug!("not retrying permanent failure: {err}");
                return Err(err);
            }
            Err(err) if attempt >= policy.max_retries => {
                warn!("all {} attempts failed, last error: {err}", attempt + 1);
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "attempt {}/{} failed: {err}. Retrying in {delay:?}",
                    attempt + 1,
                    policy.max_retries + 1,
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };

    /// Records requested delays and returns immediately.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn recorded(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn http(status: u16) -> FetchError {
        FetchError::Http { status, message: None }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new();

        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new().with_initial_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let sleeper = RecordingSleeper::default();

        let result =
            retry_request(&RetryPolicy::new(), &sleeper, || async { Ok::<_, FetchError>(42) })
                .await;

        assert_eq!(result, Ok(42));
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn not_found_is_attempted_once() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_request(&RetryPolicy::new(), &sleeper, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(http(404)) }
        })
        .await;

        assert_eq!(result, Err(http(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_uses_full_budget_with_backoff() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new().with_initial_delay(Duration::from_millis(100));

        let result: Result<(), _> = retry_request(&policy, &sleeper, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(http(429)) }
        })
        .await;

        assert_eq!(result, Err(http(429)));
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[tokio::test]
    async fn returns_last_error_and_recovers_mid_way() {
        let sleeper = RecordingSleeper::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry_request(&RetryPolicy::new(), &sleeper, || {
            let calls = calls.clone();
            async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(http(500)),
                    1 => Err(FetchError::Network("reset".into())),
                    _ => Ok("ok"),
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new().with_max_retries(0);

        let result: Result<(), _> = retry_request(&policy, &sleeper, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Network("down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_on_the_runtime_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(2)).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
