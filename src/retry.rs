//! Application-level retry of a response-producing task.
//!
//! Semantics:
//! - `attempt` starts at 1; the task receives the failure reason of the previous attempt
//!   (`None` on the first call).
//! - A success returns immediately.
//! - On failure the policy is asked `should_retry(attempt, reason)`; `false` returns that failure
//!   as final, `true` waits `retry_timeout(attempt, reason)` on the [`Sleeper`] and tries again.
//! - The engine imposes no cap of its own: a policy that always says yes retries forever.
//! - Attempts are strictly sequential.
//!
//! ```rust
//! use std::time::Duration;
//! use apiresponse::{ApiResponse, Backoff, BackoffRetryPolicy, InstantSleeper, Jitter, RetryEngine};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = BackoffRetryPolicy::builder()
//!     .max_retries(3)
//!     .backoff(Backoff::exponential(Duration::from_millis(100)))
//!     .with_jitter(Jitter::full())
//!     .build();
//! let engine = RetryEngine::new(policy).with_sleeper(InstantSleeper);
//! let response = engine
//!     .run(|attempt, _last_reason| async move {
//!         if attempt < 3 { ApiResponse::error("busy") } else { ApiResponse::success(attempt) }
//!     })
//!     .await;
//! assert_eq!(response.get_or_none(), Some(3));
//! # });
//! ```

use crate::backoff::Backoff;
use crate::jitter::Jitter;
use crate::response::ApiResponse;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether and when a failed attempt is retried. Stateless: the attempt counter lives in
/// the engine.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: u32, last_reason: Option<&str>) -> bool;
    fn retry_timeout(&self, attempt: u32, last_reason: Option<&str>) -> Duration;
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn should_retry(&self, attempt: u32, last_reason: Option<&str>) -> bool {
        (**self).should_retry(attempt, last_reason)
    }

    fn retry_timeout(&self, attempt: u32, last_reason: Option<&str>) -> Duration {
        (**self).retry_timeout(attempt, last_reason)
    }
}

/// Retry up to `times` additional attempts, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRetry {
    pub times: u32,
    pub interval: Duration,
}

impl RetryPolicy for FixedRetry {
    fn should_retry(&self, attempt: u32, _last_reason: Option<&str>) -> bool {
        attempt <= self.times
    }

    fn retry_timeout(&self, _attempt: u32, _last_reason: Option<&str>) -> Duration {
        self.interval
    }
}

/// Retry policy combining a retry budget, a backoff schedule, jitter and a reason predicate.
#[derive(Clone)]
pub struct BackoffRetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    jitter: Jitter,
    retry_if: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl std::fmt::Debug for BackoffRetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffRetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("retry_if", &"<predicate>")
            .finish()
    }
}

impl BackoffRetryPolicy {
    pub fn builder() -> BackoffRetryPolicyBuilder {
        BackoffRetryPolicyBuilder::new()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn should_retry(&self, attempt: u32, last_reason: Option<&str>) -> bool {
        attempt <= self.max_retries && last_reason.map_or(true, |reason| (self.retry_if)(reason))
    }

    fn retry_timeout(&self, attempt: u32, _last_reason: Option<&str>) -> Duration {
        self.jitter.apply(self.backoff.delay(attempt))
    }
}

/// Builder for [`BackoffRetryPolicy`].
pub struct BackoffRetryPolicyBuilder {
    max_retries: u32,
    backoff: Backoff,
    jitter: Jitter,
    retry_if: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl BackoffRetryPolicyBuilder {
    /// Defaults: 3 retries, exponential backoff from 1s, full jitter, retry every failure.
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::exponential(Duration::from_secs(1)),
            jitter: Jitter::Full,
            retry_if: Arc::new(|_| true),
        }
    }

    /// Retries after the first attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Only retry failures whose reason satisfies `predicate`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn build(self) -> BackoffRetryPolicy {
        BackoffRetryPolicy {
            max_retries: self.max_retries,
            backoff: self.backoff,
            jitter: self.jitter,
            retry_if: self.retry_if,
        }
    }
}

impl Default for BackoffRetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a task under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryEngine<P> {
    policy: P,
    sleeper: Arc<dyn Sleeper>,
}

impl<P: RetryPolicy> RetryEngine<P> {
    pub fn new(policy: P) -> Self {
        Self { policy, sleeper: Arc::new(TokioSleeper) }
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns the final response, or the delay and reason for the next attempt.
    fn next_step<T>(&self, attempt: u32, response: ApiResponse<T>) -> Result<(Duration, String), ApiResponse<T>> {
        let reason = match &response {
            ApiResponse::Success(_) => return Err(response),
            ApiResponse::Failure(failure) => failure.message(),
        };
        if !self.policy.should_retry(attempt, Some(&reason)) {
            tracing::debug!(attempt, reason = %reason, "retry declined; returning failure");
            return Err(response);
        }
        let delay = self.policy.retry_timeout(attempt, Some(&reason));
        tracing::debug!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            reason = %reason,
            "retrying"
        );
        Ok((delay, reason))
    }

    /// Run `task` until it succeeds or the policy gives up. Delays suspend, never block.
    pub async fn run<T, F, Fut>(&self, mut task: F) -> ApiResponse<T>
    where
        F: FnMut(u32, Option<String>) -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
    {
        let mut attempt = 1u32;
        let mut last_reason = None;
        loop {
            let response = task(attempt, last_reason.take()).await;
            match self.next_step(attempt, response) {
                Err(done) => return done,
                Ok((delay, reason)) => {
                    self.sleeper.sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                    last_reason = Some(reason);
                }
            }
        }
    }

    /// Blocking sibling of [`run`](Self::run): delays put the calling thread to sleep.
    pub fn run_blocking<T, F>(&self, mut task: F) -> ApiResponse<T>
    where
        F: FnMut(u32, Option<String>) -> ApiResponse<T>,
    {
        let mut attempt = 1u32;
        let mut last_reason = None;
        loop {
            let response = task(attempt, last_reason.take());
            match self.next_step(attempt, response) {
                Err(done) => return done,
                Ok((delay, reason)) => {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt = attempt.saturating_add(1);
                    last_reason = Some(reason);
                }
            }
        }
    }
}

/// Run `task` under `policy` with the tokio timer.
pub async fn run_and_retry<T, P, F, Fut>(policy: P, task: F) -> ApiResponse<T>
where
    P: RetryPolicy,
    F: FnMut(u32, Option<String>) -> Fut,
    Fut: Future<Output = ApiResponse<T>>,
{
    RetryEngine::new(policy).run(task).await
}

/// Retry `task` up to `times` more times, `interval` apart, returning the last response.
pub async fn retry<T, F, Fut>(times: u32, interval: Duration, mut task: F) -> ApiResponse<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResponse<T>>,
{
    RetryEngine::new(FixedRetry { times, interval }).run(|_, _| task()).await
}

/// Blocking sibling of [`retry`].
pub fn retry_blocking<T, F>(times: u32, interval: Duration, mut task: F) -> ApiResponse<T>
where
    F: FnMut() -> ApiResponse<T>,
{
    RetryEngine::new(FixedRetry { times, interval }).run_blocking(|_, _| task())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        retries: u32,
        should_retry_calls: Mutex<Vec<u32>>,
        timeout_calls: Mutex<Vec<u32>>,
    }

    impl RetryPolicy for Recording {
        fn should_retry(&self, attempt: u32, _last_reason: Option<&str>) -> bool {
            self.should_retry_calls.lock().unwrap().push(attempt);
            attempt <= self.retries
        }

        fn retry_timeout(&self, attempt: u32, _last_reason: Option<&str>) -> Duration {
            self.timeout_calls.lock().unwrap().push(attempt);
            Duration::from_millis(u64::from(attempt) * 10)
        }
    }

    #[tokio::test]
    async fn always_failing_task_runs_one_plus_budget_times() {
        let policy = Arc::new(Recording { retries: 3, ..Default::default() });
        let sleeper = TrackingSleeper::new();
        let engine = RetryEngine::new(policy.clone()).with_sleeper(sleeper.clone());
        let calls = AtomicUsize::new(0);

        let response: ApiResponse<()> = engine
            .run(|_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { ApiResponse::error("down") }
            })
            .await;

        assert!(response.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(*policy.should_retry_calls.lock().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(*policy.timeout_calls.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_millis(10), Duration::from_millis(20), Duration::from_millis(30)]
        );
    }

    #[tokio::test]
    async fn success_on_second_attempt_stops() {
        let engine = RetryEngine::new(FixedRetry { times: 10, interval: Duration::from_secs(1) })
            .with_sleeper(InstantSleeper);
        let calls = AtomicUsize::new(0);
        let response = engine
            .run(|attempt, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        ApiResponse::error("first")
                    } else {
                        ApiResponse::success(attempt)
                    }
                }
            })
            .await;
        assert_eq!(response.get_or_none(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn task_sees_previous_reason() {
        let engine = RetryEngine::new(FixedRetry { times: 2, interval: Duration::ZERO })
            .with_sleeper(InstantSleeper);
        let seen = Mutex::new(Vec::new());
        let _: ApiResponse<()> = engine
            .run(|attempt, last| {
                seen.lock().unwrap().push(last);
                async move { ApiResponse::error(format!("fail#{attempt}")) }
            })
            .await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("fail#1".to_string()), Some("fail#2".to_string())]
        );
    }

    struct Forever;

    impl RetryPolicy for Forever {
        fn should_retry(&self, _attempt: u32, _last_reason: Option<&str>) -> bool {
            true
        }
        fn retry_timeout(&self, _attempt: u32, _last_reason: Option<&str>) -> Duration {
            Duration::ZERO
        }
    }

    #[tokio::test]
    async fn engine_imposes_no_cap() {
        let engine = RetryEngine::new(Forever).with_sleeper(InstantSleeper);
        let response = engine
            .run(|attempt, _| async move {
                if attempt < 5_000 {
                    ApiResponse::error("again")
                } else {
                    ApiResponse::success(attempt)
                }
            })
            .await;
        assert_eq!(response.get_or_none(), Some(5_000));
    }

    #[tokio::test]
    async fn backoff_policy_respects_budget_and_schedule() {
        let policy = BackoffRetryPolicy::builder()
            .max_retries(2)
            .backoff(Backoff::linear(Duration::from_millis(100)))
            .with_jitter(Jitter::None)
            .build();
        let sleeper = TrackingSleeper::new();
        let engine = RetryEngine::new(policy).with_sleeper(sleeper.clone());
        let response: ApiResponse<()> = engine.run(|_, _| async { ApiResponse::error("x") }).await;
        assert!(response.is_error());
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn retry_if_filters_reasons() {
        let policy = BackoffRetryPolicy::builder()
            .max_retries(5)
            .with_jitter(Jitter::None)
            .retry_if(|reason| reason.contains("transient"))
            .build();
        let engine = RetryEngine::new(policy).with_sleeper(InstantSleeper);
        let calls = AtomicUsize::new(0);
        let response: ApiResponse<()> = engine
            .run(|_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { ApiResponse::error("fatal") }
            })
            .await;
        assert!(response.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_fixed_retry_returns_last_response() {
        let mut calls = 0;
        let response: ApiResponse<()> = retry_blocking(2, Duration::ZERO, || {
            calls += 1;
            ApiResponse::error(format!("call {calls}"))
        });
        assert_eq!(calls, 3);
        assert_eq!(response.message().as_deref(), Some("call 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_helper_waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = AtomicUsize::new(0);
        let response: ApiResponse<()> = retry(2, Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ApiResponse::error("nope") }
        })
        .await;
        assert!(response.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
