mod common;

use apiresponse::{
    retry, run_and_retry, ApiResponse, Backoff, BackoffRetryPolicy, InstantSleeper, Jitter, ResponseContext,
    RetryEngine, RetryPolicy, TrackingSleeper,
};
use common::{ok, refused};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Three retries, 10ms apart, counting how often each hook is consulted.
#[derive(Default)]
struct ThreeRetries {
    asked: AtomicU32,
    timed: AtomicU32,
}

impl RetryPolicy for ThreeRetries {
    fn should_retry(&self, attempt: u32, last_reason: Option<&str>) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        assert!(last_reason.is_some());
        attempt <= 3
    }

    fn retry_timeout(&self, _attempt: u32, _last_reason: Option<&str>) -> Duration {
        self.timed.fetch_add(1, Ordering::SeqCst);
        Duration::from_millis(10)
    }
}

#[tokio::test]
async fn budget_of_three_means_four_invocations() {
    let ctx = ResponseContext::new();
    let policy = Arc::new(ThreeRetries::default());
    let sleeper = TrackingSleeper::new();
    let calls = AtomicUsize::new(0);

    let response: ApiResponse<()> = RetryEngine::new(policy.clone())
        .with_sleeper(sleeper.clone())
        .run(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            let response = ctx.of(refused);
            async move { response }
        })
        .await;

    assert!(response.is_exception());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(policy.asked.load(Ordering::SeqCst), 4);
    assert_eq!(policy.timed.load(Ordering::SeqCst), 3);
    assert_eq!(sleeper.count(), 3);
}

#[tokio::test]
async fn retries_stop_at_first_success() {
    let ctx = ResponseContext::new();
    let calls = AtomicUsize::new(0);
    let response = RetryEngine::new(ThreeRetries::default())
        .with_sleeper(InstantSleeper)
        .run(|attempt, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            let status = if attempt == 1 { 503 } else { 200 };
            let response = ctx.of(|| ok(status, attempt));
            async move { response }
        })
        .await;
    assert_eq!(response.get_or_none(), Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn exponential_policy_sleeps_on_the_runtime_clock() {
    let policy = BackoffRetryPolicy::builder()
        .max_retries(3)
        .backoff(Backoff::exponential(Duration::from_millis(100)))
        .with_jitter(Jitter::None)
        .build();
    let start = tokio::time::Instant::now();
    let response: ApiResponse<()> = run_and_retry(policy, |_, _| async { ApiResponse::error("down") }).await;
    assert!(response.is_error());
    assert!(start.elapsed() >= Duration::from_millis(100 + 200 + 400));
}

#[tokio::test(start_paused = true)]
async fn fixed_retry_returns_last_failure() {
    let calls = AtomicUsize::new(0);
    let response: ApiResponse<()> = retry(2, Duration::from_millis(50), || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { ApiResponse::error(format!("attempt {n}")) }
    })
    .await;
    assert_eq!(response.message().as_deref(), Some("attempt 3"));
}
