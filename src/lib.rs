#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # apiresponse
//!
//! Tri-state results for HTTP calls. Every call ends as exactly one of:
//!
//! - **Success**: the endpoint answered inside the success range (`200..=299` by default);
//!   the body may be empty.
//! - **Error**: the endpoint answered outside that range; status, headers and raw error body
//!   are kept for inspection.
//! - **Exception**: no classifiable answer (connectivity, timeout, decoding fault).
//!
//! plus **Cause**, a named failure injected by a failure mapper.
//!
//! ## Features
//!
//! - **Hook registry** ([`ResponseContext`]): operators observe every response, failure mappers
//!   rewrite failures, all in registration order
//! - **Combinators** with sync and async variants: map, flat_map, zip, recover, validate,
//!   filter, merge, peek
//! - **Retry engine** driven by a [`RetryPolicy`], with backoff and jitter
//! - **Cached request sources** ([`DataSource`]) with coalescing, retain, retry, invalidate,
//!   concat and disposal
//! - **Tower adapter** ([`ApiResponseLayer`]) with a global request timeout
//!
//! ## Quick Start
//!
//! ```rust
//! use apiresponse::{ApiResponse, RawResponse, ResponseContext};
//!
//! let ctx = ResponseContext::new();
//! let response = ctx.of(|| Ok::<_, std::io::Error>(RawResponse::with_body(200, vec![1, 2, 3])));
//!
//! let total = response
//!     .map(|items| items.iter().sum::<i32>())
//!     .validate(|sum| *sum > 0, || "empty basket".to_string())
//!     .get_or_else(0);
//! assert_eq!(total, 6);
//!
//! let failed: ApiResponse<i32> = ctx.of(|| Ok::<_, std::io::Error>(RawResponse::new(404)));
//! assert_eq!(failed.recover(-1).get_or_none(), Some(-1));
//! ```

pub mod adapter;
pub mod backoff;
pub mod combinators;
pub mod context;
pub mod data_source;
pub mod disposable;
pub mod error;
pub mod jitter;
pub mod mapper;
pub mod operator;
pub mod prelude;
pub mod response;
pub mod retry;
pub mod sleeper;
pub mod spawner;
pub mod status;

// Re-exports
pub use adapter::{ApiResponseLayer, ApiResponseService};
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use combinators::{merge, MergePolicy};
pub use context::{RegisteredOperator, ResponseContext, ResponseContextBuilder, DEFAULT_SUCCESS_RANGE};
pub use data_source::{ConcatStrategy, DataSource, DataSourceBuilder, RetainPolicy, SourceState};
pub use disposable::{Disposable, DisposableBag};
pub use error::{ApiError, BuildError, Cancelled, NoContentError, SharedError, TimedOut};
pub use jitter::Jitter;
pub use mapper::{map_failure_fn, AsyncFailureMapper, AsyncMapperFn, FailureMapper, RegisteredMapper};
pub use operator::{
    AsyncResponseOperator, LoggingOperator, ResponseEvent, ResponseOperator, SuccessEvent, SuccessView,
};
pub use response::{
    ApiResponse, Cause, ErrorPayload, ExceptionPayload, Failure, Headers, RawResponse, ResponseTag, Success,
};
pub use retry::{
    retry, retry_blocking, run_and_retry, BackoffRetryPolicy, BackoffRetryPolicyBuilder, FixedRetry,
    RetryEngine, RetryPolicy,
};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use spawner::{InlineSpawner, RuntimeSpawner, Spawner, TokioSpawner};
pub use status::StatusCode;
