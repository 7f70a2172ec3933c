//! Convenient re-exports for common apiresponse types.
pub use crate::{
    adapter::ApiResponseLayer,
    backoff::Backoff,
    combinators::MergePolicy,
    context::ResponseContext,
    data_source::{ConcatStrategy, DataSource, RetainPolicy, SourceState},
    disposable::{Disposable, DisposableBag},
    error::{ApiError, BuildError, Cancelled, TimedOut},
    jitter::Jitter,
    mapper::{AsyncFailureMapper, FailureMapper},
    operator::{AsyncResponseOperator, ResponseOperator, SuccessEvent, SuccessView},
    response::{ApiResponse, Cause, ErrorPayload, ExceptionPayload, Failure, RawResponse, Success},
    retry::{run_and_retry, BackoffRetryPolicy, RetryEngine, RetryPolicy},
    status::StatusCode,
};
