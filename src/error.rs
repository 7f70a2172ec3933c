//! Error types surfaced by the response layer.
//!
//! Failures travel inside [`ApiResponse`](crate::ApiResponse) as values. The types here are what
//! escapes that boundary: [`ApiError`] from `get_or_throw`, [`NoContentError`] when an empty body
//! is read, [`Cancelled`] when a call was cancelled rather than failed, and [`BuildError`] from
//! builders.
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared, type-erased error as stored in `Failure::Exception` and `Failure::Cause`.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The call succeeded but carried no body (e.g. `204 No Content`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("response with status {status} has no content")]
pub struct NoContentError {
    /// Numeric status of the empty-bodied response.
    pub status: u16,
}

/// The call was cancelled before it produced a response.
///
/// Cancellation is not a failure: it is never wrapped in `Failure::Exception`, never retried,
/// and never passed through failure mappers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("call was cancelled")]
pub struct Cancelled;

/// The adapted call exceeded the configured global timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("call timed out after {timeout:?}")]
pub struct TimedOut {
    /// The timeout that was exceeded.
    pub timeout: Duration,
}

/// Error raised by `ApiResponse::get_or_throw` and friends.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The endpoint answered outside the success range.
    #[error("{0}")]
    Status(String),
    /// The original error of a `Failure::Exception`, shared with the response.
    #[error("{0}")]
    Exception(SharedError),
    /// A custom cause injected by a failure mapper.
    #[error("{0}")]
    Cause(SharedError),
    /// A success carried no body.
    #[error(transparent)]
    NoContent(#[from] NoContentError),
}

impl ApiError {
    /// Borrow the shared source of an `Exception` or `Cause`.
    pub fn shared(&self) -> Option<&SharedError> {
        match self {
            ApiError::Exception(e) | ApiError::Cause(e) => Some(e),
            _ => None,
        }
    }

    /// Downcast the shared source to a concrete error type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.shared().and_then(|e| e.downcast_ref::<E>())
    }
}

/// Errors produced while validating builder input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The success range was empty (`start > end`).
    #[error("success range {start}..={end} is empty")]
    EmptySuccessRange {
        /// Lower bound provided.
        start: u16,
        /// Upper bound provided.
        end: u16,
    },
    /// A timeout of zero was requested.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    /// A retry budget was set with a zero interval.
    #[error("retry interval must be > 0 when the retry budget is {budget}")]
    ZeroRetryInterval {
        /// The budget that was configured.
        budget: u32,
    },
}
