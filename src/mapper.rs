//! Failure mappers: transforms applied to failures only, chained as a left fold.
//!
//! Given mappers `[a, b]` the final failure is `b(a(original))`. Mappers take and return the
//! general [`Failure`] type, so an `Error` may be rewritten into an `Exception` or a `Cause`.
//! Successes never reach a mapper.

use crate::response::{ApiResponse, Failure};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Synchronous failure transform.
pub trait FailureMapper: Send + Sync {
    fn map(&self, failure: Failure) -> Failure;
}

impl<F> FailureMapper for F
where
    F: Fn(Failure) -> Failure + Send + Sync,
{
    fn map(&self, failure: Failure) -> Failure {
        self(failure)
    }
}

/// Asynchronous failure transform.
#[async_trait]
pub trait AsyncFailureMapper: Send + Sync {
    async fn map(&self, failure: Failure) -> Failure;
}

/// Async mapper built from a closure returning a future.
pub struct AsyncMapperFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for AsyncMapperFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMapperFn").finish_non_exhaustive()
    }
}

/// Build an [`AsyncFailureMapper`] from an async closure.
pub fn map_failure_fn<F, Fut>(f: F) -> AsyncMapperFn<F>
where
    F: Fn(Failure) -> Fut + Send + Sync,
    Fut: Future<Output = Failure> + Send + 'static,
{
    AsyncMapperFn { f }
}

#[async_trait]
impl<F, Fut> AsyncFailureMapper for AsyncMapperFn<F>
where
    F: Fn(Failure) -> Fut + Send + Sync,
    Fut: Future<Output = Failure> + Send + 'static,
{
    async fn map(&self, failure: Failure) -> Failure {
        (self.f)(failure).await
    }
}

/// A mapper as registered: one list holds both kinds so registration order is preserved.
#[derive(Clone)]
pub enum RegisteredMapper {
    Sync(Arc<dyn FailureMapper>),
    Async(Arc<dyn AsyncFailureMapper>),
}

impl std::fmt::Debug for RegisteredMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisteredMapper::Sync(_) => f.write_str("RegisteredMapper::Sync"),
            RegisteredMapper::Async(_) => f.write_str("RegisteredMapper::Async"),
        }
    }
}

/// Fold the synchronous mappers over a failed response. Async mappers are skipped.
pub fn maps<T>(mappers: &[RegisteredMapper], response: ApiResponse<T>) -> ApiResponse<T> {
    let failure = match response {
        ApiResponse::Failure(failure) => failure,
        success => return success,
    };
    let mut skipped = 0usize;
    let folded = mappers.iter().fold(failure, |acc, mapper| match mapper {
        RegisteredMapper::Sync(m) => m.map(acc),
        RegisteredMapper::Async(_) => {
            skipped += 1;
            acc
        }
    });
    if skipped > 0 {
        tracing::debug!(skipped, "async failure mappers skipped by synchronous construction");
    }
    ApiResponse::Failure(folded)
}

/// Fold every mapper in registration order; sync mappers run inline, async ones are awaited.
pub fn maps_async<T>(
    mappers: Vec<RegisteredMapper>,
    response: ApiResponse<T>,
) -> BoxFuture<'static, ApiResponse<T>>
where
    T: Send + 'static,
{
    Box::pin(async move {
        let mut failure = match response {
            ApiResponse::Failure(failure) => failure,
            success => return success,
        };
        for mapper in &mappers {
            failure = match mapper {
                RegisteredMapper::Sync(m) => m.map(failure),
                RegisteredMapper::Async(m) => m.map(failure).await,
            };
        }
        ApiResponse::Failure(failure)
    })
}
