//! Operators: side-effecting observers of a constructed response.
//!
//! Exactly one hook fires per response, chosen by its tag. Operators form a fan-out, not a
//! pipeline: every operator sees the same response and nothing they return feeds the next one.
//!
//! Synchronous operators always run before the constructing call returns. Async operators
//! registered on a [`ResponseContext`](crate::ResponseContext) are launched detached on its
//! [`Spawner`](crate::Spawner); applied per call via `operator_async` they are awaited.
//!
//! Operators are registered once for every body type, so a success reaches them type-erased:
//! [`SuccessView::data`] and [`SuccessEvent::data`] downcast the body back to a concrete type.
//!
//! ```rust
//! use apiresponse::{ApiResponse, ResponseOperator, SuccessView};
//!
//! struct CountItems;
//!
//! impl ResponseOperator for CountItems {
//!     fn on_success(&self, success: SuccessView<'_>) {
//!         if let Some(items) = success.data::<Vec<u32>>() {
//!             assert_eq!(items.len(), 3);
//!         }
//!     }
//! }
//!
//! let _ = ApiResponse::success(vec![1u32, 2, 3]).operator(&CountItems);
//! ```

use crate::response::{ApiResponse, Cause, ErrorPayload, ExceptionPayload, Failure, Headers, ResponseTag, Success};
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Borrowed, type-erased view of a success handed to synchronous operators.
#[derive(Clone, Copy)]
pub struct SuccessView<'a> {
    tag: &'a Arc<ResponseTag>,
    data: Option<&'a dyn Any>,
}

impl<'a> SuccessView<'a> {
    pub fn of<T: 'static>(success: &'a Success<T>) -> Self {
        Self { tag: success.tag(), data: success.data().ok().map(|d| d as &dyn Any) }
    }

    pub fn tag(&self) -> &'a Arc<ResponseTag> {
        self.tag
    }

    pub fn status(&self) -> u16 {
        self.tag.status()
    }

    pub fn headers(&self) -> &'a Headers {
        self.tag.headers()
    }

    pub fn has_content(&self) -> bool {
        self.data.is_some()
    }

    /// The body, if there is one and it is a `D`.
    pub fn data<D: 'static>(&self) -> Option<&'a D> {
        self.data?.downcast_ref::<D>()
    }
}

impl fmt::Debug for SuccessView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuccessView")
            .field("status", &self.status())
            .field("has_content", &self.has_content())
            .finish()
    }
}

/// Owned, type-erased snapshot of a success handed to async operators.
#[derive(Clone)]
pub struct SuccessEvent {
    tag: Arc<ResponseTag>,
    data: Option<Arc<dyn Any + Send + Sync>>,
}

impl SuccessEvent {
    pub fn of<T: Clone + Send + Sync + 'static>(success: &Success<T>) -> Self {
        Self {
            tag: success.tag().clone(),
            data: success.data().ok().map(|d| Arc::new(d.clone()) as Arc<dyn Any + Send + Sync>),
        }
    }

    pub fn tag(&self) -> &Arc<ResponseTag> {
        &self.tag
    }

    pub fn status(&self) -> u16 {
        self.tag.status()
    }

    pub fn headers(&self) -> &Headers {
        self.tag.headers()
    }

    pub fn has_content(&self) -> bool {
        self.data.is_some()
    }

    /// The body, if there is one and it is a `D`.
    pub fn data<D: 'static>(&self) -> Option<&D> {
        self.data.as_deref()?.downcast_ref::<D>()
    }

    pub fn view(&self) -> SuccessView<'_> {
        SuccessView { tag: &self.tag, data: self.data.as_deref().map(|d| d as &dyn Any) }
    }
}

impl fmt::Debug for SuccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuccessEvent")
            .field("status", &self.status())
            .field("has_content", &self.has_content())
            .finish()
    }
}

/// Synchronous response observer. All hooks default to no-ops.
pub trait ResponseOperator: Send + Sync {
    fn on_success(&self, _success: SuccessView<'_>) {}
    fn on_error(&self, _error: &ErrorPayload) {}
    fn on_exception(&self, _exception: &ExceptionPayload) {}
    fn on_cause(&self, _cause: &Cause) {}
}

/// Asynchronous response observer. Hooks receive owned, cheaply cloned payloads so they can run
/// detached from the response that triggered them.
#[async_trait]
pub trait AsyncResponseOperator: Send + Sync {
    async fn on_success(&self, _success: SuccessEvent) {}
    async fn on_error(&self, _error: ErrorPayload) {}
    async fn on_exception(&self, _exception: ExceptionPayload) {}
    async fn on_cause(&self, _cause: Cause) {}
}

impl<O: ResponseOperator + ?Sized> ResponseOperator for Arc<O> {
    fn on_success(&self, success: SuccessView<'_>) {
        (**self).on_success(success)
    }
    fn on_error(&self, error: &ErrorPayload) {
        (**self).on_error(error)
    }
    fn on_exception(&self, exception: &ExceptionPayload) {
        (**self).on_exception(exception)
    }
    fn on_cause(&self, cause: &Cause) {
        (**self).on_cause(cause)
    }
}

/// Type-erased snapshot of a response, detached from its body type.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    Success(SuccessEvent),
    Failure(Failure),
}

impl ResponseEvent {
    pub fn of<T: Clone + Send + Sync + 'static>(response: &ApiResponse<T>) -> Self {
        match response {
            ApiResponse::Success(success) => ResponseEvent::Success(SuccessEvent::of(success)),
            ApiResponse::Failure(failure) => ResponseEvent::Failure(failure.clone()),
        }
    }
}

/// Fire the hook matching `response` on `operator`.
pub fn dispatch<T: 'static>(operator: &dyn ResponseOperator, response: &ApiResponse<T>) {
    match response {
        ApiResponse::Success(success) => operator.on_success(SuccessView::of(success)),
        ApiResponse::Failure(Failure::Error(e)) => operator.on_error(e),
        ApiResponse::Failure(Failure::Exception(e)) => operator.on_exception(e),
        ApiResponse::Failure(Failure::Cause(c)) => operator.on_cause(c),
    }
}

/// Await the hook matching `event` on `operator`.
pub async fn dispatch_async(operator: &dyn AsyncResponseOperator, event: ResponseEvent) {
    match event {
        ResponseEvent::Success(success) => operator.on_success(success).await,
        ResponseEvent::Failure(Failure::Error(e)) => operator.on_error(e).await,
        ResponseEvent::Failure(Failure::Exception(e)) => operator.on_exception(e).await,
        ResponseEvent::Failure(Failure::Cause(c)) => operator.on_cause(c).await,
    }
}

/// Operator that emits one `tracing` event per response.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOperator;

impl ResponseOperator for LoggingOperator {
    fn on_success(&self, success: SuccessView<'_>) {
        tracing::debug!(status = success.status(), has_content = success.has_content(), "api_response_success");
    }

    fn on_error(&self, error: &ErrorPayload) {
        tracing::warn!(status = error.status(), error = %error, "api_response_error");
    }

    fn on_exception(&self, exception: &ExceptionPayload) {
        tracing::warn!(message = exception.message(), "api_response_exception");
    }

    fn on_cause(&self, cause: &Cause) {
        tracing::warn!(cause = %cause.message(), "api_response_cause");
    }
}

impl<T: 'static> ApiResponse<T> {
    /// Apply a per-call operator synchronously and return the response unchanged.
    pub fn operator(self, operator: &dyn ResponseOperator) -> Self {
        dispatch(operator, &self);
        self
    }
}

impl<T: Clone + Send + Sync + 'static> ApiResponse<T> {
    /// Apply a per-call async operator, awaiting it, and return the response unchanged.
    pub async fn operator_async(self, operator: &dyn AsyncResponseOperator) -> Self {
        dispatch_async(operator, ResponseEvent::of(&self)).await;
        self
    }
}
