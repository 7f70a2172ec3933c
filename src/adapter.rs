//! Tower middleware that turns a transport service into one yielding [`ApiResponse`]s.
//!
//! The wrapped service returns [`RawResponse<T>`]; its errors become `Failure::Exception`, and
//! the context's global timeout, when set, turns an overrunning call into
//! `Failure::Exception(TimedOut)`. Operators and failure mappers of the context run on every
//! response. The only `Err` this service returns is [`Cancelled`].
//!
//! ```rust
//! use apiresponse::{ApiResponseLayer, RawResponse};
//! use tower::{service_fn, Layer, ServiceExt};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transport = service_fn(|path: &'static str| async move {
//!     Ok::<_, std::io::Error>(RawResponse::with_body(200, path.len()))
//! });
//! let svc = ApiResponseLayer::global().layer(transport);
//! let response = svc.oneshot("/users").await.unwrap();
//! assert_eq!(response.get_or_none(), Some(6));
//! # });
//! ```

use crate::context::{is_cancelled, ResponseContext};
use crate::error::{Cancelled, TimedOut};
use crate::response::{ApiResponse, ExceptionPayload, RawResponse};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

#[derive(Clone, Debug)]
enum ContextRef {
    Global,
    Owned(Arc<ResponseContext>),
}

impl ContextRef {
    fn get(&self) -> &ResponseContext {
        match self {
            ContextRef::Global => ResponseContext::global(),
            ContextRef::Owned(ctx) => ctx,
        }
    }
}

/// Layer producing [`ApiResponseService`].
#[derive(Clone, Debug)]
pub struct ApiResponseLayer {
    context: ContextRef,
}

impl ApiResponseLayer {
    /// Classify through `context`.
    pub fn new(context: Arc<ResponseContext>) -> Self {
        Self { context: ContextRef::Owned(context) }
    }

    /// Classify through [`ResponseContext::global`].
    pub fn global() -> Self {
        Self { context: ContextRef::Global }
    }
}

impl<S> Layer<S> for ApiResponseLayer {
    type Service = ApiResponseService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ApiResponseService { inner: service, context: self.context.clone() }
    }
}

/// Service wrapper that classifies raw responses.
#[derive(Clone, Debug)]
pub struct ApiResponseService<S> {
    inner: S,
    context: ContextRef,
}

impl<S, Req, T> Service<Req> for ApiResponseService<S>
where
    S: Service<Req, Response = RawResponse<T>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Response = ApiResponse<T>;
    type Error = Cancelled;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    // Readiness errors surface as exceptions from `call`.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let context = self.context.clone();

        Box::pin(async move {
            let ctx = context.get();
            let call = inner.oneshot(req);
            let outcome = match ctx.timeout() {
                None => call.await,
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                        tracing::debug!(timeout_ms, "adapted call timed out");
                        return Ok(ctx.complete(Err(ExceptionPayload::new(TimedOut { timeout: limit }))).await);
                    }
                },
            };
            match outcome {
                Err(err) if is_cancelled(&err) => {
                    tracing::debug!("adapted call cancelled");
                    Err(Cancelled)
                }
                outcome => Ok(ctx.complete(outcome.map_err(ExceptionPayload::new)).await),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Failure;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::service_fn;

    fn layer() -> (Arc<ResponseContext>, ApiResponseLayer) {
        let ctx = Arc::new(ResponseContext::new());
        (ctx.clone(), ApiResponseLayer::new(ctx))
    }

    #[tokio::test]
    async fn classifies_by_status() {
        let (_, layer) = layer();
        let svc = layer.layer(service_fn(|status: u16| async move {
            Ok::<_, io::Error>(RawResponse::with_body(status, "payload"))
        }));
        assert!(svc.clone().oneshot(200).await.unwrap().is_success());
        let response = svc.oneshot(503).await.unwrap();
        assert!(response.is_error());
        match response.as_failure() {
            Some(Failure::Error(payload)) => assert_eq!(payload.status(), 503),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_becomes_exception() {
        let (_, layer) = layer();
        let svc = layer.layer(service_fn(|_: ()| async {
            Err::<RawResponse<()>, _>(io::Error::new(io::ErrorKind::TimedOut, "socket"))
        }));
        let response = svc.oneshot(()).await.unwrap();
        assert!(response.is_exception());
        assert_eq!(response.message().as_deref(), Some("socket"));
    }

    #[tokio::test]
    async fn cancelled_transport_is_not_classified() {
        let (ctx, layer) = layer();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        ctx.register_failure_mapper(move |f: Failure| {
            h.fetch_add(1, Ordering::SeqCst);
            f
        });
        let svc = layer.layer(service_fn(|_: ()| async { Err::<RawResponse<()>, _>(Cancelled) }));
        assert_eq!(svc.oneshot(()).await, Err(Cancelled));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn global_timeout_yields_timed_out_exception() {
        let (ctx, layer) = layer();
        ctx.set_timeout(Some(Duration::from_millis(100))).unwrap();
        let svc = layer.layer(service_fn(|_: ()| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, io::Error>(RawResponse::with_body(200, ()))
        }));
        let response = svc.oneshot(()).await.unwrap();
        let failure = response.as_failure().unwrap();
        match failure {
            Failure::Exception(e) => {
                assert_eq!(e.downcast_ref::<TimedOut>(), Some(&TimedOut { timeout: Duration::from_millis(100) }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn mappers_apply_to_adapted_responses() {
        let (ctx, layer) = layer();
        ctx.register_failure_mapper(|_: Failure| Failure::from(crate::response::ErrorPayload::message("mapped")));
        let svc = layer.layer(service_fn(|_: ()| async { Ok::<_, io::Error>(RawResponse::<()>::new(404)) }));
        assert_eq!(svc.oneshot(()).await.unwrap().message().as_deref(), Some("mapped"));
    }
}
