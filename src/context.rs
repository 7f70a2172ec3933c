//! Response construction and the hook registry.
//!
//! A [`ResponseContext`] owns everything construction consults on every call: the success range,
//! the ordered operator and failure-mapper lists, the spawner for detached async operators, and
//! an optional global timeout used by the tower adapter. Tests build isolated contexts; application
//! code usually configures [`ResponseContext::global`] once at startup, which is what
//! [`ApiResponse::of`] and [`ApiResponse::of_async`] use.
//!
//! Construction order:
//! 1. run the producer; an error becomes `Failure::Exception` (a [`Cancelled`] error in the async
//!    path is returned as `Err` instead),
//! 2. classify the status against the success range, read once,
//! 3. fan out to operators in registration order (async ones detached),
//! 4. fold failure mappers in registration order.
//!
//! Registry lists are swapped atomically, so a request never sees a torn list, but a registration
//! racing with in-flight requests may or may not be observed by them. Register hooks at startup.
//!
//! ```rust
//! use apiresponse::{RawResponse, ResponseContext};
//!
//! let ctx = ResponseContext::builder().success_range(200..=204).build().unwrap();
//! let ok = ctx.of(|| Ok::<_, std::io::Error>(RawResponse::with_body(204, "empty?")));
//! let err = ctx.of(|| Ok::<_, std::io::Error>(RawResponse::<&str>::new(205)));
//! assert!(ok.is_success());
//! assert!(err.is_error());
//! ```

use crate::error::{BuildError, Cancelled};
use crate::mapper::{maps, maps_async, AsyncFailureMapper, FailureMapper, RegisteredMapper};
use crate::operator::{dispatch, dispatch_async, AsyncResponseOperator, ResponseEvent, ResponseOperator};
use crate::response::{ApiResponse, ExceptionPayload, Failure, RawResponse};
use crate::spawner::{contained, Spawner, TokioSpawner};
use arc_swap::ArcSwap;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default success range, inclusive.
pub const DEFAULT_SUCCESS_RANGE: RangeInclusive<u16> = 200..=299;

/// An operator as registered.
#[derive(Clone)]
pub enum RegisteredOperator {
    Sync(Arc<dyn ResponseOperator>),
    Async(Arc<dyn AsyncResponseOperator>),
}

#[derive(Clone)]
struct Settings {
    success_range: RangeInclusive<u16>,
    timeout: Option<Duration>,
    spawner: Arc<dyn Spawner>,
}

/// Caller-owned hook registry and construction entry point.
pub struct ResponseContext {
    settings: ArcSwap<Settings>,
    operators: ArcSwap<Vec<RegisteredOperator>>,
    mappers: ArcSwap<Vec<RegisteredMapper>>,
}

impl std::fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settings = self.settings.load();
        f.debug_struct("ResponseContext")
            .field("success_range", &settings.success_range)
            .field("timeout", &settings.timeout)
            .field("spawner", &settings.spawner)
            .field("operators", &self.operators.load().len())
            .field("mappers", &self.mappers.load().len())
            .finish()
    }
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self {
            settings: ArcSwap::from_pointee(Settings {
                success_range: DEFAULT_SUCCESS_RANGE,
                timeout: None,
                spawner: Arc::new(TokioSpawner),
            }),
            operators: ArcSwap::from_pointee(Vec::new()),
            mappers: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

static GLOBAL: OnceLock<ResponseContext> = OnceLock::new();

fn validate_range(range: &RangeInclusive<u16>) -> Result<(), BuildError> {
    if range.start() > range.end() {
        return Err(BuildError::EmptySuccessRange { start: *range.start(), end: *range.end() });
    }
    Ok(())
}

impl ResponseContext {
    /// Context with defaults: `200..=299`, no timeout, [`TokioSpawner`], no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ResponseContextBuilder {
        ResponseContextBuilder::new()
    }

    /// The process-wide default context.
    pub fn global() -> &'static ResponseContext {
        GLOBAL.get_or_init(ResponseContext::default)
    }

    pub fn success_range(&self) -> RangeInclusive<u16> {
        self.settings.load().success_range.clone()
    }

    /// Replace the success range; applies to responses constructed afterwards.
    pub fn set_success_range(&self, range: RangeInclusive<u16>) -> Result<(), BuildError> {
        validate_range(&range)?;
        self.settings.rcu(|s| Settings { success_range: range.clone(), ..(**s).clone() });
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.settings.load().timeout
    }

    /// Set or clear the global request timeout applied by the tower adapter.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), BuildError> {
        if timeout == Some(Duration::ZERO) {
            return Err(BuildError::ZeroTimeout);
        }
        self.settings.rcu(|s| Settings { timeout, ..(**s).clone() });
        Ok(())
    }

    pub fn spawner(&self) -> Arc<dyn Spawner> {
        self.settings.load().spawner.clone()
    }

    pub fn set_spawner<S: Spawner + 'static>(&self, spawner: S) {
        let spawner: Arc<dyn Spawner> = Arc::new(spawner);
        self.settings.rcu(|s| Settings { spawner: spawner.clone(), ..(**s).clone() });
    }

    pub fn register_operator<O: ResponseOperator + 'static>(&self, operator: O) {
        self.push_operator(RegisteredOperator::Sync(Arc::new(operator)));
    }

    pub fn register_async_operator<O: AsyncResponseOperator + 'static>(&self, operator: O) {
        self.push_operator(RegisteredOperator::Async(Arc::new(operator)));
    }

    pub fn register_failure_mapper<M: FailureMapper + 'static>(&self, mapper: M) {
        self.push_mapper(RegisteredMapper::Sync(Arc::new(mapper)));
    }

    pub fn register_async_failure_mapper<M: AsyncFailureMapper + 'static>(&self, mapper: M) {
        self.push_mapper(RegisteredMapper::Async(Arc::new(mapper)));
    }

    pub fn operator_count(&self) -> usize {
        self.operators.load().len()
    }

    pub fn mapper_count(&self) -> usize {
        self.mappers.load().len()
    }

    /// Remove every operator and mapper.
    pub fn clear_hooks(&self) {
        self.operators.store(Arc::new(Vec::new()));
        self.mappers.store(Arc::new(Vec::new()));
    }

    fn push_operator(&self, operator: RegisteredOperator) {
        self.operators.rcu(|ops| {
            let mut next = (**ops).clone();
            next.push(operator.clone());
            next
        });
    }

    fn push_mapper(&self, mapper: RegisteredMapper) {
        self.mappers.rcu(|ms| {
            let mut next = (**ms).clone();
            next.push(mapper.clone());
            next
        });
    }

    /// Build a response from a synchronous producer.
    ///
    /// Only synchronous failure mappers are folded; use [`of_async`](Self::of_async) to run async
    /// mappers as well.
    ///
    /// Async operators are handed to the context's spawner. With the default [`TokioSpawner`] a
    /// call made outside a tokio runtime drops them with a warning; contexts used from plain
    /// threads should be built with a [`RuntimeSpawner`](crate::RuntimeSpawner).
    pub fn of<T, E, F>(&self, produce: F) -> ApiResponse<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<RawResponse<T>, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let settings = self.settings.load_full();
        let response = classify(&settings.success_range, produce().map_err(ExceptionPayload::new));
        self.operate(&settings, &response);
        maps(&self.mappers.load(), response)
    }

    /// Build a response from an asynchronous producer.
    ///
    /// A [`Cancelled`] error from the producer is returned as `Err` and skips operators and
    /// mappers. Async operators are launched detached; async mappers are awaited in place.
    pub async fn of_async<T, E, Fut>(&self, produce: Fut) -> Result<ApiResponse<T>, Cancelled>
    where
        Fut: Future<Output = Result<RawResponse<T>, E>>,
        E: std::error::Error + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        match produce.await {
            Err(err) if is_cancelled(&err) => {
                tracing::debug!("producer cancelled; response not classified");
                Err(Cancelled)
            }
            outcome => Ok(self.complete(outcome.map_err(ExceptionPayload::new)).await),
        }
    }

    /// Classify, operate and map an already awaited outcome.
    pub(crate) async fn complete<T>(&self, outcome: Result<RawResponse<T>, ExceptionPayload>) -> ApiResponse<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let settings = self.settings.load_full();
        let response = classify(&settings.success_range, outcome);
        self.operate(&settings, &response);
        let mappers = self.mappers.load().to_vec();
        maps_async(mappers, response).await
    }

    fn operate<T: Clone + Send + Sync + 'static>(&self, settings: &Settings, response: &ApiResponse<T>) {
        let operators = self.operators.load();
        if operators.is_empty() {
            return;
        }
        let mut event: Option<ResponseEvent> = None;
        for operator in operators.iter() {
            match operator {
                RegisteredOperator::Sync(op) => dispatch(&**op, response),
                RegisteredOperator::Async(op) => {
                    let op = op.clone();
                    let event = event.get_or_insert_with(|| ResponseEvent::of(response)).clone();
                    settings.spawner.spawn(contained(
                        "async_operator",
                        Box::pin(async move { dispatch_async(&*op, event).await }),
                    ));
                }
            }
        }
        tracing::debug!(operators = operators.len(), "operators dispatched");
    }
}

fn classify<T>(range: &RangeInclusive<u16>, outcome: Result<RawResponse<T>, ExceptionPayload>) -> ApiResponse<T> {
    match outcome {
        Ok(raw) => {
            tracing::trace!(status = raw.status(), "classifying response");
            raw.classify(range)
        }
        Err(exception) => ApiResponse::Failure(Failure::Exception(exception)),
    }
}

/// Whether a producer error is a cooperative cancellation rather than a failure.
pub(crate) fn is_cancelled(err: &(dyn std::error::Error + 'static)) -> bool {
    err.is::<Cancelled>()
}

/// Builder for [`ResponseContext`].
pub struct ResponseContextBuilder {
    success_range: RangeInclusive<u16>,
    timeout: Option<Duration>,
    spawner: Arc<dyn Spawner>,
    operators: Vec<RegisteredOperator>,
    mappers: Vec<RegisteredMapper>,
}

impl ResponseContextBuilder {
    pub fn new() -> Self {
        Self {
            success_range: DEFAULT_SUCCESS_RANGE,
            timeout: None,
            spawner: Arc::new(TokioSpawner),
            operators: Vec::new(),
            mappers: Vec::new(),
        }
    }

    pub fn success_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.success_range = range;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn spawner<S: Spawner + 'static>(mut self, spawner: S) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    pub fn operator<O: ResponseOperator + 'static>(mut self, operator: O) -> Self {
        self.operators.push(RegisteredOperator::Sync(Arc::new(operator)));
        self
    }

    pub fn async_operator<O: AsyncResponseOperator + 'static>(mut self, operator: O) -> Self {
        self.operators.push(RegisteredOperator::Async(Arc::new(operator)));
        self
    }

    pub fn failure_mapper<M: FailureMapper + 'static>(mut self, mapper: M) -> Self {
        self.mappers.push(RegisteredMapper::Sync(Arc::new(mapper)));
        self
    }

    pub fn async_failure_mapper<M: AsyncFailureMapper + 'static>(mut self, mapper: M) -> Self {
        self.mappers.push(RegisteredMapper::Async(Arc::new(mapper)));
        self
    }

    pub fn build(self) -> Result<ResponseContext, BuildError> {
        validate_range(&self.success_range)?;
        if self.timeout == Some(Duration::ZERO) {
            return Err(BuildError::ZeroTimeout);
        }
        Ok(ResponseContext {
            settings: ArcSwap::from_pointee(Settings {
                success_range: self.success_range,
                timeout: self.timeout,
                spawner: self.spawner,
            }),
            operators: ArcSwap::from_pointee(self.operators),
            mappers: ArcSwap::from_pointee(self.mappers),
        })
    }
}

impl Default for ResponseContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ApiResponse<T> {
    /// [`ResponseContext::of`] on the global context.
    pub fn of<E, F>(produce: F) -> Self
    where
        F: FnOnce() -> Result<RawResponse<T>, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        ResponseContext::global().of(produce)
    }

    /// [`ResponseContext::of_async`] on the global context.
    pub async fn of_async<E, Fut>(produce: Fut) -> Result<Self, Cancelled>
    where
        Fut: Future<Output = Result<RawResponse<T>, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        ResponseContext::global().of_async(produce).await
    }
}
