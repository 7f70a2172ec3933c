//! Cached request source.
//!
//! A [`DataSource`] wraps one request-producing call and keeps a single slot for its outcome:
//!
//! ```text
//! Empty --request()--> Pending --call completes--> Committed(response)
//!   ^                     |                              |
//!   +----- cancelled -----+          invalidate() / refetch / retry
//! ```
//!
//! - At most one call is in flight. Concurrent `request()`s while `Pending` share it and see the
//!   same outcome.
//! - A committed success is re-served without a new call under [`RetainPolicy::RetainSuccess`].
//! - A committed failure schedules a delayed retry while the retry budget lasts. The retry is
//!   detached: the caller of `request()` gets the failure, observers see every outcome. Budget is
//!   spent when the retry fires, so a retry superseded by a newer call costs nothing.
//! - `invalidate()` drops the committed value, restores the budget and re-issues the call.
//! - `dispose()` aborts every in-flight call, superseded ones included; waiters receive
//!   [`Cancelled`].
//!
//! Every transition bumps a generation number under the slot mutex; a call whose generation is
//! no longer current still answers its own waiters but never commits.
//!
//! ```rust
//! use apiresponse::{ApiResponse, DataSource, SourceState};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let source = DataSource::new(|| async { Ok(ApiResponse::success(42)) });
//! assert_eq!(source.state(), SourceState::Empty);
//! assert_eq!(source.request().await.unwrap().get_or_none(), Some(42));
//! assert_eq!(source.state(), SourceState::Committed);
//! # });
//! ```

use crate::disposable::{Disposable, DisposableBag};
use crate::error::{BuildError, Cancelled};
use crate::response::ApiResponse;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::spawner::{contained, Spawner, TokioSpawner};
use futures::future::{AbortHandle, Abortable, BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type CallFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<ApiResponse<T>, Cancelled>> + Send + Sync>;
type Observer<T> = Arc<dyn Fn(&ApiResponse<T>) + Send + Sync>;
type Flight<T> = Shared<BoxFuture<'static, Result<ApiResponse<T>, Cancelled>>>;

/// Whether a committed success is re-served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetainPolicy {
    /// Serve the committed success until invalidated.
    #[default]
    RetainSuccess,
    /// Issue a new call on every `request()`.
    AlwaysRefetch,
}

/// Whether a chained source is requested after this source fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcatStrategy {
    /// The chain halts at a failure.
    #[default]
    StopOnFailure,
    /// The chain proceeds regardless of outcome.
    Continuous,
}

/// Observable state of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Empty,
    Pending,
    Committed,
}

enum Slot<T> {
    Empty,
    Pending(Flight<T>),
    Committed(ApiResponse<T>),
}

struct Cell<T> {
    slot: Slot<T>,
    generation: u64,
    retries_left: u32,
    // One handle per live call: an invalidated call keeps running for its own waiters.
    aborts: Vec<(u64, AbortHandle)>,
    disposed: bool,
}

/// Something a source can request after its own call completes.
trait ChainLink: Send + Sync {
    fn trigger(&self) -> BoxFuture<'static, ()>;
}

struct Inner<T> {
    call: CallFn<T>,
    retain: RetainPolicy,
    retry_budget: u32,
    retry_interval: Duration,
    concat_strategy: ConcatStrategy,
    spawner: Arc<dyn Spawner>,
    sleeper: Arc<dyn Sleeper>,
    cell: Mutex<Cell<T>>,
    observers: Mutex<Vec<Observer<T>>>,
    next: Mutex<Option<Arc<dyn ChainLink>>>,
}

impl<T> Inner<T> {
    fn cell(&self) -> MutexGuard<'_, Cell<T>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Begin<T> {
    Ready(ApiResponse<T>),
    Wait(Flight<T>),
    Disposed,
}

/// Handle to a cached request source. Clones share state.
pub struct DataSource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DataSource<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> std::fmt::Debug for DataSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.inner.cell();
        let state = match cell.slot {
            Slot::Empty => SourceState::Empty,
            Slot::Pending(_) => SourceState::Pending,
            Slot::Committed(_) => SourceState::Committed,
        };
        f.debug_struct("DataSource")
            .field("state", &state)
            .field("generation", &cell.generation)
            .field("retries_left", &cell.retries_left)
            .field("retain", &self.inner.retain)
            .field("disposed", &cell.disposed)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> DataSource<T> {
    /// Source with default settings: retain success, no retries, tokio spawner and timer.
    pub fn new<F, Fut>(call: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<T>, Cancelled>> + Send + 'static,
    {
        Self::builder(call).assemble()
    }

    pub fn builder<F, Fut>(call: F) -> DataSourceBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<T>, Cancelled>> + Send + 'static,
    {
        DataSourceBuilder::new(Arc::new(move || call().boxed()))
    }

    /// Serve the retained success, join the in-flight call, or issue a new one.
    pub async fn request(&self) -> Result<ApiResponse<T>, Cancelled> {
        match self.begin() {
            Begin::Ready(response) => Ok(response),
            Begin::Wait(flight) => flight.await,
            Begin::Disposed => Err(Cancelled),
        }
    }

    fn begin(&self) -> Begin<T> {
        let mut cell = self.inner.cell();
        if cell.disposed {
            return Begin::Disposed;
        }
        match &cell.slot {
            Slot::Pending(flight) => {
                tracing::trace!(generation = cell.generation, "joining in-flight call");
                return Begin::Wait(flight.clone());
            }
            Slot::Committed(response)
                if response.is_success() && self.inner.retain == RetainPolicy::RetainSuccess =>
            {
                tracing::trace!(generation = cell.generation, "serving retained success");
                return Begin::Ready(response.clone());
            }
            _ => {}
        }
        Begin::Wait(self.launch(&mut cell))
    }

    /// Start a new call under the slot lock. The call itself runs when the flight is first polled.
    fn launch(&self, cell: &mut Cell<T>) -> Flight<T> {
        cell.generation += 1;
        let generation = cell.generation;
        let (handle, registration) = AbortHandle::new_pair();
        let call = self.inner.call.clone();
        let source = Arc::downgrade(&self.inner);
        let flight = async move {
            let outcome = Abortable::new(call(), registration).await.unwrap_or(Err(Cancelled));
            if let Some(inner) = source.upgrade() {
                DataSource { inner }.settle(generation, &outcome);
            }
            outcome
        }
        .boxed()
        .shared();
        cell.aborts.push((generation, handle));
        cell.slot = Slot::Pending(flight.clone());
        tracing::debug!(generation, "data source call issued");
        flight
    }

    fn settle(&self, generation: u64, outcome: &Result<ApiResponse<T>, Cancelled>) {
        let mut cell = self.inner.cell();
        cell.aborts.retain(|(g, _)| *g != generation);
        if cell.disposed || cell.generation != generation {
            tracing::debug!(generation, current = cell.generation, "stale outcome discarded");
            return;
        }
        let response = match outcome {
            Err(Cancelled) => {
                cell.slot = Slot::Empty;
                tracing::debug!(generation, "data source call cancelled");
                return;
            }
            Ok(response) => response,
        };
        cell.slot = Slot::Committed(response.clone());
        let retry = response.is_failure() && cell.retries_left > 0;
        tracing::debug!(
            generation,
            success = response.is_success(),
            retries_left = cell.retries_left,
            "data source outcome committed"
        );
        drop(cell);

        let observers = self.inner.observers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for observer in &observers {
            observer(response);
        }

        let next = self.inner.next.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(next) = next {
            if response.is_success() || self.inner.concat_strategy == ConcatStrategy::Continuous {
                self.inner.spawner.spawn(contained("data_source_concat", next.trigger()));
            } else {
                tracing::debug!(generation, "chain halted on failure");
            }
        }

        if retry {
            self.schedule_retry(generation);
        }
    }

    fn schedule_retry(&self, generation: u64) {
        let source = Arc::downgrade(&self.inner);
        let sleeper = self.inner.sleeper.clone();
        let interval = self.inner.retry_interval;
        let delay_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(generation, delay_ms, "data source retry scheduled");
        let task = async move {
            sleeper.sleep(interval).await;
            let Some(inner) = source.upgrade() else {
                return;
            };
            let source = DataSource { inner };
            let flight = {
                let mut cell = source.inner.cell();
                if cell.disposed || cell.generation != generation || cell.retries_left == 0 {
                    tracing::debug!(generation, "retry superseded");
                    return;
                }
                cell.retries_left -= 1;
                source.launch(&mut cell)
            };
            let _ = flight.await;
        };
        self.inner.spawner.spawn(contained("data_source_retry", task.boxed()));
    }

    /// Drop the committed value, restore the retry budget and re-issue the call in the background.
    ///
    /// An in-flight call is not aborted; its outcome still reaches its own waiters but is not
    /// committed.
    pub fn invalidate(&self) {
        let flight = {
            let mut cell = self.inner.cell();
            if cell.disposed {
                return;
            }
            cell.slot = Slot::Empty;
            cell.retries_left = self.inner.retry_budget;
            tracing::debug!(generation = cell.generation, "data source invalidated");
            self.launch(&mut cell)
        };
        self.inner.spawner.spawn(contained(
            "data_source_invalidate",
            async move {
                let _ = flight.await;
            }
            .boxed(),
        ));
    }

    /// Request `next` whenever a call of this source completes, subject to the concat strategy.
    /// Replaces any previous link.
    pub fn concat<U: Clone + Send + Sync + 'static>(&self, next: &DataSource<U>) {
        let link: Arc<dyn ChainLink> = Arc::new(next.clone());
        *self.inner.next.lock().unwrap_or_else(PoisonError::into_inner) = Some(link);
    }

    /// Add an observer notified of every committed outcome.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&ApiResponse<T>) + Send + Sync + 'static,
    {
        self.inner.observers.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::new(observer));
    }

    pub fn committed(&self) -> Option<ApiResponse<T>> {
        match &self.inner.cell().slot {
            Slot::Committed(response) => Some(response.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> SourceState {
        match self.inner.cell().slot {
            Slot::Empty => SourceState::Empty,
            Slot::Pending(_) => SourceState::Pending,
            Slot::Committed(_) => SourceState::Committed,
        }
    }

    /// Retries left before failures stop being retried.
    pub fn retry_budget(&self) -> u32 {
        self.inner.cell().retries_left
    }

    /// Abort every in-flight call and retire the source. Waiters and later requests get
    /// [`Cancelled`].
    pub fn dispose(&self) {
        {
            let mut cell = self.inner.cell();
            if cell.disposed {
                return;
            }
            cell.disposed = true;
            cell.slot = Slot::Empty;
            for (_, handle) in cell.aborts.drain(..) {
                handle.abort();
            }
        }
        self.inner.observers.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.inner.next.lock().unwrap_or_else(PoisonError::into_inner).take();
        tracing::debug!("data source disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cell().disposed
    }
}

impl<T: Clone + Send + Sync + 'static> ChainLink for DataSource<T> {
    fn trigger(&self) -> BoxFuture<'static, ()> {
        let source = self.clone();
        async move {
            if source.request().await.is_err() {
                tracing::debug!("chained source cancelled");
            }
        }
        .boxed()
    }
}

impl<T: Clone + Send + Sync + 'static> Disposable for DataSource<T> {
    fn dispose(&self) {
        DataSource::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        DataSource::is_disposed(self)
    }
}

/// Builder for [`DataSource`].
pub struct DataSourceBuilder<T> {
    call: CallFn<T>,
    retain: RetainPolicy,
    retry_budget: u32,
    retry_interval: Duration,
    observers: Vec<Observer<T>>,
    concat_strategy: ConcatStrategy,
    spawner: Arc<dyn Spawner>,
    sleeper: Arc<dyn Sleeper>,
    bag: Option<DisposableBag>,
}

impl<T: Clone + Send + Sync + 'static> DataSourceBuilder<T> {
    fn new(call: CallFn<T>) -> Self {
        Self {
            call,
            retain: RetainPolicy::default(),
            retry_budget: 0,
            retry_interval: Duration::ZERO,
            observers: Vec::new(),
            concat_strategy: ConcatStrategy::default(),
            spawner: Arc::new(TokioSpawner),
            sleeper: Arc::new(TokioSleeper),
            bag: None,
        }
    }

    pub fn retain(mut self, policy: RetainPolicy) -> Self {
        self.retain = policy;
        self
    }

    /// Retry failed calls up to `budget` times, `interval` apart.
    pub fn retry(mut self, budget: u32, interval: Duration) -> Self {
        self.retry_budget = budget;
        self.retry_interval = interval;
        self
    }

    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ApiResponse<T>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn concat_strategy(mut self, strategy: ConcatStrategy) -> Self {
        self.concat_strategy = strategy;
        self
    }

    pub fn spawner<S: Spawner + 'static>(mut self, spawner: S) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Register the built source with `bag` so clearing the bag disposes it.
    pub fn disposed_by(mut self, bag: &DisposableBag) -> Self {
        self.bag = Some(bag.clone());
        self
    }

    pub fn build(self) -> Result<DataSource<T>, BuildError> {
        if self.retry_budget > 0 && self.retry_interval.is_zero() {
            return Err(BuildError::ZeroRetryInterval { budget: self.retry_budget });
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> DataSource<T> {
        let source = DataSource {
            inner: Arc::new(Inner {
                call: self.call,
                retain: self.retain,
                retry_budget: self.retry_budget,
                retry_interval: self.retry_interval,
                concat_strategy: self.concat_strategy,
                spawner: self.spawner,
                sleeper: self.sleeper,
                cell: Mutex::new(Cell {
                    slot: Slot::Empty,
                    generation: 0,
                    retries_left: self.retry_budget,
                    aborts: Vec::new(),
                    disposed: false,
                }),
                observers: Mutex::new(self.observers),
                next: Mutex::new(None),
            }),
        };
        if let Some(bag) = self.bag {
            bag.add(source.clone());
        }
        source
    }
}
