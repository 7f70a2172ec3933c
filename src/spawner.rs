//! Abstraction for launching detached work.
//!
//! Async global operators and data-source retries run as detached tasks: the spawning call site
//! never joins them. Production code uses [`TokioSpawner`], or [`RuntimeSpawner`] when responses
//! are built off the runtime; tests inject [`InlineSpawner`] to run the task to completion before
//! `spawn` returns.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::task::Context;

/// Launch a detached unit of work.
pub trait Spawner: Send + Sync + std::fmt::Debug {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Production spawner: hands the task to the ambient tokio runtime.
///
/// Outside a runtime the task is dropped and a warning is logged. Contexts constructing
/// responses from plain threads should use [`RuntimeSpawner`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => tracing::warn!("no tokio runtime available; detached task dropped"),
        }
    }
}

/// Spawner bound to an explicit runtime, usable from threads that never entered one.
#[derive(Debug, Clone)]
pub struct RuntimeSpawner {
    handle: tokio::runtime::Handle,
}

impl RuntimeSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Spawner for RuntimeSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }
}

/// Test spawner that drives the task to completion on the calling thread.
///
/// The task is polled with a no-op waker until it is ready, so it may be nested inside another
/// inline task. Tasks must make progress without external wake-ups: no tokio timers, no IO.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, mut task: BoxFuture<'static, ()>) {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        while task.poll_unpin(&mut cx).is_pending() {
            std::thread::yield_now();
        }
    }
}

/// Wrap `task` so a panic inside it is logged instead of unwinding into the executor.
pub(crate) fn contained(label: &'static str, task: BoxFuture<'static, ()>) -> BoxFuture<'static, ()> {
    async move {
        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
            tracing::warn!(task = label, "detached task panicked; panic contained");
        }
    }
    .boxed()
}
