//! Cancellation handles for data sources.
//!
//! A [`Disposable`] cancels whatever work it guards; disposing twice is a no-op. A
//! [`DisposableBag`] collects many of them and disposes them together. Once cleared the bag is
//! spent: anything added afterwards is disposed on the spot.

use futures::future::AbortHandle;
use std::sync::{Arc, Mutex, PoisonError};

pub trait Disposable: Send + Sync {
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
}

impl Disposable for AbortHandle {
    fn dispose(&self) {
        self.abort();
    }

    fn is_disposed(&self) -> bool {
        self.is_aborted()
    }
}

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

#[derive(Default)]
struct BagState {
    items: Vec<Box<dyn Disposable>>,
    disposed: bool,
}

/// Composite container that batch-disposes its members. Clones share the same bag.
#[derive(Clone, Default)]
pub struct DisposableBag {
    state: Arc<Mutex<BagState>>,
}

impl std::fmt::Debug for DisposableBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DisposableBag")
            .field("len", &state.items.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl DisposableBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `item`. Returns `false`, after disposing `item`, if the bag was already cleared.
    pub fn add<D: Disposable + 'static>(&self, item: D) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.disposed {
            drop(state);
            tracing::debug!("disposable added to a cleared bag; disposing immediately");
            item.dispose();
            return false;
        }
        state.items.push(Box::new(item));
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every member and retire the bag.
    pub fn clear(&self) {
        let items = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        tracing::debug!(count = items.len(), "disposing bag");
        for item in items {
            item.dispose();
        }
    }
}

impl Disposable for DisposableBag {
    fn dispose(&self) {
        self.clear();
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).disposed
    }
}
