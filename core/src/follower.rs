//! Followers: consumers advanced along the `_localIndex` sequence.
//!
//! A follower's reference to its owning bowl is a lookup handle, never
//! ownership — [`SyncFollowerHandle`]/[`AsyncFollower`] hold a cheap
//! clone of [`crate::bowl::Bowl`] plus an id, and `unsubscribe` just flips a
//! flag the bowl checks before the next callback.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use anyhow::Result;
use futures::Stream;
use parking_lot::Mutex;

use crate::bowl::{Bowl, WriteEvent};
use crate::document::Document;

/// `sleeping -> running -> sleeping`, with a terminal `quitting` reached by
/// unsubscribe. Observable for tests, not load-bearing for delivery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FollowerState {
    Sleeping,
    Running,
    Quitting,
}

/// A follower callback's failure: bubbled to the owner's registered
/// handler, never retried or swallowed.
#[derive(Debug)]
pub struct FollowerError {
    pub local_index: u64,
    pub error: anyhow::Error,
}

/// Registered alongside a follower to receive callback failures.
pub type ErrorHandler = Arc<dyn Fn(FollowerError) + Send + Sync>;

/// The default error handler used when none is supplied: logs via
/// `tracing` and otherwise does nothing.
pub fn logging_error_handler() -> ErrorHandler {
    Arc::new(|err: FollowerError| {
        tracing::warn!(local_index = err.local_index, error = %err.error, "follower callback failed");
    })
}

pub(crate) type FollowerId = u64;

/// A synchronous follower's callback: invoked inline, before
/// `upsert`/registration returns. Must be cheap and non-blocking.
pub trait SyncFollower: Send {
    fn on_event(&mut self, event: &WriteEvent) -> Result<()>;
}

impl<F> SyncFollower for F
where
    F: FnMut(&WriteEvent) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &WriteEvent) -> Result<()> {
        (self)(event)
    }
}

pub(crate) struct SyncFollowerEntry {
    pub id: FollowerId,
    pub next_index: u64,
    pub quitting: bool,
    pub callback: Box<dyn SyncFollower>,
    pub error_handler: ErrorHandler,
}

/// A lookup handle for a registered synchronous follower.
pub struct SyncFollowerHandle {
    pub(crate) id: FollowerId,
    pub(crate) bowl: Bowl,
}

impl SyncFollowerHandle {
    /// Transitions the follower to `quitting`; any in-flight batch observes
    /// the flag before its next callback.
    pub fn unsubscribe(&self) {
        self.bowl.unsubscribe_sync_follower(self.id);
    }
}

/// Shared state for one async follower, reachable both from the handle the
/// consumer polls and (weakly) from the bowl that wakes it.
pub(crate) struct AsyncFollowerShared {
    next_index: AtomicU64,
    state: Mutex<FollowerState>,
    waker: Mutex<Option<Waker>>,
}

impl AsyncFollowerShared {
    fn new(next_index: u64) -> Self {
        Self {
            next_index: AtomicU64::new(next_index),
            state: Mutex::new(FollowerState::Sleeping),
            waker: Mutex::new(None),
        }
    }

    pub(crate) fn is_quitting(&self) -> bool {
        matches!(*self.state.lock(), FollowerState::Quitting)
    }

    pub(crate) fn wake(&self) {
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// An asynchronous follower: a cooperative [`Stream`] of batches (up
/// to `batch_size` documents each), registered against a `nextIndex` and
/// woken whenever the bowl accepts a new document.
pub struct AsyncFollower {
    bowl: Bowl,
    shared: Arc<AsyncFollowerShared>,
    batch_size: usize,
}

impl AsyncFollower {
    pub(crate) fn new(bowl: Bowl, next_index: u64, batch_size: usize) -> Self {
        let shared = Arc::new(AsyncFollowerShared::new(next_index));
        bowl.register_async_waker(Arc::downgrade(&shared));
        Self {
            bowl,
            shared,
            batch_size,
        }
    }

    /// Current follower state, for observability/tests.
    pub fn state(&self) -> FollowerState {
        *self.shared.state.lock()
    }

    /// Transitions the follower to `quitting`: the stream yields
    /// `None` from the next poll onward.
    pub fn unsubscribe(&self) {
        *self.shared.state.lock() = FollowerState::Quitting;
        self.shared.wake();
    }
}

impl Stream for AsyncFollower {
    type Item = Vec<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.shared.is_quitting() {
            return Poll::Ready(None);
        }
        let next_index = this.shared.next_index.load(Ordering::SeqCst);
        let batch = this.bowl.documents_from(next_index, this.batch_size);
        if batch.is_empty() {
            *this.shared.state.lock() = FollowerState::Sleeping;
            *this.shared.waker.lock() = Some(cx.waker().clone());
            // A quit or write racing the waker registration above still
            // wakes us: unsubscribe/upsert both call `wake()` after
            // mutating shared state, so we never miss a notification.
            if this.shared.is_quitting() {
                return Poll::Ready(None);
            }
            return Poll::Pending;
        }
        *this.shared.state.lock() = FollowerState::Running;
        let new_next = batch.last().and_then(|d| d.local_index).unwrap_or(next_index) + 1;
        this.shared.next_index.store(new_next, Ordering::SeqCst);
        Poll::Ready(Some(batch))
    }
}

pub(crate) type AsyncWaker = Weak<AsyncFollowerShared>;
