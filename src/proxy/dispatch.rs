//! Work dispatch.
//!
//! The accept loop hands each connection to a [`Dispatch`] implementation and
//! never awaits the result. [`WorkerPool`] is the production implementation:
//! a fixed number of handlers run at once, the rest wait for a slot.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{watch, Semaphore};

/// Runs submitted tasks exactly once, eventually, possibly concurrently.
pub trait Dispatch: Send + Sync {
    fn submit(&self, task: BoxFuture<'static, ()>);

    /// Resolves once every submitted task has finished.
    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Fixed-size pool of concurrently running tasks on the Tokio runtime.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    /// Tasks submitted and not yet finished (queued or running).
    pending: Arc<watch::Sender<usize>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            slots: Arc::new(Semaphore::new(size.max(1))),
            pending: Arc::new(pending),
        }
    }

    /// Slots not currently held by a running task.
    pub fn idle(&self) -> usize {
        self.slots.available_permits()
    }

    /// Tasks submitted but not yet finished.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every running and queued task has finished.
    pub async fn drain(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Dispatch for WorkerPool {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        self.pending.send_modify(|n| *n += 1);
        let guard = PendingGuard(self.pending.clone());
        let slots = self.slots.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_slot) = slots.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }

    fn drain(&self) -> BoxFuture<'_, ()> {
        WorkerPool::drain(self).boxed()
    }
}

/// Decrements the pending count when a task ends, even by panic.
struct PendingGuard(Arc<watch::Sender<usize>>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}
