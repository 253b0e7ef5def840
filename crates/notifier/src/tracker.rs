//! Outstanding-work counter gating shutdown.
//!
//! The coordinator registers work *before* spawning a worker task and moves
//! the returned [`WorkGuard`] into that task. The guard releases its unit on
//! drop, so the count falls on every exit path of the worker, panics included.
//!
//! The count and a `closed` bit share one atomic word. Registering work and
//! closing the tracker therefore cannot interleave: once [`WorkTracker::close`]
//! returns, no new unit can be registered, and [`WorkTracker::wait_idle`]
//! resolving means nothing is or will be in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::error::NotifierError;

const CLOSED: usize = 1 << (usize::BITS - 1);
const COUNT_MASK: usize = !CLOSED;

#[derive(Debug, Default)]
struct Inner {
    state: AtomicUsize,
    idle: Notify,
}

/// Shared counter of in-flight worker tasks.
#[derive(Debug, Clone, Default)]
pub struct WorkTracker {
    inner: Arc<Inner>,
}

/// One registered unit of outstanding work.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the unit of work"]
pub struct WorkGuard {
    inner: Arc<Inner>,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `N` units of work at once.
    ///
    /// Either all `N` guards are issued or, if the tracker is closed, none.
    pub fn register<const N: usize>(&self) -> Result<[WorkGuard; N], NotifierError> {
        let mut current = self.inner.state.load(Ordering::Acquire);
        loop {
            if current & CLOSED != 0 {
                return Err(NotifierError::Draining);
            }
            match self.inner.state.compare_exchange_weak(
                current,
                current + N,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Ok(std::array::from_fn(|_| WorkGuard {
            inner: Arc::clone(&self.inner),
        }))
    }

    /// Refuse any further registration. Idempotent.
    pub fn close(&self) {
        self.inner.state.fetch_or(CLOSED, Ordering::AcqRel);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) & CLOSED != 0
    }

    /// Number of units currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.inner.state.load(Ordering::Acquire) & COUNT_MASK
    }

    /// Resolve once the outstanding count is zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let previous = self.inner.state.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous & COUNT_MASK > 0, "work counter underflow");
        if previous & COUNT_MASK == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
