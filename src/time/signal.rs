//! Single-use completion signal.
//!
//! A [`CompletionSignal`] is resolved at most once. Owners that need a fresh
//! signal per cycle swap in a new one after resolving. Callers only ever see
//! the read side, [`Completion`], which is a cloneable future bound to the
//! signal that was current when it was obtained.

use parking_lot::Mutex;
use slab::Slab;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct SignalState {
    resolved: bool,
    /// One slot per pending `Completion`, replaced on re-poll.
    waiters: Slab<Waker>,
}

#[derive(Debug, Default)]
struct SignalInner {
    state: Mutex<SignalState>,
}

/// Resolving side of a completion signal.
#[derive(Debug, Default)]
pub(crate) struct CompletionSignal {
    inner: Arc<SignalInner>,
}

impl CompletionSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a read-only handle to this signal.
    pub(crate) fn completion(&self) -> Completion {
        Completion::new(Arc::clone(&self.inner))
    }

    /// Resolves the signal and wakes every waiter.
    ///
    /// Returns `false` if it was already resolved.
    pub(crate) fn resolve(&self) -> bool {
        let waiters = {
            let mut state = self.inner.state.lock();
            if state.resolved {
                return false;
            }
            state.resolved = true;
            std::mem::take(&mut state.waiters)
        };
        for (_, waker) in waiters {
            waker.wake();
        }
        true
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }
}

/// Future that completes when its completion signal resolves.
///
/// Obtained from [`Timer::completion`](super::Timer::completion) or held by
/// [`WaitFor`](super::WaitFor). Clones observe the same signal. A signal that
/// is never resolved leaves its waiters pending forever; compose a timeout
/// if that matters.
///
/// Each handle keeps at most one waker registered, the one from its most
/// recent poll, and gives it up when dropped.
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion {
    inner: Arc<SignalInner>,
    waiter: Option<usize>,
}

impl Completion {
    const fn new(inner: Arc<SignalInner>) -> Self {
        Self {
            inner,
            waiter: None,
        }
    }

    /// Returns `true` once the signal has resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().resolved
    }

    /// Returns `true` if both handles observe the same signal instance.
    #[must_use]
    pub fn same_signal(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Blocks the current thread until the signal resolves.
    ///
    /// Only useful when something else drives the timer driver, such as a
    /// [`DriverThread`](super::DriverThread); otherwise this never returns.
    pub fn wait_blocking(self) {
        futures_lite::future::block_on(self);
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut state = this.inner.state.lock();
        if state.resolved {
            this.waiter = None;
            return Poll::Ready(());
        }
        match this.waiter.and_then(|key| state.waiters.get_mut(key)) {
            Some(waker) => {
                if !waker.will_wake(cx.waker()) {
                    waker.clone_from(cx.waker());
                }
            }
            None => this.waiter = Some(state.waiters.insert(cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Clone for Completion {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.inner))
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(key) = self.waiter.take() {
            let mut state = self.inner.state.lock();
            // After resolve the slab was drained; the key is meaningless.
            if !state.resolved {
                state.waiters.try_remove(key);
            }
        }
    }
}
