//! Reporting of timer callbacks that panic.
//!
//! Each callback runs under `catch_unwind`. A panic is packaged as a
//! [`CallbackFailure`] and handed to the process-wide failure hook, in the
//! spirit of [`std::panic::set_hook`]. The remaining callbacks and the
//! completion signal are unaffected.

#[cfg(feature = "tracing-integration")]
use crate::tracing_compat::error;
use crate::types::TimerId;
use core::fmt;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

/// Process-wide receiver of callback failures.
pub type FailureHook = Arc<dyn Fn(&CallbackFailure) + Send + Sync>;

static FAILURE_HOOK: RwLock<Option<FailureHook>> = parking_lot::const_rwlock(None);

/// A timer callback that panicked during a fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    timer: TimerId,
    index: usize,
    message: String,
}

impl CallbackFailure {
    pub(crate) fn from_panic(timer: TimerId, index: usize, payload: &(dyn Any + Send)) -> Self {
        Self {
            timer,
            index,
            message: panic_message(payload),
        }
    }

    /// The timer whose callback failed.
    #[must_use]
    pub const fn timer(&self) -> TimerId {
        self.timer
    }

    /// Position of the failed callback in registration order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The panic message, or a placeholder for non-string payloads.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} callback #{} panicked: {}",
            self.timer, self.index, self.message
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Installs the process-wide failure hook, replacing any previous one.
pub fn set_failure_hook<F>(hook: F)
where
    F: Fn(&CallbackFailure) + Send + Sync + 'static,
{
    *FAILURE_HOOK.write() = Some(Arc::new(hook));
}

/// Removes the installed failure hook, restoring the default reporter.
pub fn take_failure_hook() -> Option<FailureHook> {
    FAILURE_HOOK.write().take()
}

/// Delivers a failure to the installed hook, or to the default reporter.
pub(crate) fn report(failure: &CallbackFailure) {
    // Cloned out so a hook may itself install or take hooks.
    let hook = FAILURE_HOOK.read().clone();
    match hook {
        Some(hook) => hook(failure),
        None => default_report(failure),
    }
}

#[cfg(feature = "tracing-integration")]
fn default_report(failure: &CallbackFailure) {
    error!(
        timer = %failure.timer,
        index = failure.index,
        panic = %failure.message,
        "timer callback panicked"
    );
}

#[cfg(not(feature = "tracing-integration"))]
fn default_report(failure: &CallbackFailure) {
    eprintln!("{failure}");
}
