//! Restartable, cancellable delay timer.
//!
//! A [`Timer`] owns at most one registration in a timer driver, an ordered
//! list of callbacks, and a completion signal that is replaced after every
//! fire. When the registration elapses the timer fires:
//!
//! 1. every callback runs once, in insertion order, each under
//!    `catch_unwind` (a panic is reported to the failure hook and the
//!    remaining callbacks still run);
//! 2. the current completion signal resolves;
//! 3. a fresh, unresolved signal is installed for the next cycle.
//!
//! # Fire modes
//!
//! With [`FireMode::Retain`] (the default) firing keeps the elapsed
//! registration, so the timer still counts as running: `start()` is a no-op
//! until `stop()`, while `reset()` re-arms the same registration. With
//! [`FireMode::Release`] firing releases the registration and the timer goes
//! back to idle, so `start()` arms afresh.
//!
//! # Example
//!
//! ```
//! use countdown::time::{Timer, TimerDriverHandle, VirtualClock};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let driver = TimerDriverHandle::with_virtual_clock(clock.clone());
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = fired.clone();
//!
//! let timer = Timer::new(&driver, Duration::from_millis(50))?;
//! let done = timer.completion();
//! timer
//!     .add_callback(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .start();
//!
//! clock.advance(Duration::from_millis(50));
//! driver.process_timers();
//! assert_eq!(fired.load(Ordering::SeqCst), 1);
//! assert!(done.is_complete());
//! # Ok::<(), countdown::Error>(())
//! ```

use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace};
use crate::types::{TimerId, WaitDuration};
use parking_lot::Mutex;
use serde::Deserialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::driver::{RegistrationHandle, TimerDriverHandle};
use super::failure::{self, CallbackFailure};
use super::signal::{Completion, CompletionSignal};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// What a fire does with the registration that elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// Keep the elapsed registration. The timer stays running until
    /// stopped; `start()` does nothing in the meantime.
    #[default]
    Retain,
    /// Release the registration on fire. The timer returns to idle.
    Release,
}

struct TimerState {
    /// Present iff the timer is running.
    registration: Option<RegistrationHandle>,
    callbacks: Vec<Callback>,
    signal: CompletionSignal,
}

struct TimerShared {
    id: TimerId,
    duration: Duration,
    fire_mode: FireMode,
    driver: TimerDriverHandle,
    state: Mutex<TimerState>,
}

impl TimerShared {
    fn arm_locked(self: &Arc<Self>, state: &mut TimerState) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let registration = self.driver.arm(self.duration, move |elapsed| {
            if let Some(shared) = weak.upgrade() {
                shared.fire(elapsed);
            }
        });
        state.registration = Some(registration);
    }

    fn fire(&self, elapsed: &RegistrationHandle) {
        let (callbacks, released) = {
            let mut state = self.state.lock();
            // An elapse collected before a stop, restart, or reset. A reset
            // keeps the registration but moves it to a new cycle.
            if state.registration.as_ref() != Some(elapsed) {
                trace!(timer = %self.id, registration = elapsed.id(), "stale elapse ignored");
                return;
            }
            let released = match self.fire_mode {
                FireMode::Retain => None,
                FireMode::Release => state.registration.take(),
            };
            (state.callbacks.clone(), released)
        };
        if let Some(registration) = released {
            self.driver.cancel(&registration);
        }

        debug!(timer = %self.id, callbacks = callbacks.len(), "timer fired");
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                failure::report(&CallbackFailure::from_panic(
                    self.id,
                    index,
                    &*payload,
                ));
            }
        }

        let finished = std::mem::replace(&mut self.state.lock().signal, CompletionSignal::new());
        finished.resolve();
    }
}

impl Drop for TimerShared {
    fn drop(&mut self) {
        if let Some(registration) = self.state.get_mut().registration.take() {
            self.driver.cancel(&registration);
        }
    }
}

/// A restartable, cancellable delay built over a timer driver.
///
/// All operations take `&self` and return `&Self` so they chain. The timer
/// is `Send + Sync`; every mutation goes through one lock per timer, and
/// callbacks run without that lock held, so a callback may call back into
/// the timer (through a shared reference it captured).
///
/// Dropping the timer cancels its registration; a dropped timer never
/// fires.
pub struct Timer {
    shared: Arc<TimerShared>,
}

impl Timer {
    /// Creates an idle timer that fires `duration` after each start.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `duration` is
    /// [`WaitDuration::Forever`].
    pub fn new(driver: &TimerDriverHandle, duration: impl Into<WaitDuration>) -> Result<Self> {
        Self::with_fire_mode(driver, duration, FireMode::default())
    }

    /// Creates an idle timer with an explicit [`FireMode`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `duration` is
    /// [`WaitDuration::Forever`].
    pub fn with_fire_mode(
        driver: &TimerDriverHandle,
        duration: impl Into<WaitDuration>,
        fire_mode: FireMode,
    ) -> Result<Self> {
        let duration = duration.into().require_finite("duration")?;
        Ok(Self {
            shared: Arc::new(TimerShared {
                id: TimerId::next(),
                duration,
                fire_mode,
                driver: driver.clone(),
                state: Mutex::new(TimerState {
                    registration: None,
                    callbacks: Vec::new(),
                    signal: CompletionSignal::new(),
                }),
            }),
        })
    }

    /// Creates a timer from configuration, starting it if `autostart` is set.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the configured duration is missing or
    /// forever.
    pub fn from_config(driver: &TimerDriverHandle, config: &TimerConfig) -> Result<Self> {
        let duration = config
            .duration
            .ok_or_else(|| Error::invalid_argument("duration is missing"))?;
        let timer = Self::with_fire_mode(driver, duration, config.fire_mode)?;
        if config.autostart {
            timer.start();
        }
        Ok(timer)
    }

    /// Returns this timer's identifier.
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.shared.id
    }

    /// Returns the delay between a start and the fire.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.shared.duration
    }

    /// Returns the fire mode chosen at construction.
    #[must_use]
    pub fn fire_mode(&self) -> FireMode {
        self.shared.fire_mode
    }

    /// Returns `true` while the timer holds a registration.
    ///
    /// Under [`FireMode::Retain`] this stays `true` after a fire until
    /// [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().registration.is_some()
    }

    /// Returns `true` while a countdown is in progress and has not elapsed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        let state = self.shared.state.lock();
        state
            .registration
            .as_ref()
            .is_some_and(|r| self.shared.driver.is_pending(r))
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.shared.state.lock().callbacks.len()
    }

    /// Starts the countdown if the timer is not running; otherwise does
    /// nothing.
    pub fn start(&self) -> &Self {
        let mut state = self.shared.state.lock();
        if state.registration.is_none() {
            self.shared.arm_locked(&mut state);
            debug!(timer = %self.shared.id, duration = ?self.shared.duration, "timer started");
        }
        self
    }

    /// Stops the countdown if the timer is running; otherwise does nothing.
    ///
    /// Callbacks and the current completion signal are left untouched; an
    /// awaiter of the signal stays pending until some later fire.
    pub fn stop(&self) -> &Self {
        let registration = self.shared.state.lock().registration.take();
        if let Some(registration) = registration {
            self.shared.driver.cancel(&registration);
            debug!(timer = %self.shared.id, "timer stopped");
        }
        self
    }

    /// Restarts the countdown from now.
    ///
    /// A running timer re-arms its existing registration in place; an idle
    /// timer behaves exactly like [`start`](Self::start).
    pub fn reset(&self) -> &Self {
        let mut state = self.shared.state.lock();
        let current = state
            .registration
            .as_ref()
            .and_then(|r| self.shared.driver.rearm(r, self.shared.duration));
        if let Some(current) = current {
            state.registration = Some(current);
            debug!(timer = %self.shared.id, "timer reset in place");
        } else {
            // Idle, or the driver released our registration behind our back.
            self.shared.arm_locked(&mut state);
            debug!(timer = %self.shared.id, "timer reset from idle");
        }
        self
    }

    /// Appends a callback to run on every subsequent fire.
    ///
    /// Duplicates are allowed and each runs separately.
    pub fn add_callback<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.state.lock().callbacks.push(Arc::new(callback));
        self
    }

    /// Returns a handle to the current completion signal.
    ///
    /// The handle completes at the next fire after this call. It does not
    /// start the timer; if the timer never fires it never completes.
    pub fn completion(&self) -> Completion {
        self.shared.state.lock().signal.completion()
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Timer")
            .field("id", &self.shared.id)
            .field("duration", &self.shared.duration)
            .field("fire_mode", &self.shared.fire_mode)
            .field("running", &state.registration.is_some())
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}
