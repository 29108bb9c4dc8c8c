//! Timers and the delayed-execution driver they run on.
//!
//! - [`Timer`]: restartable, cancellable delay with callbacks and a
//!   per-cycle completion signal
//! - [`wait_for`]: one-shot wait without a persistent timer
//! - [`TimerDriver`] / [`TimerDriverHandle`]: the delayed-execution primitive
//! - [`TimeSource`]: wall clock for production, [`VirtualClock`] for tests
//! - [`DriverThread`]: background host for callers without an event loop
//! - [`set_failure_hook`]: where panicking callbacks are reported

mod clock;
mod driver;
mod failure;
mod heap;
mod signal;
mod thread;
mod timer;
mod wait;

pub use clock::{TimeSource, VirtualClock, WallClock};
pub use driver::{ElapseFn, RegistrationHandle, TimerDriver, TimerDriverApi, TimerDriverHandle};
pub use failure::{CallbackFailure, FailureHook, set_failure_hook, take_failure_hook};
pub use signal::Completion;
pub use thread::DriverThread;
pub use timer::{FireMode, Timer};
pub use wait::{WaitFor, wait_for};
