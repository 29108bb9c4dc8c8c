//! Countdown: a restartable, cancellable delay timer.
//!
//! # Overview
//!
//! A [`Timer`](time::Timer) wraps one registration in a delayed-execution
//! driver together with the bookkeeping every caller would otherwise rewrite:
//! the pending registration handle, an ordered list of callbacks, and a
//! completion signal that can be awaited and is replaced after each fire.
//!
//! # Core Guarantees
//!
//! - **Ordered callbacks**: every callback runs once per fire, in insertion order
//! - **Completion after callbacks**: an awaiter that observes completion knows every
//!   callback for that cycle already ran
//! - **Fresh signal per cycle**: an awaiter that subscribes after a fire waits for the
//!   next one
//! - **Isolated failures**: a panicking callback is reported, not propagated; the
//!   rest still run and the signal still resolves
//! - **No stale fires**: stopping, re-arming, or dropping a timer prevents the old
//!   registration from firing it
//! - **Deterministic testing**: drivers run against a [`VirtualClock`](time::VirtualClock)
//!   and fire only when told to
//!
//! # Module Structure
//!
//! - [`time`]: timers, one-shot waits, the timer driver, clocks, driver thread
//! - [`types`]: instants, wait durations, timer identifiers
//! - [`config`]: serde configuration (TOML with the `config-file` feature)
//! - [`error`](mod@error): error types
//! - [`tracing_compat`]: optional tracing integration (`tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod time;
pub mod tracing_compat;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use config::{ConfigError, CountdownConfig, DriverThreadConfig, TimerConfig};
pub use error::{Error, Result};
pub use time::{
    Completion, DriverThread, FireMode, Timer, TimerDriver, TimerDriverHandle, WaitFor, wait_for,
};
pub use types::{Time, TimerId, WaitDuration};
