//! Core value types.
//!
//! - [`time`]: instants on a driver clock
//! - [`wait`]: wait durations with a "forever" sentinel
//! - [`id`]: timer identifiers

pub mod id;
pub mod time;
pub mod wait;

pub use id::TimerId;
pub use time::Time;
pub use wait::WaitDuration;
