//! Optional tracing integration.
//!
//! With the `tracing-integration` feature the level macros are re-exported
//! from [`tracing`]. Without it they expand to nothing, so call sites need no
//! `cfg` of their own.

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __countdown_noop_event {
        ($($arg:tt)*) => {};
    }
}

#[cfg(not(feature = "tracing-integration"))]
pub use crate::__countdown_noop_event as debug;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__countdown_noop_event as error;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__countdown_noop_event as info;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__countdown_noop_event as trace;
#[cfg(not(feature = "tracing-integration"))]
pub use crate::__countdown_noop_event as warn;
