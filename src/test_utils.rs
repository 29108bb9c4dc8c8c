//! Test helpers: logging setup and assertion macros.
//!
//! Enabled for unit tests and, through the `test-internals` feature, for
//! integration tests.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`-style filtering through `tracing-subscriber` defaults;
/// output goes through the test harness writer so it is captured per test.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .with_target(false)
            .try_init();
    });
}

#[doc(hidden)]
pub fn log_phase(name: &str) {
    tracing::info!(test = name, "test phase start");
}

#[doc(hidden)]
pub fn log_complete(name: &str) {
    tracing::info!(test = name, "test complete");
}

#[doc(hidden)]
pub fn log_assertion(passed: bool, message: &str, expected: &str, actual: &str) {
    if passed {
        tracing::debug!(what = message, expected, actual, "assertion passed");
    } else {
        tracing::error!(what = message, expected, actual, "assertion failed");
    }
}

/// Marks the start of a test phase in the log.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::log_phase($name)
    };
}

/// Marks successful completion of a test in the log.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::log_complete($name)
    };
}

/// Asserts `cond`, logging the expected and actual values either way.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let passed: bool = $cond;
        let expected = format!("{:?}", $expected);
        let actual = format!("{:?}", $actual);
        $crate::test_utils::log_assertion(passed, $msg, &expected, &actual);
        assert!(passed, "{}: expected {}, got {}", $msg, expected, actual);
    }};
}
