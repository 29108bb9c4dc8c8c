//! One-shot waits that need no persistent timer.

use crate::error::Result;
use crate::types::WaitDuration;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::driver::{RegistrationHandle, TimerDriverHandle};
use super::signal::{Completion, CompletionSignal};

/// Returns a future that completes once `duration` has elapsed on `driver`.
///
/// The registration is armed immediately, not on first poll.
///
/// # Errors
///
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument) if `duration`
/// is [`WaitDuration::Forever`]; nothing is armed in that case.
///
/// # Example
///
/// ```
/// use countdown::time::{TimerDriverHandle, VirtualClock, wait_for};
/// use countdown::types::WaitDuration;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(VirtualClock::new());
/// let driver = TimerDriverHandle::with_virtual_clock(clock.clone());
///
/// assert!(wait_for(&driver, WaitDuration::FOREVER).is_err());
///
/// let wait = wait_for(&driver, Duration::from_millis(20))?;
/// clock.advance(Duration::from_millis(20));
/// driver.process_timers();
/// assert!(wait.is_elapsed());
/// # Ok::<(), countdown::Error>(())
/// ```
pub fn wait_for(driver: &TimerDriverHandle, duration: impl Into<WaitDuration>) -> Result<WaitFor> {
    let delay = duration.into().require_finite("duration")?;
    let signal = CompletionSignal::new();
    let completion = signal.completion();
    let registration = driver.arm(delay, move |_| {
        signal.resolve();
    });
    Ok(WaitFor {
        completion,
        registration: Some(registration),
        driver: driver.clone(),
    })
}

/// Future returned by [`wait_for`].
///
/// Dropping it before it completes cancels the registration.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WaitFor {
    completion: Completion,
    registration: Option<RegistrationHandle>,
    driver: TimerDriverHandle,
}

impl WaitFor {
    /// Returns `true` once the delay has elapsed.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.completion.is_complete()
    }

    fn release(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.driver.cancel(&registration);
        }
    }
}

impl Future for WaitFor {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = &mut *self;
        match Pin::new(&mut this.completion).poll(cx) {
            Poll::Ready(()) => {
                this.release();
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for WaitFor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::VirtualClock;
    use std::sync::Arc;
    use std::task::Waker;
    use std::time::Duration;

    fn poll_once(fut: &mut WaitFor) -> Poll<()> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn forever_is_rejected_and_arms_nothing() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("forever_is_rejected_and_arms_nothing");
        let driver = TimerDriverHandle::with_virtual_clock(Arc::new(VirtualClock::new()));
        let err = wait_for(&driver, WaitDuration::FOREVER).unwrap_err();
        crate::assert_with_log!(err.is_invalid_argument(), "invalid argument", true, false);
        let count = driver.registration_count();
        crate::assert_with_log!(count == 0, "nothing armed", 0, count);
        crate::test_complete!("forever_is_rejected_and_arms_nothing");
    }

    #[test]
    fn completes_after_delay_and_releases_registration() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("completes_after_delay_and_releases_registration");
        let clock = Arc::new(VirtualClock::new());
        let driver = TimerDriverHandle::with_virtual_clock(clock.clone());
        let mut wait = wait_for(&driver, Duration::from_millis(30)).expect("finite wait");

        crate::assert_with_log!(poll_once(&mut wait).is_pending(), "pending", true, false);
        clock.advance(Duration::from_millis(29));
        driver.process_timers();
        crate::assert_with_log!(poll_once(&mut wait).is_pending(), "still pending", true, false);

        clock.advance(Duration::from_millis(1));
        driver.process_timers();
        crate::assert_with_log!(poll_once(&mut wait).is_ready(), "ready", true, false);
        let count = driver.registration_count();
        crate::assert_with_log!(count == 0, "released after completion", 0, count);
        crate::test_complete!("completes_after_delay_and_releases_registration");
    }

    #[test]
    fn dropping_early_cancels() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("dropping_early_cancels");
        let driver = TimerDriverHandle::with_virtual_clock(Arc::new(VirtualClock::new()));
        let wait = wait_for(&driver, Duration::from_secs(1)).expect("finite wait");
        crate::assert_with_log!(driver.pending_count() == 1, "armed", 1, driver.pending_count());
        drop(wait);
        let count = driver.registration_count();
        crate::assert_with_log!(count == 0, "cancelled on drop", 0, count);
        crate::test_complete!("dropping_early_cancels");
    }
}
