//! Background thread that drives a timer driver against the wall clock.
//!
//! Hosts without their own event loop can hand timers a [`DriverThread`]'s
//! handle. Callbacks and completion wake-ups then run on the driver thread,
//! so timers shared with other threads must be reached through `Arc`.

use crate::config::DriverThreadConfig;
use crate::tracing_compat::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::driver::TimerDriverHandle;

/// A running driver thread.
///
/// The thread sleeps until the earliest deadline (bounded by
/// `max_park`), runs elapsed registrations, and is woken early whenever a
/// registration is armed or re-armed. It stops when this value is dropped.
///
/// # Example
///
/// ```
/// use countdown::config::DriverThreadConfig;
/// use countdown::time::{DriverThread, Timer};
/// use std::time::Duration;
///
/// let host = DriverThread::spawn(DriverThreadConfig::default())?;
/// let timer = Timer::new(host.handle(), Duration::from_millis(5))?;
/// let done = timer.completion();
/// timer.start();
/// done.wait_blocking();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DriverThread {
    driver: TimerDriverHandle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DriverThread {
    /// Spawns a driver thread over a fresh wall-clock driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(config: DriverThreadConfig) -> std::io::Result<Self> {
        Self::spawn_with(TimerDriverHandle::with_wall_clock(), config)
    }

    /// Spawns a driver thread over an existing driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_with(driver: TimerDriverHandle, config: DriverThreadConfig) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let max_park = config.max_park.as_finite();

        let thread = {
            let driver = driver.clone();
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(config.thread_name.clone())
                .spawn(move || drive_loop(&driver, &running, max_park))?
        };
        driver.attach_host(Some(thread.thread().clone()));
        // Catch registrations armed before the host was attached.
        thread.thread().unpark();
        debug!(thread = %config.thread_name, ?max_park, "driver thread started");

        Ok(Self {
            driver,
            running,
            thread: Some(thread),
        })
    }

    /// Returns the handle timers should be created against.
    #[must_use]
    pub fn handle(&self) -> &TimerDriverHandle {
        &self.driver
    }

    /// Stops the thread and waits for it to exit.
    ///
    /// Registrations still pending stay in the driver but no longer fire
    /// unless another host processes them.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.driver.attach_host(None);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                debug!("driver thread exited by panic");
            }
            debug!("driver thread stopped");
        }
    }
}

impl Drop for DriverThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive_loop(driver: &TimerDriverHandle, running: &AtomicBool, max_park: Option<Duration>) {
    while running.load(Ordering::Acquire) {
        driver.process_timers();

        let until_next = driver
            .next_deadline()
            .map(|deadline| deadline.duration_since(driver.now()));
        let park_for = match (until_next, max_park) {
            (Some(next), Some(max)) => Some(next.min(max)),
            (Some(next), None) => Some(next),
            (None, max) => max,
        };
        match park_for {
            Some(d) if d.is_zero() => {}
            Some(d) => thread::park_timeout(d),
            None => thread::park(),
        }
    }
}
