//! Timer driver: the delayed-execution primitive timers are built on.
//!
//! A registration pairs a deadline with an elapse action. The driver never
//! runs an action from `arm`/`rearm`; actions run only from
//! [`TimerDriver::process_timers`], at most once per arm/rearm cycle.
//!
//! Registrations stay allocated after they elapse so they can be re-armed
//! in place. They are released only by [`TimerDriver::cancel`] or
//! [`TimerDriver::clear`].

use crate::tracing_compat::trace;
use crate::types::Time;
use parking_lot::Mutex;
use slab::Slab;
use smallvec::SmallVec;
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

use super::clock::{TimeSource, VirtualClock, WallClock};
use super::heap::{DeadlineEntry, DeadlineHeap};

/// Action run when a registration elapses.
///
/// Receives the handle of the registration that elapsed.
pub type ElapseFn = Arc<dyn Fn(&RegistrationHandle) + Send + Sync>;

type ElapsedBatch = SmallVec<[(RegistrationHandle, ElapseFn); 8]>;

/// Identifies one live registration in a driver, at one arm cycle.
///
/// Every handle of a registration can cancel or re-arm it, whatever its
/// cycle, until the registration is cancelled. Equality includes the
/// cycle: the handle an elapse action receives equals the one returned by
/// the `arm`/`rearm` that scheduled it, and no later one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    slot: usize,
    id: u64,
    cycle: u64,
}

impl RegistrationHandle {
    /// Returns the driver-unique id of this registration.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the arm cycle this handle was issued for.
    #[inline]
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }
}

struct Registration {
    id: u64,
    /// Bumped on every re-arm; heap entries from older cycles are stale.
    cycle: u64,
    /// `None` once elapsed.
    deadline: Option<Time>,
    on_elapse: ElapseFn,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("cycle", &self.cycle)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct DriverState {
    slots: Slab<Registration>,
    heap: DeadlineHeap,
    next_id: u64,
}

impl DriverState {
    fn registration(&self, handle: &RegistrationHandle) -> Option<&Registration> {
        self.slots.get(handle.slot).filter(|r| r.id == handle.id)
    }

    fn registration_mut(&mut self, handle: &RegistrationHandle) -> Option<&mut Registration> {
        self.slots.get_mut(handle.slot).filter(|r| r.id == handle.id)
    }

    fn is_current(&self, entry: &DeadlineEntry) -> bool {
        self.slots
            .get(entry.slot)
            .is_some_and(|r| r.cycle == entry.cycle && r.deadline == Some(entry.deadline))
    }
}

/// Timer driver that owns registrations and fires them.
///
/// # Thread Safety
///
/// The driver is thread-safe and can be shared. Elapse actions run outside
/// the driver lock, so they may arm, re-arm, or cancel registrations.
///
/// # Example
///
/// ```
/// use countdown::time::{RegistrationHandle, TimerDriver, VirtualClock};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// let clock = Arc::new(VirtualClock::new());
/// let driver = TimerDriver::with_clock(clock.clone());
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// driver.arm(
///     Duration::from_millis(10),
///     Arc::new(move |_: &RegistrationHandle| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
/// );
///
/// clock.advance(Duration::from_millis(10));
/// assert_eq!(driver.process_timers(), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug)]
pub struct TimerDriver<T: TimeSource = VirtualClock> {
    clock: Arc<T>,
    state: Mutex<DriverState>,
    /// Host thread to unpark when the earliest deadline may have moved.
    host: Mutex<Option<Thread>>,
}

impl<T: TimeSource> TimerDriver<T> {
    /// Creates a new timer driver with the given time source.
    #[must_use]
    pub fn with_clock(clock: Arc<T>) -> Self {
        Self {
            clock,
            state: Mutex::new(DriverState::default()),
            host: Mutex::new(None),
        }
    }

    /// Returns the current time from the underlying clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Arms a new registration that elapses `delay` from now.
    pub fn arm(&self, delay: Duration, on_elapse: ElapseFn) -> RegistrationHandle {
        let deadline = self.clock.now() + delay;
        let handle = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            let slot = state.slots.insert(Registration {
                id,
                cycle: 0,
                deadline: Some(deadline),
                on_elapse,
            });
            state.heap.insert(slot, 0, deadline);
            RegistrationHandle { slot, id, cycle: 0 }
        };
        trace!(registration = handle.id, %deadline, "registration armed");
        self.wake_host();
        handle
    }

    /// Re-arms an existing registration to elapse `delay` from now.
    ///
    /// Works whether the registration is pending or already elapsed; the
    /// previous deadline is superseded. Returns the handle for the new
    /// cycle, or `None` if the registration was cancelled.
    ///
    /// An elapse of an earlier cycle that was already collected by
    /// `process_timers` still runs its action, but with the earlier
    /// handle, which no longer equals the returned one.
    pub fn rearm(
        &self,
        handle: &RegistrationHandle,
        delay: Duration,
    ) -> Option<RegistrationHandle> {
        let deadline = self.clock.now() + delay;
        let current = {
            let mut state = self.state.lock();
            let registration = state.registration_mut(handle)?;
            registration.cycle += 1;
            registration.deadline = Some(deadline);
            let cycle = registration.cycle;
            state.heap.insert(handle.slot, cycle, deadline);
            RegistrationHandle {
                slot: handle.slot,
                id: handle.id,
                cycle,
            }
        };
        trace!(
            registration = current.id,
            cycle = current.cycle,
            %deadline,
            "registration re-armed"
        );
        self.wake_host();
        Some(current)
    }

    /// Cancels and releases a registration.
    ///
    /// Returns `true` if the handle referred to a live registration.
    pub fn cancel(&self, handle: &RegistrationHandle) -> bool {
        let removed = {
            let mut state = self.state.lock();
            if state.registration(handle).is_some() {
                state.slots.try_remove(handle.slot)
            } else {
                None
            }
        };
        // Dropped outside the lock: the action may own state whose drop
        // re-enters the driver.
        let cancelled = removed.is_some();
        drop(removed);
        if cancelled {
            trace!(registration = handle.id, "registration cancelled");
        }
        cancelled
    }

    /// Returns `true` if the registration is waiting to elapse.
    #[must_use]
    pub fn is_pending(&self, handle: &RegistrationHandle) -> bool {
        self.state
            .lock()
            .registration(handle)
            .is_some_and(|r| r.deadline.is_some())
    }

    /// Returns the next deadline that will fire, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        let mut state = self.state.lock();
        while let Some(entry) = state.heap.peek().copied() {
            if state.is_current(&entry) {
                return Some(entry.deadline);
            }
            state.heap.pop();
        }
        None
    }

    /// Runs the elapse action of every registration whose deadline has
    /// passed.
    ///
    /// Returns the number of registrations that elapsed.
    pub fn process_timers(&self) -> usize {
        let now = self.clock.now();

        // Collect under the lock, run outside it: actions commonly re-enter
        // the driver.
        let elapsed = self.collect_expired(now);
        let fired = elapsed.len();
        for (handle, on_elapse) in elapsed {
            trace!(registration = handle.id, %now, "registration elapsed");
            on_elapse(&handle);
        }
        fired
    }

    #[allow(clippy::significant_drop_tightening)]
    fn collect_expired(&self, now: Time) -> ElapsedBatch {
        let mut state = self.state.lock();
        let mut batch = ElapsedBatch::new();
        while let Some(entry) = state.heap.pop_expired(now) {
            if !state.is_current(&entry) {
                continue;
            }
            if let Some(registration) = state.slots.get_mut(entry.slot) {
                registration.deadline = None;
                batch.push((
                    RegistrationHandle {
                        slot: entry.slot,
                        id: registration.id,
                        cycle: entry.cycle,
                    },
                    Arc::clone(&registration.on_elapse),
                ));
            }
        }
        batch
    }

    /// Returns the number of registrations waiting to elapse.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|(_, r)| r.deadline.is_some())
            .count()
    }

    /// Returns the number of live registrations, elapsed ones included.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Returns true if no registration is waiting to elapse.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Releases every registration without running any action.
    pub fn clear(&self) {
        let released = {
            let mut state = self.state.lock();
            state.heap.clear();
            std::mem::take(&mut state.slots)
        };
        drop(released);
    }

    /// Sets the host thread to unpark whenever a registration is armed.
    pub fn attach_host(&self, thread: Option<Thread>) {
        *self.host.lock() = thread;
    }

    fn wake_host(&self) {
        if let Some(thread) = self.host.lock().as_ref() {
            thread.unpark();
        }
    }
}

impl TimerDriver<VirtualClock> {
    /// Creates a new timer driver with a virtual clock.
    ///
    /// This is the default for testing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(VirtualClock::new()))
    }
}

impl Default for TimerDriver<VirtualClock> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TimerDriverHandle - Shared handle for timer driver access
// =============================================================================

/// Trait abstracting timer driver operations for use with trait objects.
///
/// This lets timers run over wall-clock or virtual-clock drivers through one
/// handle type, and lets hosts supply their own delayed-execution facility.
pub trait TimerDriverApi: Send + Sync + std::fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> Time;

    /// Arms a new registration that elapses `delay` from now.
    fn arm(&self, delay: Duration, on_elapse: ElapseFn) -> RegistrationHandle;

    /// Re-arms an existing registration to elapse `delay` from now,
    /// returning the handle for the new cycle.
    fn rearm(
        &self,
        handle: &RegistrationHandle,
        delay: Duration,
    ) -> Option<RegistrationHandle>;

    /// Cancels and releases a registration.
    fn cancel(&self, handle: &RegistrationHandle) -> bool;

    /// Returns `true` if the registration is waiting to elapse.
    fn is_pending(&self, handle: &RegistrationHandle) -> bool;

    /// Returns the next deadline that will fire.
    fn next_deadline(&self) -> Option<Time>;

    /// Runs the actions of elapsed registrations.
    fn process_timers(&self) -> usize;

    /// Returns the number of registrations waiting to elapse.
    fn pending_count(&self) -> usize;

    /// Returns the number of live registrations.
    fn registration_count(&self) -> usize;

    /// Releases every registration without running any action.
    fn clear(&self);

    /// Sets the host thread to unpark whenever a registration is armed.
    fn attach_host(&self, thread: Option<Thread>);
}

impl<T: TimeSource + std::fmt::Debug + 'static> TimerDriverApi for TimerDriver<T> {
    fn now(&self) -> Time {
        Self::now(self)
    }

    fn arm(&self, delay: Duration, on_elapse: ElapseFn) -> RegistrationHandle {
        Self::arm(self, delay, on_elapse)
    }

    fn rearm(
        &self,
        handle: &RegistrationHandle,
        delay: Duration,
    ) -> Option<RegistrationHandle> {
        Self::rearm(self, handle, delay)
    }

    fn cancel(&self, handle: &RegistrationHandle) -> bool {
        Self::cancel(self, handle)
    }

    fn is_pending(&self, handle: &RegistrationHandle) -> bool {
        Self::is_pending(self, handle)
    }

    fn next_deadline(&self) -> Option<Time> {
        Self::next_deadline(self)
    }

    fn process_timers(&self) -> usize {
        Self::process_timers(self)
    }

    fn pending_count(&self) -> usize {
        Self::pending_count(self)
    }

    fn registration_count(&self) -> usize {
        Self::registration_count(self)
    }

    fn clear(&self) {
        Self::clear(self);
    }

    fn attach_host(&self, thread: Option<Thread>) {
        Self::attach_host(self, thread);
    }
}

/// Shared handle to a timer driver.
///
/// Cloneable access to a driver regardless of its time source. Timers and
/// one-shot waits are created against a handle.
#[derive(Clone)]
pub struct TimerDriverHandle {
    inner: Arc<dyn TimerDriverApi>,
}

impl std::fmt::Debug for TimerDriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerDriverHandle")
            .field("pending_count", &self.inner.pending_count())
            .finish()
    }
}

impl TimerDriverHandle {
    /// Creates a new handle wrapping the given timer driver.
    #[inline]
    pub fn new<T: TimeSource + std::fmt::Debug + 'static>(driver: Arc<TimerDriver<T>>) -> Self {
        Self { inner: driver }
    }

    /// Wraps a host-provided driver implementation.
    #[inline]
    pub fn from_api(driver: Arc<dyn TimerDriverApi>) -> Self {
        Self { inner: driver }
    }

    /// Returns true if two handles refer to the same underlying driver.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a handle with a wall clock timer driver for production use.
    #[must_use]
    pub fn with_wall_clock() -> Self {
        Self::new(Arc::new(TimerDriver::with_clock(Arc::new(WallClock::new()))))
    }

    /// Creates a handle with a virtual clock timer driver for testing.
    #[must_use]
    pub fn with_virtual_clock(clock: Arc<VirtualClock>) -> Self {
        Self::new(Arc::new(TimerDriver::with_clock(clock)))
    }

    /// Returns the current time from the timer driver.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.now()
    }

    /// Arms a new registration that runs `on_elapse` once `delay` has
    /// passed.
    #[inline]
    pub fn arm<F>(&self, delay: Duration, on_elapse: F) -> RegistrationHandle
    where
        F: Fn(&RegistrationHandle) + Send + Sync + 'static,
    {
        self.inner.arm(delay, Arc::new(on_elapse))
    }

    /// Re-arms an existing registration to elapse `delay` from now.
    ///
    /// Returns the handle for the new cycle, or `None` if the registration
    /// was cancelled.
    #[inline]
    pub fn rearm(
        &self,
        handle: &RegistrationHandle,
        delay: Duration,
    ) -> Option<RegistrationHandle> {
        self.inner.rearm(handle, delay)
    }

    /// Cancels and releases a registration.
    ///
    /// Returns true if the registration was live.
    #[inline]
    pub fn cancel(&self, handle: &RegistrationHandle) -> bool {
        self.inner.cancel(handle)
    }

    /// Returns `true` if the registration is waiting to elapse.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, handle: &RegistrationHandle) -> bool {
        self.inner.is_pending(handle)
    }

    /// Returns the next deadline that will fire, if any.
    #[inline]
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.inner.next_deadline()
    }

    /// Runs the actions of elapsed registrations.
    ///
    /// Returns the number of registrations that elapsed.
    #[inline]
    pub fn process_timers(&self) -> usize {
        self.inner.process_timers()
    }

    /// Returns the number of registrations waiting to elapse.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    /// Returns the number of live registrations, elapsed ones included.
    #[inline]
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.inner.registration_count()
    }

    /// Releases every registration without running any action.
    #[inline]
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Sets the host thread to unpark whenever a registration is armed.
    #[inline]
    pub fn attach_host(&self, thread: Option<Thread>) {
        self.inner.attach_host(thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn counting(hits: &Arc<AtomicUsize>) -> ElapseFn {
        let hits = Arc::clone(hits);
        Arc::new(move |_: &RegistrationHandle| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn arm_never_fires_synchronously() {
        init_test("arm_never_fires_synchronously");
        let driver = TimerDriver::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = driver.arm(Duration::ZERO, counting(&hits));

        let before = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(before == 0, "no fire inside arm", 0, before);
        crate::assert_with_log!(driver.is_pending(&handle), "pending", true, false);

        let fired = driver.process_timers();
        crate::assert_with_log!(fired == 1, "zero delay fires on next pass", 1, fired);
        crate::test_complete!("arm_never_fires_synchronously");
    }

    #[test]
    fn fires_once_per_cycle() {
        init_test("fires_once_per_cycle");
        let clock = Arc::new(VirtualClock::new());
        let driver = TimerDriver::with_clock(clock.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = driver.arm(Duration::from_millis(100), counting(&hits));

        clock.advance(Duration::from_millis(99));
        crate::assert_with_log!(driver.process_timers() == 0, "not yet", 0, 1);

        clock.advance(Duration::from_millis(1));
        driver.process_timers();
        clock.advance(Duration::from_secs(5));
        driver.process_timers();

        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 1, "exactly one fire", 1, count);
        crate::assert_with_log!(!driver.is_pending(&handle), "elapsed", false, true);
        let live = driver.registration_count();
        crate::assert_with_log!(live == 1, "elapsed registration kept", 1, live);
        crate::test_complete!("fires_once_per_cycle");
    }

    #[test]
    fn rearm_supersedes_previous_deadline() {
        init_test("rearm_supersedes_previous_deadline");
        let clock = Arc::new(VirtualClock::new());
        let driver = TimerDriver::with_clock(clock.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = driver.arm(Duration::from_millis(100), counting(&hits));

        clock.advance(Duration::from_millis(50));
        crate::assert_with_log!(
            driver.rearm(&handle, Duration::from_millis(100)).is_some(),
            "rearm live registration",
            true,
            false
        );
        let next = driver.next_deadline();
        crate::assert_with_log!(
            next == Some(Time::from_millis(150)),
            "stale deadline skipped",
            Some(Time::from_millis(150)),
            next
        );

        clock.advance(Duration::from_millis(50));
        driver.process_timers();
        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 0, "old deadline ignored", 0, count);

        clock.advance(Duration::from_millis(50));
        driver.process_timers();
        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 1, "new deadline fires", 1, count);
        crate::test_complete!("rearm_supersedes_previous_deadline");
    }

    #[test]
    fn rearm_after_elapse_fires_again() {
        init_test("rearm_after_elapse_fires_again");
        let clock = Arc::new(VirtualClock::new());
        let driver = TimerDriver::with_clock(clock.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = driver.arm(Duration::from_millis(10), counting(&hits));

        clock.advance(Duration::from_millis(10));
        driver.process_timers();
        let _ = driver.rearm(&handle, Duration::from_millis(10));
        clock.advance(Duration::from_millis(10));
        driver.process_timers();

        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 2, "fired twice", 2, count);
        let live = driver.registration_count();
        crate::assert_with_log!(live == 1, "no reallocation", 1, live);
        crate::test_complete!("rearm_after_elapse_fires_again");
    }

    #[test]
    fn rearm_in_same_pass_hands_out_the_superseded_cycle() {
        init_test("rearm_in_same_pass_hands_out_the_superseded_cycle");
        let clock = Arc::new(VirtualClock::new());
        let driver = Arc::new(TimerDriver::with_clock(clock.clone()));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let target = Arc::new(parking_lot::Mutex::new(None::<RegistrationHandle>));
        let rearmed = Arc::new(parking_lot::Mutex::new(None::<RegistrationHandle>));

        let interloper_driver = Arc::clone(&driver);
        let interloper_target = Arc::clone(&target);
        let interloper_out = Arc::clone(&rearmed);
        driver.arm(
            Duration::from_millis(10),
            Arc::new(move |_: &RegistrationHandle| {
                let target = interloper_target.lock().clone();
                if let Some(target) = target {
                    *interloper_out.lock() =
                        interloper_driver.rearm(&target, Duration::from_millis(10));
                }
            }),
        );
        let recorder = Arc::clone(&seen);
        let original = driver.arm(
            Duration::from_millis(10),
            Arc::new(move |handle: &RegistrationHandle| {
                recorder.lock().push(handle.clone());
            }),
        );
        *target.lock() = Some(original.clone());

        clock.advance(Duration::from_millis(10));
        driver.process_timers();
        let current = rearmed.lock().clone();
        crate::assert_with_log!(current.is_some(), "rearmed from action", true, false);
        let current = current.unwrap();
        crate::assert_with_log!(current != original, "new cycle handle", true, false);
        crate::assert_with_log!(current.id() == original.id(), "same registration", true, false);
        crate::assert_with_log!(current.cycle() == 1, "cycle advanced", 1, current.cycle());
        crate::assert_with_log!(driver.is_pending(&original), "any cycle sees pending", true, false);

        clock.advance(Duration::from_millis(10));
        driver.process_timers();
        let seen = seen.lock().clone();
        crate::assert_with_log!(
            seen == [original.clone(), current.clone()],
            "collected elapse keeps its cycle",
            [original, current],
            seen
        );
        crate::test_complete!("rearm_in_same_pass_hands_out_the_superseded_cycle");
    }

    #[test]
    fn cancel_prevents_fire_and_invalidates_handle() {
        init_test("cancel_prevents_fire_and_invalidates_handle");
        let clock = Arc::new(VirtualClock::new());
        let driver = TimerDriver::with_clock(clock.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = driver.arm(Duration::from_millis(10), counting(&hits));

        crate::assert_with_log!(driver.cancel(&handle), "cancel live", true, false);
        crate::assert_with_log!(!driver.cancel(&handle), "cancel twice", false, true);
        crate::assert_with_log!(
            driver.rearm(&handle, Duration::from_millis(1)).is_none(),
            "rearm cancelled",
            false,
            true
        );

        clock.advance(Duration::from_secs(1));
        driver.process_timers();
        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 0, "never fired", 0, count);
        crate::assert_with_log!(driver.next_deadline().is_none(), "heap drained", true, false);
        crate::test_complete!("cancel_prevents_fire_and_invalidates_handle");
    }

    #[test]
    fn reused_slot_does_not_honor_old_handle() {
        init_test("reused_slot_does_not_honor_old_handle");
        let driver = TimerDriver::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let old = driver.arm(Duration::from_millis(10), counting(&hits));
        driver.cancel(&old);
        let new = driver.arm(Duration::from_millis(10), counting(&hits));

        crate::assert_with_log!(old != new, "distinct handles", true, false);
        crate::assert_with_log!(!driver.cancel(&old), "old handle dead", false, true);
        crate::assert_with_log!(driver.is_pending(&new), "new still armed", true, false);
        crate::test_complete!("reused_slot_does_not_honor_old_handle");
    }

    #[test]
    fn actions_run_in_deadline_order_and_may_reenter() {
        init_test("actions_run_in_deadline_order_and_may_reenter");
        let clock = Arc::new(VirtualClock::new());
        let driver = Arc::new(TimerDriver::with_clock(clock.clone()));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (label, ms) in [("late", 30_u64), ("early", 10), ("mid", 20)] {
            let order = Arc::clone(&order);
            let reentrant = Arc::clone(&driver);
            driver.arm(
                Duration::from_millis(ms),
                Arc::new(move |handle: &RegistrationHandle| {
                    order.lock().push(label);
                    reentrant.cancel(handle);
                }),
            );
        }

        clock.advance(Duration::from_millis(30));
        let fired = driver.process_timers();
        crate::assert_with_log!(fired == 3, "all fired", 3, fired);
        let seen = order.lock().clone();
        crate::assert_with_log!(
            seen == ["early", "mid", "late"],
            "deadline order",
            ["early", "mid", "late"],
            seen
        );
        let live = driver.registration_count();
        crate::assert_with_log!(live == 0, "actions released themselves", 0, live);
        crate::test_complete!("actions_run_in_deadline_order_and_may_reenter");
    }

    #[test]
    fn clear_releases_without_firing() {
        init_test("clear_releases_without_firing");
        let handle = TimerDriverHandle::with_virtual_clock(Arc::new(VirtualClock::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        handle.arm(Duration::ZERO, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        crate::assert_with_log!(handle.pending_count() == 1, "one pending", 1, 0);

        handle.clear();
        handle.process_timers();
        let count = hits.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 0, "cleared never fire", 0, count);
        crate::assert_with_log!(handle.registration_count() == 0, "released", 0, 1);
        crate::test_complete!("clear_releases_without_firing");
    }

    #[test]
    fn handle_ptr_eq_tracks_driver_identity() {
        init_test("handle_ptr_eq_tracks_driver_identity");
        let a = TimerDriverHandle::with_wall_clock();
        let b = a.clone();
        let c = TimerDriverHandle::with_wall_clock();
        crate::assert_with_log!(a.ptr_eq(&b), "clone shares driver", true, false);
        crate::assert_with_log!(!a.ptr_eq(&c), "separate drivers", false, true);
        crate::test_complete!("handle_ptr_eq_tracks_driver_identity");
    }
}
