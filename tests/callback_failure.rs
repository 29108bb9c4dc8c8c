//! Panicking callbacks are isolated and reported to the failure hook.

use countdown::time::{CallbackFailure, Timer, TimerDriverHandle, VirtualClock};
use countdown::{assert_with_log, test_complete, test_phase};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn panicking_callback_does_not_stop_the_cycle() {
    countdown::test_utils::init_test_logging();
    test_phase!("panicking_callback_does_not_stop_the_cycle");

    let reported: Arc<Mutex<Vec<CallbackFailure>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    countdown::time::set_failure_hook(move |failure| sink.lock().push(failure.clone()));

    let clock = Arc::new(VirtualClock::new());
    let driver = TimerDriverHandle::with_virtual_clock(clock.clone());
    let timer = Timer::new(&driver, Duration::from_millis(5)).expect("finite timer");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let completion = timer.completion();
    timer
        .add_callback(|| panic!("first callback exploded"))
        .add_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .start();

    clock.advance(Duration::from_millis(5));
    driver.process_timers();

    let count = hits.load(Ordering::SeqCst);
    assert_with_log!(count == 1, "second callback ran", 1, count);
    assert_with_log!(completion.is_complete(), "signal resolved", true, false);

    let failures = reported.lock().clone();
    assert_with_log!(failures.len() == 1, "one failure reported", 1, failures.len());
    let failure = &failures[0];
    assert_with_log!(failure.timer() == timer.id(), "attributed to timer", timer.id(), failure.timer());
    assert_with_log!(failure.index() == 0, "first callback", 0, failure.index());
    assert_with_log!(
        failure.message() == "first callback exploded",
        "panic message",
        "first callback exploded",
        failure.message()
    );

    // The next cycle behaves the same way.
    timer.reset();
    clock.advance(Duration::from_millis(5));
    driver.process_timers();
    let count = hits.load(Ordering::SeqCst);
    assert_with_log!(count == 2, "second cycle", 2, count);
    assert_with_log!(reported.lock().len() == 2, "reported again", 2, reported.lock().len());

    assert_with_log!(
        countdown::time::take_failure_hook().is_some(),
        "hook removed",
        true,
        false
    );
    test_complete!("panicking_callback_does_not_stop_the_cycle");
}
