// Unit tests for process module private functions

use crate::transcoder::process::{is_running, send_interrupt, send_kill, with_process};

/// **VALUE**: Tests that `with_process()` gracefully handles non-existent PIDs.
///
/// **WHY THIS MATTERS**: A transcoder can exit between the exit check and the signal. The
/// lookup must come back empty instead of panicking.
#[test]
fn given_nonexistent_pid_when_with_process_called_then_returns_none() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN: Calling with_process with the invalid PID
    let result = with_process(fake_pid, |_| true);

    // THEN: Should return None
    assert!(result.is_none(), "Should return None for non-existent process");
}

/// **VALUE**: Tests that `with_process()` executes the closure for a live PID.
#[test]
fn given_valid_pid_when_with_process_called_then_executes_closure() {
    // GIVEN: Our own process
    let our_pid = std::process::id();

    // WHEN: Calling with_process with a closure that returns the PID
    let result = with_process(our_pid, |p| p.pid().as_u32());

    // THEN: Closure ran against the right process
    assert_eq!(result, Some(our_pid));
    assert!(is_running(our_pid));
}

/// **VALUE**: Verifies signalling a vanished transcoder reports failure instead of erroring.
///
/// **BUG THIS CATCHES**: Would catch the stop path treating "already gone" as a fatal error.
#[test]
fn given_nonexistent_pid_when_signalled_then_returns_false() {
    // GIVEN: A PID that doesn't exist
    let fake_pid = u32::MAX;

    // WHEN/THEN: Neither signal is reported as delivered
    assert!(!send_interrupt(fake_pid));
    assert!(!send_kill(fake_pid));
    assert!(!is_running(fake_pid));
}
