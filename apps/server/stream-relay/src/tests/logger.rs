// Unit tests for logger module initialization logic
// Tests focus on thread-safety and error handling

use crate::logger::initialize;

use std::path::PathBuf;

use log::LevelFilter;
use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Startup paths and tests may both initialize logging. A second
/// call must not crash the relay.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to panic when trying to set a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = TempDir::new().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path(), LevelFilter::Debug);
    let result2 = initialize(temp_dir.path(), LevelFilter::Debug);

    // THEN: Both should return Ok (second one logs warning but doesn't error)
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
}

/// **VALUE**: Verifies that logger handles unusable directories without panicking.
///
/// **BUG THIS CATCHES**: Would catch if `fern::log_file()` unwraps instead of returning
/// a Result.
///
/// Only meaningful when this test wins the race to initialize; otherwise the guard
/// returns Ok and there's nothing to check.
#[test]
fn given_invalid_log_dir_when_initialize_called_then_does_not_panic() {
    // GIVEN: A path that can't hold a file
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Calling initialize with invalid directory
    let result = initialize(&invalid_dir, LevelFilter::Info);

    // THEN: Either an App error, or Ok because another test initialized first
    if let Err(err) = result {
        let err_string = format!("{err:?}");
        assert!(
            err_string.contains("App"),
            "Error should be StreamRelayError::App variant"
        );
    }
}
