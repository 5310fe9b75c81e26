use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every error in the relay carries an ErrorLocation. If capture
/// breaks, operators lose the one clue that tells them which teardown path failed.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` stops being propagated
/// or if the file/line/column fields are swapped or dropped.
#[test]
#[track_caller]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN: Current caller location
    // WHEN: Creating ErrorLocation from caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert!(location.line > 0, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` Display format.
///
/// **WHY THIS MATTERS**: Every error enum renders `{message} {location}`. Log readers
/// grep for the bracketed form.
///
/// **BUG THIS CATCHES**: Would catch a Display change that drops the brackets or
/// one of the three components.
#[test]
#[track_caller]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = format!("{location}");

    // THEN: Should produce "[file:line:column]" format
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(formatted.contains("error_location.rs"));
    assert!(formatted.contains(&format!(":{}:", location.line)));
    assert!(formatted.ends_with(&format!(":{}]", location.column)));
}

/// **VALUE**: Verifies that `#[track_caller]` helpers report their call sites.
///
/// **WHY THIS MATTERS**: Error constructors in relay-core are wrapped in helpers.
/// Without propagation every error would point at the helper.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` from a helper chain.
#[test]
fn given_multiple_call_sites_when_capturing_location_then_each_has_unique_line() {
    // GIVEN: A helper function that captures location
    #[track_caller]
    fn capture_location() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Capturing location from different call sites
    let first = capture_location();
    let second = capture_location();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file, "Should have same file");
    assert_eq!(first.line + 1, second.line, "Lines should be sequential");
}
