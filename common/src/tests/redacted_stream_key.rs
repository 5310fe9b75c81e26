use crate::RedactedStreamKey;
use crate::redacted_stream_key::REDACTED_PLACEHOLDER;

use serde::Serialize;

/// **VALUE**: Verifies that Debug and Display never print the key.
///
/// **WHY THIS MATTERS**: Session setup logs the target and the key wrapper at info
/// level. A leaked key lets anyone push to the operator's channel.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug or a Display that forwards
/// to the inner string.
#[test]
fn given_stream_key_when_formatted_then_value_is_redacted() {
    // GIVEN: A key with a recognisable value
    let key = RedactedStreamKey::new("live_secret_123");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{key:?}");
    let display = format!("{key}");

    // THEN: Neither contains the secret, Debug keeps the length
    assert!(!debug.contains("live_secret_123"));
    assert!(!display.contains("live_secret_123"));
    assert!(debug.contains("len=15"));
    assert_eq!(display, REDACTED_PLACEHOLDER);
}

/// **VALUE**: Verifies that serializing a key fails loudly.
///
/// **WHY THIS MATTERS**: Structures holding a key might be dumped to TOML or JSON
/// for diagnostics; the key must never ride along.
///
/// **BUG THIS CATCHES**: Would catch a derived Serialize replacing the manual impl.
#[test]
fn given_stream_key_inside_struct_when_serialized_then_returns_error() {
    // GIVEN: A serializable struct carrying a key
    #[derive(Serialize)]
    struct Holder {
        key: RedactedStreamKey,
    }
    let holder = Holder {
        key: RedactedStreamKey::new("abc123"),
    };

    // WHEN: Serializing
    let result = toml::to_string(&holder);

    // THEN: Serialization is refused with a redaction error
    let err = result.expect_err("Serialization should fail");
    assert!(err.to_string().contains("RedactedStreamKey cannot be serialized"));
}

/// **VALUE**: Verifies blank detection for empty and whitespace keys.
///
/// **WHY THIS MATTERS**: A blank key is a setup error; it must never reach the
/// transcoder as an empty path segment.
///
/// **BUG THIS CATCHES**: Would catch `is_blank` only checking `len() == 0`.
#[test]
fn given_blank_keys_when_checked_then_reported_blank() {
    // GIVEN/WHEN/THEN
    assert!(RedactedStreamKey::new("").is_blank());
    assert!(RedactedStreamKey::new("   ").is_blank());
    assert!(!RedactedStreamKey::new("abc123").is_blank());
    assert_eq!(RedactedStreamKey::new("abc123").as_str(), "abc123");
}
