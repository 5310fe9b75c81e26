use crate::SessionId;

use common::RedactedStreamKey;

use std::collections::HashSet;

/// **VALUE**: Verifies that equal keys produce equal session ids.
///
/// **WHY THIS MATTERS**: The session table refuses a second push with a live key by
/// looking the id up. Different ids for the same key would allow two transcoders
/// to push to one channel.
///
/// **BUG THIS CATCHES**: Would catch a Hash/Eq that includes per-connection data.
#[test]
fn given_same_key_when_deriving_session_ids_then_ids_are_equal() {
    // GIVEN: Two independently created keys with the same value
    let first = SessionId::from_stream_key(&RedactedStreamKey::new("abc123"));
    let second = SessionId::from_stream_key(&RedactedStreamKey::new("abc123"));

    // WHEN: Inserting both into a set
    let mut set = HashSet::new();
    set.insert(first.clone());
    let inserted = set.insert(second.clone());

    // THEN: They collide
    assert_eq!(first, second);
    assert!(!inserted, "Second id should be a duplicate");
}

/// **VALUE**: Verifies different keys produce different ids.
///
/// **WHY THIS MATTERS**: Independent sessions must never share a table slot.
///
/// **BUG THIS CATCHES**: Would catch an id that ignores the key.
#[test]
fn given_different_keys_when_deriving_session_ids_then_ids_differ() {
    let first = SessionId::from_stream_key(&RedactedStreamKey::new("key-a"));
    let second = SessionId::from_stream_key(&RedactedStreamKey::new("key-b"));

    assert_ne!(first, second);
}

/// **VALUE**: Verifies that session ids format as fingerprints, not keys.
///
/// **WHY THIS MATTERS**: Session ids appear in nearly every relay log line.
///
/// **BUG THIS CATCHES**: Would catch a derived Debug exposing the key wrapper's length
/// or content.
#[test]
fn given_session_id_when_formatted_then_shows_fingerprint_only() {
    // GIVEN: A session id
    let id = SessionId::from_stream_key(&RedactedStreamKey::new("super-secret"));

    // WHEN: Formatting
    let display = id.to_string();
    let debug = format!("{id:?}");

    // THEN: Only the fingerprint is visible
    assert_eq!(display, format!("session-{:08x}", id.fingerprint()));
    assert!(!display.contains("super-secret"));
    assert!(!debug.contains("super-secret"));
}
