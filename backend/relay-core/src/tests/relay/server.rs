use crate::relay::extract_stream_key;

/// **VALUE**: Verifies the stream key is read from the `key` query parameter.
#[test]
fn given_query_with_key_when_extracted_then_returns_key() {
    // GIVEN: A connection query
    let query = Some("key=abc123");

    // WHEN: Extracting
    let key = extract_stream_key(query).unwrap();

    // THEN: Exact key
    assert_eq!(key.as_str(), "abc123");
}

/// **VALUE**: Verifies percent-encoded keys are decoded before use.
///
/// **BUG THIS CATCHES**: Would catch the raw `%2F` form being pushed to the ingest server,
/// which would reject the stream.
#[test]
fn given_encoded_key_among_other_params_when_extracted_then_decoded() {
    // GIVEN: Several parameters and an encoded key
    let query = Some("v=2&key=live%5Fsk%2B1&key=second");

    // WHEN: Extracting
    let key = extract_stream_key(query).unwrap();

    // THEN: First key, decoded
    assert_eq!(key.as_str(), "live_sk+1");
}

/// **VALUE**: Verifies a missing query or parameter yields no key.
#[test]
fn given_no_key_param_when_extracted_then_returns_none() {
    // GIVEN/WHEN/THEN: No query, and a query without `key`
    assert!(extract_stream_key(None).is_none());
    assert!(extract_stream_key(Some("stream=abc123")).is_none());
}

/// **VALUE**: Verifies an empty value is returned so the session can reject it as blank.
#[test]
fn given_empty_key_when_extracted_then_returns_blank_key() {
    // GIVEN: `key=` with no value
    let query = Some("key=");

    // WHEN: Extracting
    let key = extract_stream_key(query).unwrap();

    // THEN: Present but blank
    assert!(key.is_blank());
}
