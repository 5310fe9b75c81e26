use crate::{ModelError, TranscodeTargetBuilder};

use common::RedactedStreamKey;

fn valid_builder() -> TranscodeTargetBuilder {
    TranscodeTargetBuilder::default()
        .with_destination_base("rtmp://live.example.com/app")
        .with_stream_key(RedactedStreamKey::new("abc123"))
}

fn validation_message(builder: TranscodeTargetBuilder) -> String {
    match builder.build() {
        Err(ModelError::Validation { message, .. }) => message,
        Ok(_) => panic!("Expected validation error"),
    }
}

/// **VALUE**: Verifies that a missing stream key is rejected before anything spawns.
///
/// **WHY THIS MATTERS**: A session without a key would push to the bare application
/// URL. The remote endpoint rejects that, but only after a transcoder was started.
///
/// **BUG THIS CATCHES**: Would catch the required-field check being dropped.
#[test]
fn given_missing_stream_key_when_building_then_returns_validation_error() {
    // GIVEN: Builder without a key
    let builder =
        TranscodeTargetBuilder::default().with_destination_base("rtmp://live.example.com/app");

    // WHEN/THEN: Building fails with the key message
    assert_eq!(validation_message(builder), "Stream key is required");
}

/// **VALUE**: Verifies that an empty or whitespace key is rejected.
///
/// **WHY THIS MATTERS**: `?key=` is present but empty; it must behave like a missing key.
///
/// **BUG THIS CATCHES**: Would catch a presence-only check letting `""` through.
#[test]
fn given_blank_stream_key_when_building_then_returns_validation_error() {
    for blank in ["", "  "] {
        // GIVEN: Builder with a blank key
        let builder = valid_builder().with_stream_key(RedactedStreamKey::new(blank));

        // WHEN/THEN: Building fails
        assert_eq!(validation_message(builder), "Stream key cannot be empty");
    }
}

/// **VALUE**: Verifies that the destination base is required and non-empty.
///
/// **WHY THIS MATTERS**: Without a destination the transcoder would treat the
/// stream key itself as an output path.
///
/// **BUG THIS CATCHES**: Would catch the destination checks being removed.
#[test]
fn given_missing_or_empty_destination_when_building_then_returns_validation_error() {
    // GIVEN: No destination
    let missing = TranscodeTargetBuilder::default().with_stream_key(RedactedStreamKey::new("k"));
    assert_eq!(validation_message(missing), "Destination base is required");

    // GIVEN: Destination made only of slashes
    let empty = valid_builder().with_destination_base("///");
    assert_eq!(validation_message(empty), "Destination base cannot be empty");
}

/// **VALUE**: Verifies the key is appended as a single path suffix.
///
/// **WHY THIS MATTERS**: The key is a credential/path suffix on one fixed endpoint.
/// A doubled slash breaks RTMP application parsing on some ingest servers.
///
/// **BUG THIS CATCHES**: Would catch trailing-slash handling regressions.
#[test]
fn given_destination_with_trailing_slash_when_built_then_uri_has_single_separator() {
    // GIVEN: Destination with a trailing slash
    let target = valid_builder()
        .with_destination_base("rtmp://live.example.com/app/")
        .build()
        .expect("Target should build");

    // WHEN: Rendering the destination
    let uri = target.destination_uri();

    // THEN: Exactly one separator before the key
    assert_eq!(uri, "rtmp://live.example.com/app/abc123");
}

/// **VALUE**: Verifies the log-safe destination never carries the key.
///
/// **WHY THIS MATTERS**: Session setup echoes the destination at info level.
///
/// **BUG THIS CATCHES**: Would catch `redacted_destination` reusing `destination_uri`.
#[test]
fn given_target_when_redacted_destination_rendered_then_key_is_hidden() {
    // GIVEN: A built target
    let target = valid_builder().build().expect("Target should build");

    // WHEN: Rendering the redacted destination
    let redacted = target.redacted_destination();

    // THEN: Key replaced by the placeholder
    assert_eq!(redacted, "rtmp://live.example.com/app/[REDACTED]");
    assert!(!format!("{target:?}").contains("abc123"));
}

/// **VALUE**: Verifies real-time defaults are applied when codec fields are not set.
///
/// **WHY THIS MATTERS**: A zero-config deployment must still produce a low-latency
/// H.264/AAC FLV push.
///
/// **BUG THIS CATCHES**: Would catch a default constant drifting or not being applied.
#[test]
fn given_no_codec_overrides_when_built_then_uses_realtime_defaults() {
    // GIVEN/WHEN: A target with only required fields
    let target = valid_builder().build().expect("Target should build");

    // THEN: Defaults applied
    assert_eq!(target.video_codec(), "libx264");
    assert_eq!(target.video_preset(), "veryfast");
    assert_eq!(target.video_tune(), "zerolatency");
    assert_eq!(target.audio_codec(), "aac");
    assert_eq!(target.audio_sample_rate(), 44_100);
    assert_eq!(target.audio_bitrate(), "64k");
    assert_eq!(target.buffer_size(), 1000);
    assert_eq!(target.container_format(), "flv");
}

/// **VALUE**: Verifies numeric and string codec parameters are validated.
///
/// **WHY THIS MATTERS**: `-ar 0` or `-c:v ""` make ffmpeg exit immediately, which
/// would look like a crash to the client.
///
/// **BUG THIS CATCHES**: Would catch missing zero/empty checks.
#[test]
fn given_invalid_codec_parameters_when_building_then_returns_validation_error() {
    assert_eq!(
        validation_message(valid_builder().with_audio_sample_rate(0)),
        "Audio sample rate must be non-zero"
    );
    assert_eq!(
        validation_message(valid_builder().with_buffer_size(0)),
        "Buffer size must be non-zero"
    );
    assert_eq!(
        validation_message(valid_builder().with_video_codec(" ")),
        "Video codec cannot be empty"
    );
}
