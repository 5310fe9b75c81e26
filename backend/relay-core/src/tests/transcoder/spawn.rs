use crate::config::TranscoderConfig;
use crate::transcoder::spawn::{build_spawn_command, build_transcode_args};

use common::RedactedStreamKey;
use models::TranscodeTarget;

fn target(destination_base: &str, key: &str) -> TranscodeTarget {
    let config = TranscoderConfig {
        destination_base: destination_base.to_string(),
        ..TranscoderConfig::default()
    };
    config.target_for(RedactedStreamKey::new(key)).unwrap()
}

/// **VALUE**: Verifies the transcoder receives the exact fixed argument list.
///
/// **WHY THIS MATTERS**: ffmpeg's arguments are positional around `-i`; reading from stdin,
/// low-latency x264 and wall-clock timestamps are what make a browser recording pushable.
///
/// **BUG THIS CATCHES**: Would catch a reordered flag, a dropped `-use_wallclock_as_timestamps`
/// or the destination not being last.
#[test]
fn given_default_target_when_args_built_then_matches_fixed_invocation() {
    // GIVEN: Default encoding and a key
    let target = target("rtmp://live-sao.twitch.tv/app", "abc123");

    // WHEN: Building the argument list
    let args = build_transcode_args(&target);

    // THEN: Exact invocation
    let expected = [
        "-i",
        "-",
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-tune",
        "zerolatency",
        "-c:a",
        "aac",
        "-ar",
        "44100",
        "-b:a",
        "64k",
        "-y",
        "-use_wallclock_as_timestamps",
        "1",
        "-async",
        "1",
        "-bufsize",
        "1000",
        "-f",
        "flv",
        "rtmp://live-sao.twitch.tv/app/abc123",
    ];
    assert_eq!(args, expected);
}

/// **VALUE**: Verifies the key reaches the transcoder verbatim while logs see it redacted.
#[test]
fn given_target_when_args_built_then_only_last_arg_contains_key() {
    // GIVEN: A distinctive key
    let target = target("rtmp://ingest.example.com/app", "live_sk_9f8e7d");

    // WHEN: Building args
    let args = build_transcode_args(&target);

    // THEN: Key appears once, at the end
    let with_key: Vec<_> = args.iter().filter(|a| a.contains("live_sk_9f8e7d")).collect();
    assert_eq!(with_key.len(), 1);
    assert!(args.last().unwrap().ends_with("/live_sk_9f8e7d"));
    assert!(!target.redacted_destination().contains("live_sk_9f8e7d"));
}

/// **VALUE**: Verifies the command is built for the configured program with piped stdin.
#[test]
fn given_program_when_command_built_then_uses_program_and_args() {
    // GIVEN: A custom program path
    let target = target("rtmp://ingest.example.com/app", "abc123");

    // WHEN: Building the command
    let cmd = build_spawn_command("/opt/ffmpeg/bin/ffmpeg", &target);

    // THEN: Program and argument count carried through
    let std_cmd = cmd.as_std();
    assert_eq!(std_cmd.get_program(), "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(std_cmd.get_args().count(), build_transcode_args(&target).len());
}
