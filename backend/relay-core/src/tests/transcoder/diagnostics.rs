use crate::transcoder::diagnostics::{DiagnosticStats, parse_progress};

/// **VALUE**: Verifies ffmpeg's status line is parsed into frame, time and bitrate.
#[test]
fn given_ffmpeg_status_line_when_parsed_then_returns_progress() {
    // GIVEN: A typical status line
    let line = "frame=  241 fps= 30 q=23.0 size=     512kB time=00:00:08.03 bitrate= 522.3kbits/s speed=1.00x";

    // WHEN: Parsing
    let progress = parse_progress(line).unwrap();

    // THEN: Fields extracted
    assert_eq!(progress.frame, 241);
    assert_eq!(progress.time, "00:00:08.03");
    assert_eq!(progress.bitrate, "522.3kbits/s");
}

/// **VALUE**: Verifies the last report wins when one chunk carries several `\r` updates.
///
/// **BUG THIS CATCHES**: Would catch the summary reporting stale progress.
#[test]
fn given_chunk_with_several_reports_when_parsed_then_last_wins() {
    // GIVEN: Two status updates in one chunk
    let chunk = "frame=   10 fps=0.0 time=00:00:00.33 bitrate= 100.0kbits/s\rframe=   20 fps= 20 time=00:00:00.66 bitrate= 200.0kbits/s\r";

    // WHEN: Parsing
    let progress = parse_progress(chunk).unwrap();

    // THEN: Second report
    assert_eq!(progress.frame, 20);
}

/// **VALUE**: Verifies banner and warning text is not mistaken for progress.
#[test]
fn given_non_progress_text_when_parsed_then_returns_none() {
    // GIVEN: ffmpeg's banner
    let banner = "ffmpeg version 6.1 Copyright (c) 2000-2023 the FFmpeg developers";

    // WHEN/THEN: No progress
    assert!(parse_progress(banner).is_none());
}

/// **VALUE**: Verifies stats count every chunk and keep the latest progress.
#[test]
fn given_recorded_chunks_when_snapshot_taken_then_counts_and_progress_reported() {
    // GIVEN: Stats fed a banner and a status line
    let stats = DiagnosticStats::default();
    let banner = "ffmpeg version 6.1\n";
    let status = "frame=    5 fps=0.0 time=00:00:00.16 bitrate=  64.0kbits/s";
    stats.record(banner, banner.len());
    stats.record(status, status.len());

    // WHEN: Taking a snapshot
    let snapshot = stats.snapshot();

    // THEN: Both chunks counted, progress from the status line
    assert_eq!(snapshot.chunks, 2);
    assert_eq!(snapshot.bytes, (banner.len() + status.len()) as u64);
    assert_eq!(snapshot.last_progress.unwrap().frame, 5);
}
