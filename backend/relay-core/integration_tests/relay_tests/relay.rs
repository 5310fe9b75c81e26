use crate::relay_tests::helpers::{
    CHATTY_TRANSCODER, CRASHING_TRANSCODER, RECORDING_TRANSCODER, connect, eventually,
    receive_text, signal_lines, start_relay, wait_for_close, wait_for_sessions,
};

use relay_core::{DIAGNOSTIC_NOTICE, READY_ACK, SETUP_ERROR_PREFIX};

use std::fs;

use futures_util::SinkExt;
use serial_test::serial;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn frame(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

/// **VALUE**: Verifies the full happy path: acknowledgement, ordered byte-exact feed, and an
/// interrupt to the transcoder once the client disconnects.
///
/// **WHY THIS MATTERS**: This is the relay's whole job. Reordered or dropped chunks corrupt
/// the container; a transcoder that never gets SIGINT never finalizes the push.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `HELLO` is not the first message
/// - Chunks are written out of order or partially
/// - Client disconnect leaves the transcoder running
/// - The interrupt is sent more than once
#[tokio::test]
#[serial]
async fn given_stream_key_when_client_streams_frames_then_transcoder_receives_bytes_in_order() {
    // GIVEN: A relay and a client streaming with key abc123
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("abc123")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);

    // WHEN: Three binary chunks are sent, then the client disconnects
    let chunks = [frame(1, 1000), frame(2, 500), frame(3, 1000)];
    for chunk in &chunks {
        ws.send(Message::Binary(chunk.clone().into()))
            .await
            .expect("Failed to send chunk");
    }
    ws.close(None).await.expect("Failed to close");

    // THEN: Session ends, transcoder saw all 2500 bytes in order and one interrupt
    assert!(
        wait_for_sessions(&fixture.handle, 0).await,
        "Session should end after client disconnect"
    );
    let written = fs::read(fixture.output("abc123")).expect("Transcoder output missing");
    assert_eq!(written, chunks.concat());
    assert_eq!(signal_lines(&fixture.signals("abc123")), vec!["interrupted"]);
}

/// **VALUE**: Verifies a transcoder exit closes the client connection.
///
/// **WHY THIS MATTERS**: A client that keeps recording into a dead session streams to nowhere.
///
/// **BUG THIS CATCHES**: Would catch the session waiting only on client input and never
/// noticing the process ended.
#[tokio::test]
#[serial]
async fn given_transcoder_exits_when_session_live_then_client_connection_closed() {
    // GIVEN: A relay whose transcoder exits with status 1 immediately
    let fixture = start_relay(CRASHING_TRANSCODER).await;

    // WHEN: A client connects with a key
    let mut ws = connect(&fixture.handle, Some("abc123")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);

    // THEN: The server closes the connection and releases the session
    assert!(wait_for_close(&mut ws).await, "Connection should be closed");
    assert!(wait_for_sessions(&fixture.handle, 0).await);
}

/// **VALUE**: Verifies connections without a usable key are refused without a transcoder.
///
/// **WHY THIS MATTERS**: Spawning ffmpeg with an empty key pushes to the bare ingest URL.
///
/// **BUG THIS CATCHES**: Would catch a blank, whitespace-only or missing key reaching the
/// spawn step.
#[tokio::test]
#[serial]
async fn given_missing_or_empty_key_when_connecting_then_setup_error_and_no_transcoder() {
    // GIVEN: A relay
    let fixture = start_relay(RECORDING_TRANSCODER).await;

    for key in [None, Some(""), Some("%20%20")] {
        // WHEN: A client connects without a usable key
        let mut ws = connect(&fixture.handle, key).await;

        // THEN: Acknowledged, then told why, then closed
        assert_eq!(receive_text(&mut ws).await, READY_ACK);
        let error = receive_text(&mut ws).await;
        assert!(
            error.starts_with(SETUP_ERROR_PREFIX),
            "Expected setup error, got {error}"
        );
        assert!(wait_for_close(&mut ws).await, "Connection should be closed");
    }

    // THEN: No transcoder was ever started
    assert!(fixture.spawn_markers().is_empty());
    assert_eq!(fixture.handle.active_sessions().await, 0);
}

/// **VALUE**: Verifies concurrent sessions are isolated.
///
/// **BUG THIS CATCHES**: Would catch shared feed state sending one client's media to another
/// client's transcoder.
#[tokio::test]
#[serial]
async fn given_two_clients_when_streaming_then_each_transcoder_receives_only_its_frames() {
    // GIVEN: Two live sessions
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let mut alpha = connect(&fixture.handle, Some("alpha")).await;
    let mut beta = connect(&fixture.handle, Some("beta")).await;
    assert_eq!(receive_text(&mut alpha).await, READY_ACK);
    assert_eq!(receive_text(&mut beta).await, READY_ACK);

    // WHEN: They interleave chunks
    for round in 0..3u8 {
        alpha
            .send(Message::Binary(frame(0xa0 + round, 64).into()))
            .await
            .unwrap();
        beta.send(Message::Binary(frame(0xb0 + round, 32).into()))
            .await
            .unwrap();
    }
    alpha.close(None).await.unwrap();
    beta.close(None).await.unwrap();

    // THEN: Each output holds only its own chunks, in order
    assert!(wait_for_sessions(&fixture.handle, 0).await);
    let alpha_expected: Vec<u8> = (0..3u8).flat_map(|r| frame(0xa0 + r, 64)).collect();
    let beta_expected: Vec<u8> = (0..3u8).flat_map(|r| frame(0xb0 + r, 32)).collect();
    assert_eq!(fs::read(fixture.output("alpha")).unwrap(), alpha_expected);
    assert_eq!(fs::read(fixture.output("beta")).unwrap(), beta_expected);
}

/// **VALUE**: Verifies a second connection for a live key is refused and the first survives.
///
/// **WHY THIS MATTERS**: Two pushes to one key make the ingest server drop both.
#[tokio::test]
#[serial]
async fn given_live_key_when_second_client_connects_then_rejected_and_first_unaffected() {
    // GIVEN: A live session for dup
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let mut first = connect(&fixture.handle, Some("dup")).await;
    assert_eq!(receive_text(&mut first).await, READY_ACK);
    assert!(wait_for_sessions(&fixture.handle, 1).await);

    // WHEN: A second client presents the same key
    let mut second = connect(&fixture.handle, Some("dup")).await;
    assert_eq!(receive_text(&mut second).await, READY_ACK);
    let error = receive_text(&mut second).await;

    // THEN: Second is rejected, first still streams
    assert!(error.starts_with(SETUP_ERROR_PREFIX), "Got {error}");
    assert!(wait_for_close(&mut second).await);

    first
        .send(Message::Binary(frame(9, 128).into()))
        .await
        .unwrap();
    first.close(None).await.unwrap();
    assert!(wait_for_sessions(&fixture.handle, 0).await);
    assert_eq!(fs::read(fixture.output("dup")).unwrap(), frame(9, 128));
}

/// **VALUE**: Verifies text frames are never written to the transcoder.
#[tokio::test]
#[serial]
async fn given_text_frame_when_streaming_then_not_forwarded() {
    // GIVEN: A live session
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("textkey")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);

    // WHEN: A text frame and a binary frame are sent
    ws.send(Message::Text("not media".into())).await.unwrap();
    ws.send(Message::Binary(frame(7, 10).into())).await.unwrap();
    ws.close(None).await.unwrap();

    // THEN: Only the binary payload reached the transcoder
    assert!(wait_for_sessions(&fixture.handle, 0).await);
    assert_eq!(fs::read(fixture.output("textkey")).unwrap(), frame(7, 10));
}

/// **VALUE**: Verifies transcoder stderr output produces a notice to the client.
///
/// **BUG THIS CATCHES**: Would catch stderr not being drained (the process eventually blocks)
/// or the notice never being sent.
#[tokio::test]
#[serial]
async fn given_transcoder_writes_stderr_when_session_live_then_client_receives_notice() {
    // GIVEN: A transcoder that writes a status line at startup
    let fixture = start_relay(CHATTY_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("chatty")).await;

    // WHEN: The session starts
    assert_eq!(receive_text(&mut ws).await, READY_ACK);

    // THEN: A diagnostic notice follows
    assert_eq!(receive_text(&mut ws).await, DIAGNOSTIC_NOTICE);
    ws.close(None).await.unwrap();
    assert!(wait_for_sessions(&fixture.handle, 0).await);
}

/// **VALUE**: Verifies shutdown ends live sessions and interrupts their transcoders.
///
/// **WHY THIS MATTERS**: A relay restart must not leave orphaned ffmpeg processes pushing.
#[tokio::test]
#[serial]
async fn given_live_session_when_server_shut_down_then_client_closed_and_transcoder_interrupted() {
    // GIVEN: A live session
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("shutdown")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);
    let spawned = fixture.spawned("shutdown");
    assert!(eventually(|| spawned.exists()).await, "Transcoder should start");

    // WHEN: The server shuts down
    let signals = fixture.signals("shutdown");
    let dir = fixture.dir;
    fixture.handle.shutdown().await;

    // THEN: Client closed, transcoder interrupted exactly once
    assert!(wait_for_close(&mut ws).await);
    assert_eq!(signal_lines(&signals), vec!["interrupted"]);
    drop(dir);
}

/// **VALUE**: Verifies upgrades on any other path are refused.
#[tokio::test]
#[serial]
async fn given_unknown_path_when_connecting_then_upgrade_rejected() {
    // GIVEN: A relay on /rtmp
    let fixture = start_relay(RECORDING_TRANSCODER).await;

    // WHEN: Connecting to /other
    let url = format!("ws://{}/other?key=abc123", fixture.handle.local_addr());
    let result = connect_async(&url).await;

    // THEN: Handshake fails and nothing is spawned
    assert!(result.is_err());
    assert!(fixture.spawn_markers().is_empty());
}
