use crate::relay_tests::helpers::{
    PIPE_FILLING_CHUNK, RECEIVE_TIMEOUT, RECORDING_TRANSCODER, STALLED_CRASHING_TRANSCODER,
    STALLED_TRANSCODER, TEARDOWN_TIMEOUT, connect, eventually, receive_text, signal_lines,
    start_relay, start_relay_with, wait_for_close, wait_for_sessions,
};

use relay_core::READY_ACK;

use std::time::Duration;

use futures_util::SinkExt;
use serial_test::serial;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

fn frame(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

/// **VALUE**: Verifies a client disconnect is noticed while a write to the transcoder is blocked.
///
/// **WHY THIS MATTERS**: ffmpeg stops reading stdin whenever its output side stalls. If the
/// relay only watches the client between writes, a departed client leaves the transcoder
/// pushing and the session occupying its key forever.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The relay loop awaiting the stdin write instead of reading the client
/// - The stuck write keeping the input open so the transcoder is never interrupted
/// - The session never leaving the table
#[tokio::test]
#[serial]
async fn given_transcoder_not_reading_when_client_disconnects_then_transcoder_interrupted() {
    // GIVEN: A live session whose transcoder never reads its input
    let fixture = start_relay_with(STALLED_TRANSCODER, |config| {
        config.transcoder.stop_grace_period = Duration::from_secs(1);
    })
    .await;
    let mut ws = connect(&fixture.handle, Some("stalled")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);
    let spawned = fixture.spawned("stalled");
    assert!(eventually(|| spawned.exists()).await, "Transcoder should start");

    // WHEN: The client sends more than the pipe holds, then disconnects
    ws.send(Message::Binary(frame(5, PIPE_FILLING_CHUNK).into()))
        .await
        .expect("Failed to send chunk");
    ws.close(None).await.expect("Failed to close");

    // THEN: The transcoder is interrupted once and the session is released
    let signals = fixture.signals("stalled");
    assert!(
        eventually(|| signal_lines(&signals) == vec!["interrupted"]).await,
        "Transcoder should be interrupted after the client left"
    );
    assert!(
        wait_for_sessions(&fixture.handle, 0).await,
        "Session should be removed"
    );
}

/// **VALUE**: Verifies server shutdown completes while a session's transcoder input is blocked.
///
/// **BUG THIS CATCHES**: Would catch shutdown waiting on a write that can never finish.
#[tokio::test]
#[serial]
async fn given_transcoder_not_reading_when_server_shut_down_then_shutdown_completes() {
    // GIVEN: A session with a blocked write
    let fixture = start_relay(STALLED_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("stuck")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);
    let spawned = fixture.spawned("stuck");
    assert!(eventually(|| spawned.exists()).await, "Transcoder should start");
    ws.send(Message::Binary(frame(6, PIPE_FILLING_CHUNK).into()))
        .await
        .expect("Failed to send chunk");

    // WHEN: The server shuts down
    let signals = fixture.signals("stuck");
    let dir = fixture.dir;
    let finished = timeout(TEARDOWN_TIMEOUT, fixture.handle.shutdown()).await;

    // THEN: Shutdown returns, the client is closed and the transcoder interrupted
    assert!(finished.is_ok(), "Shutdown should not wait on the blocked write");
    assert!(wait_for_close(&mut ws).await);
    assert_eq!(signal_lines(&signals), vec!["interrupted"]);
    drop(dir);
}

/// **VALUE**: Verifies a transcoder exit is detected while a write to it is blocked.
///
/// **BUG THIS CATCHES**: Would catch exit detection only running between writes, leaving the
/// client streaming into a dead session.
#[tokio::test]
#[serial]
async fn given_blocked_write_when_transcoder_exits_then_client_connection_closed() {
    // GIVEN: A transcoder that never reads and exits after a second
    let fixture = start_relay(STALLED_CRASHING_TRANSCODER).await;
    let mut ws = connect(&fixture.handle, Some("exiting")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);

    // WHEN: The client fills the transcoder's input
    ws.send(Message::Binary(frame(7, PIPE_FILLING_CHUNK).into()))
        .await
        .expect("Failed to send chunk");

    // THEN: The exit still closes the client and releases the session
    assert!(wait_for_close(&mut ws).await, "Connection should be closed");
    assert!(wait_for_sessions(&fixture.handle, 0).await);
}

/// **VALUE**: Verifies a client outrunning a stalled transcoder ends its session instead of
/// growing an unbounded queue.
///
/// **WHY THIS MATTERS**: Media keeps arriving at the capture rate no matter how slow ffmpeg is.
///
/// **BUG THIS CATCHES**: Would catch the relay buffering without limit, or blocking on the full
/// queue and no longer seeing the client.
#[tokio::test]
#[serial]
async fn given_full_feed_queue_when_more_media_arrives_then_session_ends_and_transcoder_interrupted()
{
    // GIVEN: A one-chunk queue in front of a transcoder that never reads
    let fixture = start_relay_with(STALLED_TRANSCODER, |config| {
        config.transcoder.feed_queue_chunks = 1;
    })
    .await;
    let mut ws = connect(&fixture.handle, Some("backlog")).await;
    assert_eq!(receive_text(&mut ws).await, READY_ACK);
    let spawned = fixture.spawned("backlog");
    assert!(eventually(|| spawned.exists()).await, "Transcoder should start");

    // WHEN: Several pipe-sized chunks arrive
    for round in 0..4u8 {
        // The server may already have hung up on the later chunks.
        let _ = ws
            .send(Message::Binary(frame(round, PIPE_FILLING_CHUNK / 4).into()))
            .await;
    }

    // THEN: Session ends, client closed, transcoder interrupted once
    assert!(wait_for_close(&mut ws).await, "Connection should be closed");
    assert!(wait_for_sessions(&fixture.handle, 0).await);
    let signals = fixture.signals("backlog");
    assert!(eventually(|| signal_lines(&signals) == vec!["interrupted"]).await);
}

/// **VALUE**: Verifies shutdown is not held up by a connection that never sends its upgrade.
///
/// **WHY THIS MATTERS**: Port scanners and half-open connections are routine on a public port;
/// one of them must not turn SIGTERM into a hang.
///
/// **BUG THIS CATCHES**: Would catch the handshake running outside the shutdown token.
#[tokio::test]
#[serial]
async fn given_idle_tcp_client_when_server_shut_down_then_shutdown_completes() {
    // GIVEN: A raw TCP connection that sends nothing
    let fixture = start_relay(RECORDING_TRANSCODER).await;
    let _idle = TcpStream::connect(fixture.handle.local_addr())
        .await
        .expect("Failed to connect");
    sleep(Duration::from_millis(100)).await;

    // WHEN: The server shuts down
    let finished = timeout(RECEIVE_TIMEOUT, fixture.handle.shutdown()).await;

    // THEN: It returns promptly
    assert!(finished.is_ok(), "Shutdown should not wait on the idle handshake");
}

/// **VALUE**: Verifies an idle connection is dropped once the handshake timeout passes.
///
/// **BUG THIS CATCHES**: Would catch half-open connections holding a task and a socket forever.
#[tokio::test]
#[serial]
async fn given_idle_tcp_client_when_handshake_times_out_then_connection_dropped() {
    // GIVEN: A short handshake timeout
    let fixture = start_relay_with(RECORDING_TRANSCODER, |config| {
        config.server.handshake_timeout = Duration::from_millis(300);
    })
    .await;

    // WHEN: A client connects and sends nothing
    let mut idle = TcpStream::connect(fixture.handle.local_addr())
        .await
        .expect("Failed to connect");
    let mut buf = [0u8; 16];
    let read = timeout(RECEIVE_TIMEOUT, idle.read(&mut buf))
        .await
        .expect("Server should drop the idle connection");

    // THEN: The server closed it without upgrading or spawning
    assert!(
        matches!(read, Ok(0) | Err(_)),
        "Expected EOF, got {read:?}"
    );
    assert!(fixture.spawn_markers().is_empty());
}
