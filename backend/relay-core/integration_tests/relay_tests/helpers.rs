//! Test helpers for relay integration tests.
//!
//! This module provides utilities for testing the relay end to end:
//! - Fake transcoder scripts that record their input and signals
//! - Starting a relay bound to an ephemeral port
//! - Connecting clients and reading their messages
//! - Polling for asynchronous teardown

use relay_core::config::RelayConfig;
use relay_core::relay::{RelayServerHandle, start_relay_server};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Copies stdin to the destination (its last argument) and appends a line to
/// `<destination>.signals` on SIGINT. Marks `<destination>.spawned` on start.
pub const RECORDING_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
echo started > "$last.spawned"
trap 'echo interrupted >> "$last.signals"; kill "$sleeper" 2>/dev/null; exit 0' INT
cat > "$last"
sleep 30 &
sleeper=$!
wait "$sleeper"
"#;

/// Same as [`RECORDING_TRANSCODER`] but writes an ffmpeg status line to stderr first.
pub const CHATTY_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
echo started > "$last.spawned"
trap 'echo interrupted >> "$last.signals"; kill "$sleeper" 2>/dev/null; exit 0' INT
echo "frame=    1 fps=0.0 q=0.0 size=       0kB time=00:00:00.03 bitrate=   0.0kbits/s speed=N/A" >&2
cat > "$last"
sleep 30 &
sleeper=$!
wait "$sleeper"
"#;

/// Exits with status 1 without reading any input.
pub const CRASHING_TRANSCODER: &str = "#!/bin/sh\nexit 1\n";

/// Never reads stdin, so writes past the pipe buffer block. Records SIGINT like
/// [`RECORDING_TRANSCODER`].
pub const STALLED_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
echo started > "$last.spawned"
trap 'echo interrupted >> "$last.signals"; kill "$sleeper" 2>/dev/null; exit 0' INT
sleep 30 &
sleeper=$!
wait "$sleeper"
"#;

/// Never reads stdin and exits with status 3 after a second.
pub const STALLED_CRASHING_TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
echo started > "$last.spawned"
sleep 1
exit 3
"#;

/// Larger than any pipe buffer, so one chunk is enough to block a writer.
pub const PIPE_FILLING_CHUNK: usize = 1024 * 1024;

/// Write an executable script into `dir`.
pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ffmpeg.sh");
    fs::write(&path, body).expect("Failed to write fake transcoder");
    let mut permissions = fs::metadata(&path)
        .expect("Failed to stat fake transcoder")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("Failed to make fake transcoder executable");
    path
}

/// Relay config pushing into `output_dir` through `program`, on an ephemeral port.
pub fn test_config(program: &Path, output_dir: &Path) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.transcoder.program = program.display().to_string();
    config.transcoder.destination_base = output_dir.display().to_string();
    config.transcoder.stop_grace_period = Duration::from_secs(5);
    config
}

/// A running relay and the directory its fake transcoder writes into.
pub struct RelayFixture {
    pub dir: TempDir,
    pub handle: RelayServerHandle,
}

impl RelayFixture {
    pub fn output(&self, key: &str) -> PathBuf {
        self.dir.path().join(key)
    }

    pub fn signals(&self, key: &str) -> PathBuf {
        self.dir.path().join(format!("{key}.signals"))
    }

    pub fn spawned(&self, key: &str) -> PathBuf {
        self.dir.path().join(format!("{key}.spawned"))
    }

    /// Names of every `.spawned` marker in the output directory.
    pub fn spawn_markers(&self) -> Vec<String> {
        fs::read_dir(self.dir.path())
            .expect("Failed to list output directory")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".spawned"))
            .collect()
    }
}

/// Start a relay whose transcoder is the given script.
pub async fn start_relay(script: &str) -> RelayFixture {
    start_relay_with(script, |_| {}).await
}

/// Like [`start_relay`], with `configure` applied to the test config first.
pub async fn start_relay_with<F>(script: &str, configure: F) -> RelayFixture
where
    F: FnOnce(&mut RelayConfig),
{
    let dir = TempDir::new().expect("Failed to create temp dir");
    let program = write_script(dir.path(), script);
    let mut config = test_config(&program, dir.path());
    configure(&mut config);
    let handle = start_relay_server(config)
        .await
        .expect("Failed to start relay server");
    RelayFixture { dir, handle }
}

/// Connect to the relay, with `?key=` appended when given.
pub async fn connect(handle: &RelayServerHandle, key: Option<&str>) -> WsClient {
    let url = match key {
        Some(key) => format!("{}?key={key}", handle.url()),
        None => handle.url(),
    };
    let (ws_stream, _) = connect_async(&url)
        .await
        .expect("Failed to connect to relay");
    ws_stream
}

/// Next text message, skipping nothing. Panics on anything else.
pub async fn receive_text(ws: &mut WsClient) -> String {
    let msg = timeout(RECEIVE_TIMEOUT, ws.next())
        .await
        .expect("Timed out waiting for message")
        .expect("Connection ended")
        .expect("Error receiving message");

    match msg {
        Message::Text(text) => text.as_str().to_owned(),
        other => panic!("Expected text message, got {other:?}"),
    }
}

/// Wait until the server closes the connection, ignoring messages in between.
pub async fn wait_for_close(ws: &mut WsClient) -> bool {
    let deadline = Instant::now() + TEARDOWN_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, ws.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Poll `condition` until it holds or the teardown timeout passes.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + TEARDOWN_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Wait until the relay has exactly `count` live sessions.
pub async fn wait_for_sessions(handle: &RelayServerHandle, count: usize) -> bool {
    let deadline = Instant::now() + TEARDOWN_TIMEOUT;
    while Instant::now() < deadline {
        if handle.active_sessions().await == count {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}

pub fn signal_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}
