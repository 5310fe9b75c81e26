use crate::relay_tests::helpers::{
    CRASHING_TRANSCODER, RECORDING_TRANSCODER, eventually, signal_lines, test_config, write_script,
};

use relay_core::config::RelayConfig;
use relay_core::error::supervisor::SupervisorError;
use relay_core::transcoder::{ProcessSupervisor, SpawnedTranscoder, SupervisorState};

use common::RedactedStreamKey;
use models::TranscodeTarget;

use std::fs;
use std::path::Path;

use serial_test::serial;
use tempfile::TempDir;

fn setup(script: &str) -> (TempDir, RelayConfig, TranscodeTarget) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let program = write_script(dir.path(), script);
    let config = test_config(&program, dir.path());
    let target = config
        .transcoder
        .target_for(RedactedStreamKey::new("sup"))
        .expect("Failed to build target");
    (dir, config, target)
}

fn spawn(config: &RelayConfig, target: &TranscodeTarget) -> SpawnedTranscoder {
    ProcessSupervisor::spawn(&config.transcoder, target).expect("Failed to spawn transcoder")
}

/// **VALUE**: Verifies chunks reach the process in feed order and a stop ends it cleanly.
///
/// **BUG THIS CATCHES**: Would catch partial writes, missing flushes, or `stop()` returning
/// before the process has been reaped.
#[tokio::test]
#[serial]
async fn given_feeding_supervisor_when_chunks_fed_and_stopped_then_output_ordered_and_exited() {
    // GIVEN: A supervisor in the feeding state
    let (dir, config, target) = setup(RECORDING_TRANSCODER);
    let SpawnedTranscoder {
        supervisor,
        mut feeder,
        ..
    } = spawn(&config, &target);
    assert!(supervisor.begin_feeding());
    assert_eq!(supervisor.state(), SupervisorState::Feeding);

    // WHEN: Feeding three chunks, closing input and stopping
    feeder.feed(b"first-").await.unwrap();
    feeder.feed(b"second-").await.unwrap();
    feeder.feed(b"third").await.unwrap();
    feeder.close();
    let report = supervisor.stop().await;

    // THEN: Output in order, process exited cleanly after one interrupt
    assert_eq!(
        fs::read(dir.path().join("sup")).unwrap(),
        b"first-second-third"
    );
    assert_eq!(feeder.chunks_fed(), 3);
    assert_eq!(feeder.bytes_fed(), 18);
    assert!(report.success(), "Expected clean exit, got {report}");
    assert_eq!(supervisor.state(), SupervisorState::Exited);
    assert_eq!(signal_lines(&dir.path().join("sup.signals")), vec!["interrupted"]);
}

/// **VALUE**: Verifies the interrupt is delivered at most once per process.
///
/// **WHY THIS MATTERS**: A second SIGINT makes ffmpeg abort without writing its trailer.
#[tokio::test]
#[serial]
async fn given_running_transcoder_when_interrupted_twice_then_signal_sent_once() {
    // GIVEN: A started transcoder
    let (dir, config, target) = setup(RECORDING_TRANSCODER);
    let SpawnedTranscoder { supervisor, .. } = spawn(&config, &target);
    let marker = dir.path().join("sup.spawned");
    assert!(eventually(|| marker.exists()).await, "Transcoder should start");
    supervisor.begin_feeding();

    // WHEN: Interrupting twice
    let first = supervisor.interrupt();
    let second = supervisor.interrupt();
    let report = supervisor.wait_exit().await;

    // THEN: Only the first call signalled
    assert!(first);
    assert!(!second);
    assert!(report.success());
    assert_eq!(signal_lines(&dir.path().join("sup.signals")), vec!["interrupted"]);
}

/// **VALUE**: Verifies an unprompted non-zero exit is reported as a crash and feeding stops.
///
/// **BUG THIS CATCHES**: Would catch writes to a dead process being accepted silently.
#[tokio::test]
#[serial]
async fn given_transcoder_exits_with_error_when_fed_then_not_feeding() {
    // GIVEN: A transcoder that exits with status 1
    let (_dir, config, target) = setup(CRASHING_TRANSCODER);
    let SpawnedTranscoder {
        supervisor,
        mut feeder,
        ..
    } = spawn(&config, &target);
    supervisor.begin_feeding();

    // WHEN: It exits and a chunk is fed afterwards
    let report = supervisor.wait_exit().await;
    let result = feeder.feed(b"late").await;

    // THEN: Exit code captured, state crashed, feed refused
    assert_eq!(report.code, Some(1));
    assert_eq!(supervisor.state(), SupervisorState::Crashed);
    assert_eq!(supervisor.exit_report(), Some(report));
    assert!(matches!(
        result,
        Err(SupervisorError::NotFeeding {
            state: SupervisorState::Crashed,
            ..
        })
    ));
    assert!(!supervisor.interrupt(), "No interrupt after exit");
}

/// **VALUE**: Verifies chunks are refused before the feed is opened.
#[tokio::test]
#[serial]
async fn given_spawned_supervisor_when_fed_before_feeding_then_not_feeding() {
    // GIVEN: A supervisor still in Spawned
    let (_dir, config, target) = setup(RECORDING_TRANSCODER);
    let SpawnedTranscoder {
        supervisor,
        mut feeder,
        ..
    } = spawn(&config, &target);

    // WHEN: Feeding
    let result = feeder.feed(b"early").await;

    // THEN: Refused
    assert!(matches!(result, Err(SupervisorError::NotFeeding { .. })));
    feeder.close();
    supervisor.stop().await;
}

/// **VALUE**: Verifies a missing transcoder binary is a spawn error, not a panic.
#[tokio::test]
#[serial]
async fn given_missing_program_when_spawned_then_spawn_error() {
    // GIVEN: A program path that doesn't exist
    let dir = TempDir::new().unwrap();
    let config = test_config(Path::new("/nonexistent/ffmpeg"), dir.path());
    let target = config
        .transcoder
        .target_for(RedactedStreamKey::new("sup"))
        .unwrap();

    // WHEN: Spawning
    let result = ProcessSupervisor::spawn(&config.transcoder, &target);

    // THEN: Spawn error
    assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
}
