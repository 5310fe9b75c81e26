use crate::error::supervisor::SupervisorError;

use common::ErrorLocation;
use models::TranscodeTarget;

use std::io::ErrorKind;
use std::panic::Location;
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;

const INPUT_FLAG: &str = "-i";
const STDIN_INPUT: &str = "-";
const VIDEO_CODEC_FLAG: &str = "-c:v";
const PRESET_FLAG: &str = "-preset";
const TUNE_FLAG: &str = "-tune";
const AUDIO_CODEC_FLAG: &str = "-c:a";
const AUDIO_RATE_FLAG: &str = "-ar";
const AUDIO_BITRATE_FLAG: &str = "-b:a";
const OVERWRITE_FLAG: &str = "-y";
const WALLCLOCK_TIMESTAMPS_FLAG: &str = "-use_wallclock_as_timestamps";
const ASYNC_FLAG: &str = "-async";
const BUFSIZE_FLAG: &str = "-bufsize";
const FORMAT_FLAG: &str = "-f";
const ENABLED: &str = "1";

/// Build the fixed transcoder argument list for a target.
///
/// Raw media is read from stdin. Timestamps come from the wall clock because
/// the browser recorder's chunks carry no reliable timing. The destination URI
/// is always the last argument.
pub fn build_transcode_args(target: &TranscodeTarget) -> Vec<String> {
    vec![
        INPUT_FLAG.to_string(),
        STDIN_INPUT.to_string(),
        VIDEO_CODEC_FLAG.to_string(),
        target.video_codec().to_string(),
        PRESET_FLAG.to_string(),
        target.video_preset().to_string(),
        TUNE_FLAG.to_string(),
        target.video_tune().to_string(),
        AUDIO_CODEC_FLAG.to_string(),
        target.audio_codec().to_string(),
        AUDIO_RATE_FLAG.to_string(),
        target.audio_sample_rate().to_string(),
        AUDIO_BITRATE_FLAG.to_string(),
        target.audio_bitrate().to_string(),
        OVERWRITE_FLAG.to_string(),
        WALLCLOCK_TIMESTAMPS_FLAG.to_string(),
        ENABLED.to_string(),
        ASYNC_FLAG.to_string(),
        ENABLED.to_string(),
        BUFSIZE_FLAG.to_string(),
        target.buffer_size().to_string(),
        FORMAT_FLAG.to_string(),
        target.container_format().to_string(),
        target.destination_uri(),
    ]
}

pub(crate) fn build_spawn_command(program: &str, target: &TranscodeTarget) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.args(build_transcode_args(target))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Start the transcoder for one session.
///
/// # Errors
///
/// Returns [`SupervisorError::Spawn`] if the program cannot be started.
pub(crate) fn spawn_transcoder(
    program: &str,
    target: &TranscodeTarget,
) -> Result<TokioChild, SupervisorError> {
    debug!(
        "Spawning {program} for {}",
        target.redacted_destination()
    );

    match build_spawn_command(program, target).spawn() {
        Ok(child) => {
            info!(
                "Spawned {program} pushing to {} (PID: {:?})",
                target.redacted_destination(),
                child.id()
            );
            Ok(child)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Err(SupervisorError::Spawn {
            message: format!("Transcoder {program} not found"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(err),
        }),
        Err(err) => Err(SupervisorError::Spawn {
            message: format!("Failed to spawn {program}: {err}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(err),
        }),
    }
}
