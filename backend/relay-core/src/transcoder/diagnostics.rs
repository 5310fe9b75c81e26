//! Transcoder stderr bookkeeping.
//!
//! The relay only tells the client *that* the transcoder wrote diagnostics.
//! The text itself stays on the operator side: it is logged, and the latest
//! ffmpeg progress line is kept for the end-of-session summary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use regex::Regex;

const PROGRESS_PATTERN: &str =
    r"frame=\s*(?P<frame>\d+).*?time=\s*(?P<time>\S+).*?bitrate=\s*(?P<bitrate>\S+)";
const PROGRESS_CAPTURE_FRAME: &str = "frame";
const PROGRESS_CAPTURE_TIME: &str = "time";
const PROGRESS_CAPTURE_BITRATE: &str = "bitrate";

static PROGRESS_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_progress_regex() -> &'static Regex {
    PROGRESS_REGEX.get_or_init(|| Regex::new(PROGRESS_PATTERN).expect("valid regex pattern"))
}

/// Emitted once per stderr chunk. Carries no diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub bytes: usize,
}

/// Last progress report parsed from ffmpeg's status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeProgress {
    pub frame: u64,
    pub time: String,
    pub bitrate: String,
}

impl fmt::Display for TranscodeProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame={} time={} bitrate={}",
            self.frame, self.time, self.bitrate
        )
    }
}

/// Parse the most recent progress report in a stderr chunk.
///
/// ffmpeg rewrites its status line with `\r`, so one chunk may hold several
/// reports; the last one wins.
pub fn parse_progress(text: &str) -> Option<TranscodeProgress> {
    get_progress_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let frame = cap.name(PROGRESS_CAPTURE_FRAME)?.as_str().parse().ok()?;
            let time = cap.name(PROGRESS_CAPTURE_TIME)?.as_str().to_string();
            let bitrate = cap.name(PROGRESS_CAPTURE_BITRATE)?.as_str().to_string();
            Some(TranscodeProgress {
                frame,
                time,
                bitrate,
            })
        })
        .last()
}

#[derive(Debug, Default)]
pub(crate) struct DiagnosticStats {
    chunks: AtomicU64,
    bytes: AtomicU64,
    last_progress: Mutex<Option<TranscodeProgress>>,
}

impl DiagnosticStats {
    pub(crate) fn record(&self, text: &str, len: usize) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);

        if let Some(progress) = parse_progress(text) {
            if let Ok(mut last) = self.last_progress.lock() {
                *last = Some(progress);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            last_progress: self.last_progress.lock().ok().and_then(|p| p.clone()),
        }
    }
}

/// Point-in-time view of a session's diagnostic output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticSnapshot {
    pub chunks: u64,
    pub bytes: u64,
    pub last_progress: Option<TranscodeProgress>,
}

impl fmt::Display for DiagnosticSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chunks / {} bytes", self.chunks, self.bytes)?;
        if let Some(progress) = &self.last_progress {
            write!(f, ", last {progress}")?;
        }
        Ok(())
    }
}
