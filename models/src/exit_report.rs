//! How a transcoder process ended.

use serde::Serialize;

use std::fmt;

/// Exit code and terminating signal of a transcoder process.
///
/// Either may be absent: a process killed by a signal has no code, and the
/// report is entirely empty when the exit status could not be collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitReport {
    pub fn new(code: Option<i32>, signal: Option<i32>) -> Self {
        Self { code, signal }
    }

    /// Report used when the exit status was lost.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), Some(signal)) => write!(f, "code {code}, signal {signal}"),
            (Some(code), None) => write!(f, "code {code}, signal none"),
            (None, Some(signal)) => write!(f, "code none, signal {signal}"),
            (None, None) => write!(f, "code none, signal none"),
        }
    }
}
