//! Stream key handling with redacted Debug and Display output.
//!
//! The stream key is the credential the remote media endpoint uses to accept a
//! push. It travels inside the transcoder's destination URI and nowhere else.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// Placeholder used wherever a key would otherwise be printed.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// A stream key that never exposes its value in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedStreamKey {
    inner: String,
}

impl RedactedStreamKey {
    /// Wrap a raw stream key taken from the connection request.
    pub fn new(key: impl Into<String>) -> Self {
        Self { inner: key.into() }
    }

    /// Get the actual key value.
    ///
    /// # Security Note
    /// Only call this when building the transcoder destination or deriving a
    /// session identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Get the key length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the key is empty or whitespace only.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl fmt::Debug for RedactedStreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedStreamKey({REDACTED_PLACEHOLDER}, len={})", self.len())
    }
}

impl fmt::Display for RedactedStreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED_PLACEHOLDER)
    }
}

impl Drop for RedactedStreamKey {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Keys must never end up in config dumps or JSON payloads
impl serde::Serialize for RedactedStreamKey {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            message: String::from("RedactedStreamKey cannot be serialized - use as_str() explicitly"),
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
