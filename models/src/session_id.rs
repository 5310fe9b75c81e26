//! Session identifier derived from the stream key.

use common::RedactedStreamKey;

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Identifies a live relay session by the stream key it pushes with.
///
/// Two connections presenting the same key map to the same id, which is what
/// lets the session table refuse a second concurrent push. Formatting shows
/// a short fingerprint of the key, never the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId {
    key: RedactedStreamKey,
    fingerprint: u32,
}

impl SessionId {
    pub fn from_stream_key(key: &RedactedStreamKey) -> Self {
        let mut hasher = DefaultHasher::new();
        key.as_str().hash(&mut hasher);
        let hash = hasher.finish();

        Self {
            key: key.clone(),
            fingerprint: (hash ^ (hash >> 32)) as u32,
        }
    }

    /// Log-safe fingerprint of the underlying key.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }
}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.as_str().hash(state);
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{:08x}", self.fingerprint)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({:08x})", self.fingerprint)
    }
}
