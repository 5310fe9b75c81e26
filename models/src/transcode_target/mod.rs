//! Where a session's transcoder pushes to and how it encodes.

pub mod builder;

use common::RedactedStreamKey;
use common::redacted_stream_key::REDACTED_PLACEHOLDER;

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_VIDEO_PRESET: &str = "veryfast";
pub const DEFAULT_VIDEO_TUNE: &str = "zerolatency";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_AUDIO_BITRATE: &str = "64k";
pub const DEFAULT_BUFFER_SIZE: u32 = 1000;
pub const DEFAULT_CONTAINER_FORMAT: &str = "flv";

/// Immutable per-session transcoding configuration.
///
/// Built once per session by [`TranscodeTargetBuilder`](builder::TranscodeTargetBuilder)
/// from the configured destination and the stream key the client presented.
#[derive(Debug, Clone)]
pub struct TranscodeTarget {
    pub(crate) destination_base: String,
    pub(crate) stream_key: RedactedStreamKey,
    pub(crate) video_codec: String,
    pub(crate) video_preset: String,
    pub(crate) video_tune: String,
    pub(crate) audio_codec: String,
    pub(crate) audio_sample_rate: u32,
    pub(crate) audio_bitrate: String,
    pub(crate) buffer_size: u32,
    pub(crate) container_format: String,
}

impl TranscodeTarget {
    /// Full push URI including the stream key. Pass this to the transcoder only.
    pub fn destination_uri(&self) -> String {
        format!("{}/{}", self.destination_base, self.stream_key.as_str())
    }

    /// Push URI with the key replaced, safe for logs.
    pub fn redacted_destination(&self) -> String {
        format!("{}/{REDACTED_PLACEHOLDER}", self.destination_base)
    }

    pub fn destination_base(&self) -> &str {
        &self.destination_base
    }

    pub fn stream_key(&self) -> &RedactedStreamKey {
        &self.stream_key
    }

    pub fn video_codec(&self) -> &str {
        &self.video_codec
    }

    pub fn video_preset(&self) -> &str {
        &self.video_preset
    }

    pub fn video_tune(&self) -> &str {
        &self.video_tune
    }

    pub fn audio_codec(&self) -> &str {
        &self.audio_codec
    }

    pub fn audio_sample_rate(&self) -> u32 {
        self.audio_sample_rate
    }

    pub fn audio_bitrate(&self) -> &str {
        &self.audio_bitrate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn container_format(&self) -> &str {
        &self.container_format
    }
}
