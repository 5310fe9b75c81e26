use crate::error::model_error::ModelError;
use crate::transcode_target::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_AUDIO_SAMPLE_RATE, DEFAULT_BUFFER_SIZE,
    DEFAULT_CONTAINER_FORMAT, DEFAULT_VIDEO_CODEC, DEFAULT_VIDEO_PRESET, DEFAULT_VIDEO_TUNE,
    TranscodeTarget,
};

use common::{ErrorLocation, RedactedStreamKey};

use std::panic::Location;

/// Builder for creating validated TranscodeTarget instances.
///
/// Destination and stream key are required. Codec parameters fall back to the
/// real-time defaults when not set.
#[derive(Debug, Default)]
pub struct TranscodeTargetBuilder {
    destination_base: Option<String>,
    stream_key: Option<RedactedStreamKey>,
    video_codec: Option<String>,
    video_preset: Option<String>,
    video_tune: Option<String>,
    audio_codec: Option<String>,
    audio_sample_rate: Option<u32>,
    audio_bitrate: Option<String>,
    buffer_size: Option<u32>,
    container_format: Option<String>,
}

impl TranscodeTargetBuilder {
    pub fn with_destination_base(mut self, base: impl Into<String>) -> Self {
        self.destination_base = Some(base.into());
        self
    }

    pub fn with_stream_key(mut self, key: RedactedStreamKey) -> Self {
        self.stream_key = Some(key);
        self
    }

    pub fn with_video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    pub fn with_video_preset(mut self, preset: impl Into<String>) -> Self {
        self.video_preset = Some(preset.into());
        self
    }

    pub fn with_video_tune(mut self, tune: impl Into<String>) -> Self {
        self.video_tune = Some(tune.into());
        self
    }

    pub fn with_audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    pub fn with_audio_sample_rate(mut self, rate: u32) -> Self {
        self.audio_sample_rate = Some(rate);
        self
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn with_buffer_size(mut self, size: u32) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn with_container_format(mut self, format: impl Into<String>) -> Self {
        self.container_format = Some(format.into());
        self
    }

    /// Build the TranscodeTarget with validation.
    #[track_caller]
    pub fn build(self) -> Result<TranscodeTarget, ModelError> {
        let destination_base = self.destination_base.ok_or_else(|| ModelError::Validation {
            message: String::from("Destination base is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let destination_base = destination_base.trim_end_matches('/').to_string();

        if destination_base.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Destination base cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stream_key = self.stream_key.ok_or_else(|| ModelError::Validation {
            message: String::from("Stream key is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if stream_key.is_blank() {
            return Err(ModelError::Validation {
                message: String::from("Stream key cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let audio_sample_rate = self.audio_sample_rate.unwrap_or(DEFAULT_AUDIO_SAMPLE_RATE);
        if audio_sample_rate == 0 {
            return Err(ModelError::Validation {
                message: String::from("Audio sample rate must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        if buffer_size == 0 {
            return Err(ModelError::Validation {
                message: String::from("Buffer size must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(TranscodeTarget {
            destination_base,
            stream_key,
            video_codec: non_empty(self.video_codec, DEFAULT_VIDEO_CODEC, "Video codec")?,
            video_preset: non_empty(self.video_preset, DEFAULT_VIDEO_PRESET, "Video preset")?,
            video_tune: non_empty(self.video_tune, DEFAULT_VIDEO_TUNE, "Video tune")?,
            audio_codec: non_empty(self.audio_codec, DEFAULT_AUDIO_CODEC, "Audio codec")?,
            audio_sample_rate,
            audio_bitrate: non_empty(self.audio_bitrate, DEFAULT_AUDIO_BITRATE, "Audio bitrate")?,
            buffer_size,
            container_format: non_empty(
                self.container_format,
                DEFAULT_CONTAINER_FORMAT,
                "Container format",
            )?,
        })
    }
}

#[track_caller]
fn non_empty(value: Option<String>, default: &str, field: &str) -> Result<String, ModelError> {
    let value = value.unwrap_or_else(|| default.to_string());
    if value.trim().is_empty() {
        return Err(ModelError::Validation {
            message: format!("{field} cannot be empty"),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(value)
}
