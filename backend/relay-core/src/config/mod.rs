//! Relay configuration.
//!
//! Loaded from a TOML file (see [`RelayConfig::load_from_environment`]) with
//! serde defaults for every field, so an absent file is a valid deployment.

use crate::error::config::ConfigError;
use crate::{
    DEFAULT_DESTINATION_BASE, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT, DEFAULT_RELAY_PATH,
    TRANSCODER_BINARY,
};

use common::{ErrorLocation, RedactedStreamKey};
use models::transcode_target::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_AUDIO_SAMPLE_RATE, DEFAULT_BUFFER_SIZE,
    DEFAULT_CONTAINER_FORMAT, DEFAULT_VIDEO_CODEC, DEFAULT_VIDEO_PRESET, DEFAULT_VIDEO_TUNE,
};
use models::{ModelError, TranscodeTarget, TranscodeTargetBuilder};

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "relay.toml";
const CONFIG_DIR_NAME: &str = "stream-relay";
const CONFIG_VERSION: u32 = 1;
const DEFAULT_MAX_SESSIONS: usize = 64;
const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_FEED_QUEUE_CHUNKS: usize = 256;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "STREAM_RELAY_CONFIG";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: &str = "debug";

#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// How long a new connection may take to complete the WebSocket upgrade.
    #[serde(default = "default_handshake_timeout", with = "humantime_duration")]
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            max_sessions: default_max_sessions(),
            handshake_timeout: default_handshake_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_destination_base")]
    pub destination_base: String,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_video_preset")]
    pub video_preset: String,
    #[serde(default = "default_video_tune")]
    pub video_tune: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_container_format")]
    pub container_format: String,
    /// How long a stop request waits for the transcoder before killing it.
    #[serde(default = "default_stop_grace_period", with = "humantime_duration")]
    pub stop_grace_period: Duration,
    /// Media chunks a session may queue for a transcoder that is not reading.
    #[serde(default = "default_feed_queue_chunks")]
    pub feed_queue_chunks: usize,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            destination_base: default_destination_base(),
            video_codec: default_video_codec(),
            video_preset: default_video_preset(),
            video_tune: default_video_tune(),
            audio_codec: default_audio_codec(),
            audio_sample_rate: default_audio_sample_rate(),
            audio_bitrate: default_audio_bitrate(),
            buffer_size: default_buffer_size(),
            container_format: default_container_format(),
            stop_grace_period: default_stop_grace_period(),
            feed_queue_chunks: default_feed_queue_chunks(),
        }
    }
}

impl TranscoderConfig {
    /// Build the per-session target for a stream key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] for a blank key or invalid codec values.
    #[track_caller]
    pub fn target_for(&self, stream_key: RedactedStreamKey) -> Result<TranscodeTarget, ModelError> {
        TranscodeTargetBuilder::default()
            .with_destination_base(&self.destination_base)
            .with_stream_key(stream_key)
            .with_video_codec(&self.video_codec)
            .with_video_preset(&self.video_preset)
            .with_video_tune(&self.video_tune)
            .with_audio_codec(&self.audio_codec)
            .with_audio_sample_rate(self.audio_sample_rate)
            .with_audio_bitrate(&self.audio_bitrate)
            .with_buffer_size(self.buffer_size)
            .with_container_format(&self.container_format)
            .build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the log file. Defaults to the platform data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed log level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an unknown level name.
    #[track_caller]
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level).map_err(|_| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid log level: {}", self.level),
        })
    }

    /// Resolved log directory: the configured one, else `<data_local_dir>/stream-relay/logs`.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(env::temp_dir)
                .join(CONFIG_DIR_NAME)
                .join("logs")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            transcoder: TranscoderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}
fn default_path() -> String {
    DEFAULT_RELAY_PATH.to_string()
}
fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}
fn default_handshake_timeout() -> Duration {
    DEFAULT_HANDSHAKE_TIMEOUT
}
fn default_program() -> String {
    TRANSCODER_BINARY.to_string()
}
fn default_destination_base() -> String {
    DEFAULT_DESTINATION_BASE.to_string()
}
fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_video_preset() -> String {
    DEFAULT_VIDEO_PRESET.to_string()
}
fn default_video_tune() -> String {
    DEFAULT_VIDEO_TUNE.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_sample_rate() -> u32 {
    DEFAULT_AUDIO_SAMPLE_RATE
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_buffer_size() -> u32 {
    DEFAULT_BUFFER_SIZE
}
fn default_container_format() -> String {
    DEFAULT_CONTAINER_FORMAT.to_string()
}
fn default_stop_grace_period() -> Duration {
    DEFAULT_STOP_GRACE_PERIOD
}
fn default_feed_queue_chunks() -> usize {
    DEFAULT_FEED_QUEUE_CHUNKS
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RelayConfig {
    /// Platform default location: `{config_dir}/stream-relay/relay.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load config from a TOML file.
    ///
    /// # Returns
    ///
    /// Returns `Ok(RelayConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable, corrupted or invalid.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&contents, config_path)?;
        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Parse TOML contents. `origin` is only used for error reporting.
    #[track_caller]
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| {
            warn!("Failed to parse config TOML: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: origin.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    /// Load `.env`, then the file named by `STREAM_RELAY_CONFIG` (or the platform
    /// default), then apply environment overrides and validate.
    pub fn load_from_environment() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded .env from: {:?}", path);
        }

        let config_path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(Self::default_path);

        let mut config = match config_path {
            Some(path) => Self::load(&path)?,
            None => {
                debug!("No config directory available, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvironmentError`] if `PORT` is not a valid port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PORT_ENV) {
            let port = raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::EnvironmentError {
                    location: ErrorLocation::from(Location::caller()),
                    variable: PORT_ENV.to_string(),
                    reason: format!("'{raw}' is not a valid port: {e}"),
                })?;
            debug!("{PORT_ENV} overrides listen port {} -> {port}", self.server.port);
            self.server.port = port;
        }

        Ok(())
    }

    /// Socket address string the acceptor binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "server.host cannot be empty".to_string(),
            });
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("server.path must start with '/': {}", self.server.path),
            });
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "server.max_sessions must be at least 1".to_string(),
            });
        }

        if self.server.handshake_timeout.is_zero() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "server.handshake_timeout must be non-zero".to_string(),
            });
        }

        if self.transcoder.program.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "transcoder.program cannot be empty".to_string(),
            });
        }

        if self.transcoder.destination_base.trim_end_matches('/').is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "transcoder.destination_base cannot be empty".to_string(),
            });
        }

        if self.transcoder.audio_sample_rate == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "transcoder.audio_sample_rate must be non-zero".to_string(),
            });
        }

        if self.transcoder.feed_queue_chunks == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "transcoder.feed_queue_chunks must be at least 1".to_string(),
            });
        }

        self.logging.level_filter()?;

        Ok(())
    }
}
