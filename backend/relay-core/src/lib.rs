pub mod config;
pub mod error;
pub mod relay;
pub mod transcoder;

#[cfg(test)]
mod tests;

pub const TRANSCODER_BINARY: &str = "ffmpeg";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 3000;
pub const DEFAULT_RELAY_PATH: &str = "/rtmp";
pub const DEFAULT_INGEST_HOST: &str = "live-sao.twitch.tv";
pub const DEFAULT_DESTINATION_BASE: &str =
    const_format::concatcp!("rtmp://", DEFAULT_INGEST_HOST, "/app");

/// Query parameter carrying the stream key on the connection request.
pub const STREAM_KEY_PARAM: &str = "key";

/// Text sent to every client as soon as the WebSocket upgrade completes.
pub const READY_ACK: &str = "HELLO";

/// Text sent to the client whenever the transcoder writes to stderr.
pub const DIAGNOSTIC_NOTICE: &str = "transcoder diagnostic output";

/// Prefix of the text message sent before closing on a setup failure.
pub const SETUP_ERROR_PREFIX: &str = "ERROR ";
