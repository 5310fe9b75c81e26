mod error_location;
mod redacted_stream_key;
