mod relay;
mod transcoder;
