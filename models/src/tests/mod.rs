mod session_id;
mod transcode_target;
