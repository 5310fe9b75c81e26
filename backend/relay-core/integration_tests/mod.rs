// Relay tests drive a shell script standing in for the transcoder.
#[cfg(unix)]
mod relay_tests {
    pub mod helpers;
    mod relay;
    mod stalled;
    mod supervisor;
}
