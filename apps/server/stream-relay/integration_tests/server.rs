use relay_core::config::RelayConfig;
use relay_core::relay::start_relay_server;

use std::fs;

use tempfile::TempDir;

// ============================================================================
// Integration tests for config file + relay-core server startup
// These follow the same path main() takes, minus signals and logging
// ============================================================================

/// **VALUE**: Verifies a config file on disk drives the server the binary starts.
///
/// **WHY THIS MATTERS**: This is the closest we get to running the binary: load the file,
/// start the relay, shut it down.
///
/// **BUG THIS CATCHES**: Would catch `server.path` or `server.host` from the file not
/// reaching the listener, or shutdown hanging with no sessions.
#[tokio::test]
async fn given_config_file_when_server_started_then_listens_on_configured_path() {
    // GIVEN: A config file with an ephemeral port and custom path
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("relay.toml");
    fs::write(
        &config_path,
        r#"
            [server]
            host = "127.0.0.1"
            port = 0
            path = "/ingest"
        "#,
    )
    .unwrap();

    // WHEN: Loading it and starting the relay
    let config = RelayConfig::load(&config_path).expect("Config should load");
    let handle = start_relay_server(config)
        .await
        .expect("Server should start");

    // THEN: Bound to a real port, serving the configured path
    assert_ne!(handle.local_addr().port(), 0);
    assert!(handle.url().ends_with("/ingest"));
    assert_eq!(handle.active_sessions().await, 0);

    handle.shutdown().await;
}

/// **VALUE**: Verifies an invalid config file stops startup with a validation error.
#[test]
fn given_invalid_config_file_when_loaded_then_returns_error() {
    // GIVEN: A config with zero capacity
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("relay.toml");
    fs::write(&config_path, "[server]\nmax_sessions = 0\n").unwrap();

    // WHEN: Loading
    let result = RelayConfig::load(&config_path);

    // THEN: Refused
    assert!(result.is_err());
}
