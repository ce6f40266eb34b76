//! Configuration loading from the process environment
//!
//! Every test mutates process-wide environment variables and runs serially.

use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use voice_agent_gateway::config::{ConfigError, DEFAULT_PORT, ServerConfig};

const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "GOOGLE_GEMINI_BASE_URL",
    "GEMINI_LIVE_MODEL",
    "GEMINI_VOICE",
    "VAD_PREFIX_PADDING_MS",
    "VAD_SILENCE_DURATION_MS",
    "CORS_ALLOWED_ORIGINS",
    "RATE_LIMIT_REQUESTS_PER_SECOND",
    "RATE_LIMIT_BURST_SIZE",
    "MAX_WEBSOCKET_CONNECTIONS",
    "MAX_CONNECTIONS_PER_IP",
    "WS_IDLE_TIMEOUT_SECS",
];

fn cleanup_env_vars() {
    for key in ENV_KEYS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn set_env(key: &str, value: &str) {
    unsafe {
        env::set_var(key, value);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    cleanup_env_vars();

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, DEFAULT_PORT);
    assert!(config.gemini_api_key.is_none());
    assert!(!config.is_tls_enabled());
    assert!(config.max_websocket_connections.is_none());
    assert!(config.ws_idle_timeout().is_none());

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_from_env_reads_all_keys() {
    cleanup_env_vars();
    set_env("HOST", "127.0.0.1");
    set_env("PORT", "9000");
    set_env("GEMINI_API_KEY", "  gemini-key  ");
    set_env("GOOGLE_GEMINI_BASE_URL", "https://proxy.example.com");
    set_env("GEMINI_LIVE_MODEL", "models/custom-live");
    set_env("GEMINI_VOICE", "Kore");
    set_env("VAD_PREFIX_PADDING_MS", "200");
    set_env("VAD_SILENCE_DURATION_MS", "800");
    set_env("CORS_ALLOWED_ORIGINS", "*");
    set_env("RATE_LIMIT_REQUESTS_PER_SECOND", "5");
    set_env("RATE_LIMIT_BURST_SIZE", "2");
    set_env("MAX_WEBSOCKET_CONNECTIONS", "100");
    set_env("MAX_CONNECTIONS_PER_IP", "3");
    set_env("WS_IDLE_TIMEOUT_SECS", "120");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.address(), "127.0.0.1:9000");
    assert_eq!(config.gemini_api_key.as_deref(), Some("gemini-key"));
    assert_eq!(
        config.gemini_base_url.as_deref(),
        Some("https://proxy.example.com")
    );
    assert_eq!(config.gemini_model, "models/custom-live");
    assert_eq!(config.gemini_voice, "Kore");
    assert_eq!(config.cors_allowed_origins.as_deref(), Some("*"));
    assert_eq!(config.rate_limit_requests_per_second, 5);
    assert_eq!(config.rate_limit_burst_size, 2);
    assert_eq!(config.max_websocket_connections, Some(100));
    assert_eq!(config.max_connections_per_ip, 3);
    assert_eq!(config.ws_idle_timeout_secs, Some(120));

    let live = config.live_connect_config();
    assert_eq!(live.voice_name.as_deref(), Some("Kore"));
    assert_eq!(
        live.realtime_input
            .automatic_activity_detection
            .prefix_padding_ms,
        200
    );
    assert_eq!(
        live.realtime_input
            .automatic_activity_detection
            .silence_duration_ms,
        800
    );

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_google_api_key_fallback() {
    cleanup_env_vars();
    set_env("GOOGLE_API_KEY", "google-key");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.gemini_api_key.as_deref(), Some("google-key"));

    set_env("GEMINI_API_KEY", "gemini-key");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.gemini_api_key.as_deref(), Some("gemini-key"));

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_is_rejected() {
    cleanup_env_vars();
    set_env("PORT", "not-a-port");

    match ServerConfig::from_env() {
        Err(ConfigError::InvalidValue { key, value }) => {
            assert_eq!(key, "PORT");
            assert_eq!(value, "not-a-port");
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_half_configured_tls_is_rejected() {
    cleanup_env_vars();
    set_env("TLS_CERT_PATH", "/etc/ssl/cert.pem");

    assert!(matches!(
        ServerConfig::from_env(),
        Err(ConfigError::Validation(_))
    ));

    set_env("TLS_KEY_PATH", "/etc/ssl/key.pem");
    let config = ServerConfig::from_env().unwrap();
    assert!(config.is_tls_enabled());

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_yaml_overrides_env() {
    cleanup_env_vars();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
server:
  host: "127.0.0.1"
  port: 8080

gemini:
  api_key: "yaml-key"
"#,
    )
    .unwrap();

    set_env("HOST", "0.0.0.0");
    set_env("GEMINI_API_KEY", "env-key");
    set_env("GEMINI_VOICE", "Charon");

    let config = ServerConfig::from_file(&config_path).unwrap();

    // YAML overrides ENV
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.gemini_api_key.as_deref(), Some("yaml-key"));
    assert_eq!(config.port, 8080);
    // ENV fills what YAML leaves out
    assert_eq!(config.gemini_voice, "Charon");

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_from_file_missing_file() {
    cleanup_env_vars();

    let result = ServerConfig::from_file(std::path::Path::new("/nonexistent/config.yaml"));
    let err = result.unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("Failed to read config file"));

    cleanup_env_vars();
}
