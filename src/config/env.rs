//! Environment variable loading.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig, TlsConfig};

/// Read a variable, treating empty and whitespace-only values as unset.
pub(super) fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse a variable, failing loudly on malformed input instead of silently defaulting.
pub(super) fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

/// Build a configuration from environment variables on top of the defaults.
pub(super) fn load() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }

    config.tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (None, None) => None,
        (cert, key) => Some(TlsConfig {
            cert_path: cert.map(PathBuf::from).unwrap_or_default(),
            key_path: key.map(PathBuf::from).unwrap_or_default(),
        }),
    };

    config.ws_idle_timeout_secs = env_parse("WS_IDLE_TIMEOUT_SECS")?;

    config.gemini_api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("GOOGLE_API_KEY"));
    config.gemini_base_url = env_var("GOOGLE_GEMINI_BASE_URL");
    if let Some(model) = env_var("GEMINI_LIVE_MODEL") {
        config.gemini_model = model;
    }
    if let Some(voice) = env_var("GEMINI_VOICE") {
        config.gemini_voice = voice;
    }

    if let Some(ms) = env_parse("VAD_PREFIX_PADDING_MS")? {
        config.vad_prefix_padding_ms = ms;
    }
    if let Some(ms) = env_parse("VAD_SILENCE_DURATION_MS")? {
        config.vad_silence_duration_ms = ms;
    }

    config.cors_allowed_origins = env_var("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = env_parse("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(limit) = env_parse("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = limit;
    }

    Ok(config)
}
