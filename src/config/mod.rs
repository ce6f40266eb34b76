//! Configuration module for the voice agent gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading and overrides
//!
//! # Example
//! ```rust,no_run
//! use voice_agent_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::live::{GEMINI_DEFAULT_MODEL, LiveConnectConfig};

mod env;
mod yaml;

pub use yaml::YamlConfig;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Gemini Live credentials, endpoint, model and voice
/// - Voice activity detection thresholds
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Close voice agent sockets with no inbound frame for this many seconds
    /// Default: None (never)
    pub ws_idle_timeout_secs: Option<u64>,

    // Gemini Live settings
    /// API key; `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`
    pub gemini_api_key: Option<String>,
    /// Base URL override (`GOOGLE_GEMINI_BASE_URL`), e.g. for a proxy
    pub gemini_base_url: Option<String>,
    pub gemini_model: String,
    pub gemini_voice: String,

    // Voice activity detection
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let vad = LiveConnectConfig::default()
            .realtime_input
            .automatic_activity_detection;
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            ws_idle_timeout_secs: None,
            gemini_api_key: None,
            gemini_base_url: None,
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_voice: "Puck".to_string(),
            vad_prefix_padding_ms: vad.prefix_padding_ms,
            vad_silence_duration_ms: vad.silence_duration_ms,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Call `dotenvy::dotenv()` first (as `main` does) to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = env::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load()?;
        yaml_config.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the server relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if let Some(ref tls) = self.tls
            && (tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation(
                "TLS requires both a certificate and a key path".to_string(),
            ));
        }
        if self.max_connections_per_ip == 0 {
            return Err(ConfigError::Validation(
                "max_connections_per_ip must be at least 1".to_string(),
            ));
        }
        if self.max_websocket_connections == Some(0) {
            return Err(ConfigError::Validation(
                "max_websocket_connections must be at least 1 when set".to_string(),
            ));
        }
        if self.ws_idle_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "ws_idle_timeout_secs must be at least 1 when set".to_string(),
            ));
        }
        if self.rate_limit_requests_per_second == 0 || self.rate_limit_burst_size == 0 {
            return Err(ConfigError::Validation(
                "rate limit values must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Idle limit for voice agent sockets, if any
    pub fn ws_idle_timeout(&self) -> Option<Duration> {
        self.ws_idle_timeout_secs.map(Duration::from_secs)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Session configuration used for every Gemini Live connect.
    pub fn live_connect_config(&self) -> LiveConnectConfig {
        let mut config = LiveConnectConfig {
            voice_name: Some(self.gemini_voice.clone()),
            ..Default::default()
        };
        let vad = &mut config.realtime_input.automatic_activity_detection;
        vad.prefix_padding_ms = self.vad_prefix_padding_ms;
        vad.silence_duration_ms = self.vad_silence_duration_ms;
        config
    }
}
