use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{ConfigError, ServerConfig, TlsConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   ws_idle_timeout_secs: 300
///   tls:
///     cert_path: "/etc/gateway/cert.pem"
///     key_path: "/etc/gateway/key.pem"
///
/// gemini:
///   api_key: "your-gemini-key"
///   base_url: "https://generativelanguage.googleapis.com"
///   model: "models/gemini-2.5-flash-native-audio-preview-12-2025"
///   voice: "Puck"
///
/// vad:
///   prefix_padding_ms: 100
///   silence_duration_ms: 500
///
/// security:
///   cors_allowed_origins: "https://example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub vad: Option<VadYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
    /// Idle limit for voice agent sockets (seconds)
    pub ws_idle_timeout_secs: Option<u64>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Gemini Live configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

/// Server-side voice activity detection from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    /// Audio kept before a detected speech start (ms)
    pub prefix_padding_ms: Option<u32>,
    /// Silence required before end of speech is declared (ms)
    pub silence_duration_ms: Option<u32>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // An empty file parses to `null`, which is an empty configuration
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Apply the values present in this file on top of `config`.
    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if server.ws_idle_timeout_secs.is_some() {
                config.ws_idle_timeout_secs = server.ws_idle_timeout_secs;
            }
            if let Some(tls) = server.tls {
                if tls.enabled == Some(false) {
                    config.tls = None;
                } else if tls.cert_path.is_some() || tls.key_path.is_some() {
                    let current = config.tls.take();
                    let (cert, key) = current
                        .map(|t| (t.cert_path, t.key_path))
                        .unwrap_or_default();
                    config.tls = Some(TlsConfig {
                        cert_path: tls.cert_path.map(PathBuf::from).unwrap_or(cert),
                        key_path: tls.key_path.map(PathBuf::from).unwrap_or(key),
                    });
                }
            }
        }

        if let Some(gemini) = self.gemini {
            if gemini.api_key.is_some() {
                config.gemini_api_key = gemini.api_key;
            }
            if gemini.base_url.is_some() {
                config.gemini_base_url = gemini.base_url;
            }
            if let Some(model) = gemini.model {
                config.gemini_model = model;
            }
            if let Some(voice) = gemini.voice {
                config.gemini_voice = voice;
            }
        }

        if let Some(vad) = self.vad {
            if let Some(ms) = vad.prefix_padding_ms {
                config.vad_prefix_padding_ms = ms;
            }
            if let Some(ms) = vad.silence_duration_ms {
                config.vad_silence_duration_ms = ms;
            }
        }

        if let Some(security) = self.security {
            if security.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = security.cors_allowed_origins;
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                config.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                config.rate_limit_burst_size = burst;
            }
            if security.max_websocket_connections.is_some() {
                config.max_websocket_connections = security.max_websocket_connections;
            }
            if let Some(limit) = security.max_connections_per_ip {
                config.max_connections_per_ip = limit;
            }
        }
    }
}
