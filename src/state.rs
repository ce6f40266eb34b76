use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::bridge::ConnectionRegistry;
use crate::core::live::{LiveClient, LiveConnectConfig, LiveResult, create_live_client};

/// Why a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP WebSocket connection limit reached")]
    PerIpLimitReached,
}

/// Application state shared by every handler.
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub live_client: Arc<dyn LiveClient>,
    pub bridges: ConnectionRegistry,
    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
    live_connect_config: LiveConnectConfig,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build state with the live client described by `config`.
    pub fn new(config: ServerConfig) -> LiveResult<Arc<Self>> {
        let live_client = create_live_client(&config)?;
        Ok(Self::with_live_client(config, live_client))
    }

    /// Build state around an existing live client.
    pub fn with_live_client(config: ServerConfig, live_client: Arc<dyn LiveClient>) -> Arc<Self> {
        let live_connect_config = config.live_connect_config();
        Arc::new(Self {
            config: Arc::new(config),
            live_client,
            bridges: ConnectionRegistry::new(),
            shutdown: CancellationToken::new(),
            live_connect_config,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Session configuration handed to every new bridge.
    pub fn live_connect_config(&self) -> &LiveConnectConfig {
        &self.live_connect_config
    }

    /// Reserve a WebSocket slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        Ok(())
    }

    /// Release a slot reserved with [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
