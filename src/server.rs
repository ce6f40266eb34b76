//! HTTP application assembly.
//!
//! Builds the axum [`Router`] with its middleware stack and provides the
//! shutdown signal used by `main`.

use std::sync::Arc;

use axum::{Router, middleware};
use http::{HeaderValue, Method, header::CONTENT_TYPE};
use thiserror::Error;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::middleware::connection_limit_middleware;
use crate::routes;
use crate::state::AppState;

/// Rate limiting is disabled at or above this many requests per second.
pub const RATE_LIMIT_DISABLED_THRESHOLD: u32 = 100_000;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid rate limit configuration: {rps}/s burst {burst}")]
    RateLimiter { rps: u32, burst: u32 },
}

/// Build the full application router.
pub fn create_app(state: Arc<AppState>) -> Result<Router, ServerError> {
    let config = state.config.clone();

    let voice_agent_routes = routes::voice_agent::create_voice_agent_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );

    let governor_layer = if config.rate_limit_requests_per_second < RATE_LIMIT_DISABLED_THRESHOLD {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(u64::from(config.rate_limit_requests_per_second))
            .burst_size(config.rate_limit_burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or(ServerError::RateLimiter {
                rps: config.rate_limit_requests_per_second,
                burst: config.rate_limit_burst_size,
            })?;
        Some(GovernorLayer::new(governor_config))
    } else {
        info!(
            rps = config.rate_limit_requests_per_second,
            "Rate limiting disabled"
        );
        None
    };

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    Ok(routes::api::create_api_router()
        .merge(voice_agent_routes)
        .with_state(state)
        .layer(cors_layer(config.cors_allowed_origins.as_deref()))
        .layer(tower::util::option_layer(governor_layer))
        .layer(security_headers))
}

/// CORS policy from the configured origin list.
///
/// `*` allows any origin without credentials, a comma-separated list allows
/// exactly those origins, and no value keeps same-origin only.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any).allow_credentials(false),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins).allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            base.allow_credentials(false)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
