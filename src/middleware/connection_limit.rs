//! WebSocket connection limits.
//!
//! Upgrade requests must reserve a slot before reaching the voice agent
//! handler. The global limit answers 503, the per-IP limit 429. Plain HTTP
//! requests pass through untouched.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/v1/voice/agent", get(voice_agent_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header::UPGRADE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Address whose slot the handler must release when the socket ends.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let ip = addr.ip();
    let rejection = match state.try_acquire_connection(ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(ip));
            return next.run(request).await;
        }
        Err(e @ ConnectionLimitError::GlobalLimitReached) => (
            e,
            StatusCode::SERVICE_UNAVAILABLE,
            "Server at capacity. Please try again later.",
        ),
        Err(e @ ConnectionLimitError::PerIpLimitReached) => (
            e,
            StatusCode::TOO_MANY_REQUESTS,
            "Too many connections from your IP address.",
        ),
    };

    let (error, status, body) = rejection;
    tracing::warn!(ip = %ip, error = %error, "Rejecting WebSocket connection");
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn app(per_ip: u32) -> (Router, Arc<AppState>) {
        let mut config = ServerConfig::default();
        config.gemini_api_key = Some("test_key".to_string());
        config.max_connections_per_ip = per_ip;
        let state = AppState::new(config).unwrap();
        let router = Router::new()
            .route("/ws", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state.clone());
        (router, state)
    }

    fn request(upgrade: bool) -> Request<Body> {
        let mut builder = Request::builder().uri("/ws");
        if upgrade {
            builder = builder.header("upgrade", "websocket");
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from((
            Ipv4Addr::new(192, 168, 1, 7),
            40000,
        ))));
        request
    }

    #[tokio::test]
    async fn test_plain_requests_bypass_limits() {
        let (router, state) = app(1);
        let response = router.oneshot(request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_upgrade_over_per_ip_limit_is_rejected() {
        let (router, state) = app(1);
        let ip: IpAddr = Ipv4Addr::new(192, 168, 1, 7).into();

        let response = router.clone().oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ip_connection_count(&ip), 1);

        let response = router.oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(state.ip_connection_count(&ip), 1);
    }
}
