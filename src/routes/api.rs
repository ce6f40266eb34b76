use axum::{Router, routing::get};

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the public router (no connection limits)
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(api::health_check))
}
