mod demo;
mod error;
mod health;
mod identity;
mod metrics;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::monitor::monitor;
use crate::state::AppState;

pub use demo::{fail_handler, notify_handler, panic_handler, slow_handler, status_handler};
pub use error::AppError;
pub use health::health_handler;
pub use identity::{ROLES_HEADER, USER_HEADER, header_identity, identity_from_headers};
pub use metrics::metrics_handler;

// Every route runs inside the listener; identity is resolved first
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/demo/fail", get(fail_handler))
        .route("/demo/panic", get(panic_handler))
        .route("/demo/status", get(status_handler))
        .route("/demo/slow", get(slow_handler))
        .route("/demo/notify", post(notify_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), monitor))
        .route_layer(middleware::from_fn(header_identity))
        .with_state(state)
}
