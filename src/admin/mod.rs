//! Admin API: cache and rate limiter inspection.
//!
//! Mounted only when `admin.enabled`; every route requires the bearer key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache).delete(clear_cache))
        .route("/admin/cache/sweep", post(sweep_cache))
        .route("/admin/rate-limits", get(get_rate_limits))
        .route("/admin/rate-limits/sweep", post(sweep_rate_limits))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
