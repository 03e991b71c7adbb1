use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::config::Environment;
use crate::http::server::AppState;
use crate::security::rate_limit::RateLimitSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environment: Environment,
}

#[derive(Serialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

#[derive(Serialize)]
pub struct SweepResult {
    pub removed: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environment: state.config.security.environment,
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    let cleared = state.cache.len();
    state.cache.clear();
    tracing::info!(cleared, "Response cache cleared via admin API");
    Json(CacheCleared { cleared })
}

pub async fn sweep_cache(State(state): State<AppState>) -> Json<SweepResult> {
    Json(SweepResult {
        removed: state.cache.sweep_expired(),
    })
}

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitSnapshot> {
    Json(state.limiter.snapshot())
}

pub async fn sweep_rate_limits(State(state): State<AppState>) -> Json<SweepResult> {
    Json(SweepResult {
        removed: state.limiter.sweep_idle(),
    })
}
