//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared `AppState` once at startup
//! - Wrap application routes with admission and hardening middleware
//! - Mount health and admin endpoints
//! - Serve with connect info so peers are known to the rate limiter
//! - Apply rate limit reloads and run maintenance sweeps until shutdown

use axum::{
    body::Body,
    http::Request,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::cache::{MemoizeConfig, TtlCache};
use crate::clock::{self, SharedClock};
use crate::config::GateConfig;
use crate::http::request::{request_id_header, RequestIdExt, UuidRequestId};
use crate::http::response::not_found;
use crate::lifecycle::maintenance::MaintenanceTask;
use crate::lifecycle::shutdown::{wait as shutdown_signal, Shutdown};
use crate::security::{rate_limit_middleware, RateLimiter, SecurityHeaders};

/// Process-wide context injected into middleware and handlers.
///
/// Built once at startup; clones share the limiter and cache.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub limiter: Arc<RateLimiter>,
    /// Shared response cache for memoized handlers.
    pub cache: TtlCache<Value>,
}

impl AppState {
    pub fn new(config: GateConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    /// Build with an explicit time source (tests drive a manual clock).
    pub fn with_clock(config: GateConfig, clock: SharedClock) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit, clock.clone()));
        let cache = TtlCache::new(config.cache.max_entries, clock);
        Self {
            config: Arc::new(config),
            limiter,
            cache,
        }
    }

    /// Memoization settings for `prefix` using the configured default TTL.
    pub fn memoize_config(&self, prefix: &str) -> MemoizeConfig {
        MemoizeConfig::with_default_ttl(prefix, &self.config.cache)
    }
}

/// HTTP server for the admission gate.
pub struct GateServer {
    router: Router,
    state: AppState,
}

impl GateServer {
    /// A server exposing only health and admin routes.
    pub fn new(config: GateConfig) -> Self {
        Self::with_routes(AppState::new(config), Router::new())
    }

    /// Wrap application routes with the gate.
    pub fn with_routes(state: AppState, app: Router<AppState>) -> Self {
        let router = Self::build_router(state.clone(), app);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router, for driving without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outside-in: request id, trace, timeout, security headers,
    /// rate limiting, routes.
    #[allow(deprecated)]
    fn build_router(state: AppState, app: Router<AppState>) -> Router {
        let config = state.config.clone();

        let mut routes = Router::new()
            .route("/health", get(health))
            .merge(app);
        if config.admin.enabled {
            routes = routes.merge(admin::router(state.clone()));
        }

        let router = routes
            .fallback(not_found)
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit_middleware));

        let router = if config.security.enable_headers {
            SecurityHeaders::for_environment(config.security.environment).apply(router)
        } else {
            router
        };

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(SetRequestIdLayer::new(request_id_header(), UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates arriving on `config_updates` swap the rate limit
    /// policy in place. Returns once `shutdown` fires and in-flight requests
    /// have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let cache = self.state.cache.clone();
        tokio::spawn(
            MaintenanceTask::new(
                "cache_sweep",
                Duration::from_secs(self.state.config.cache.sweep_interval_secs),
                move || cache.sweep_expired(),
            )
            .run(shutdown.subscribe()),
        );

        let limiter = self.state.limiter.clone();
        tokio::spawn(
            MaintenanceTask::new(
                "rate_limit_idle_sweep",
                Duration::from_secs(self.state.config.rate_limit.idle_sweep_secs),
                move || limiter.sweep_idle(),
            )
            .run(shutdown.subscribe()),
        );

        let limiter = self.state.limiter.clone();
        let mut reload_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => limiter.update_policy(&config.rate_limit),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http::request::X_REQUEST_ID;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn state(calls: u32) -> (AppState, ManualClock) {
        let clock = ManualClock::new();
        let mut config = GateConfig::default();
        config.rate_limit.calls = calls;
        (AppState::with_clock(config, Arc::new(clock.clone())), clock)
    }

    fn get_from(path: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_has_request_id_and_headers() {
        let (state, _clock) = state(10);
        let router = GateServer::with_routes(state, Router::new()).into_router();

        let response = router.oneshot(get_from("/health", "1.1.1.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_rejection_carries_security_headers() {
        let (state, _clock) = state(1);
        let router = GateServer::with_routes(state, Router::new()).into_router();

        let first = router.clone().oneshot(get_from("/health", "2.2.2.2")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.oneshot(get_from("/health", "2.2.2.2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["retry-after"], "60");
        assert_eq!(second.headers()["x-frame-options"], "DENY");
    }

    #[test]
    fn test_memoize_config_uses_default_ttl() {
        let mut config = GateConfig::default();
        config.cache.default_ttl_secs = 42;
        let state = AppState::new(config);

        let memo = state.memoize_config("users");
        assert_eq!(memo.key_prefix, "users");
        assert_eq!(memo.ttl, Duration::from_secs(42));
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (state, _clock) = state(10);
        let router = GateServer::with_routes(state, Router::new()).into_router();

        let response = router.oneshot(get_from("/nope", "3.3.3.3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_not_mounted_by_default() {
        let (state, _clock) = state(10);
        let router = GateServer::with_routes(state, Router::new()).into_router();

        let response = router.oneshot(get_from("/admin/status", "4.4.4.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
