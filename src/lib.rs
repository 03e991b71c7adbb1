//! Request admission gate.
//!
//! Sliding-window rate limiting, security response headers and an in-process
//! TTL response cache, packaged as Axum middleware around an application's
//! routes.
//!
//! ```text
//!     Client Request
//!         │
//!         ▼
//!   request id → trace → timeout → security headers → rate limiter ──429──▶
//!                                                          │
//!                                                          ▼
//!                                                 application handlers
//!                                                          │
//!                                                  TtlCache / memoize
//! ```

pub mod admin;
pub mod cache;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use cache::{memoize, memoize_async, CacheKey, MemoizeConfig, TtlCache};
pub use config::GateConfig;
pub use http::{AppState, GateServer};
pub use lifecycle::Shutdown;
pub use security::{RateLimitExceeded, RateLimiter};
