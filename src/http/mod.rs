//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info)
//!     → request.rs (request ID)
//!     → trace span, timeout
//!     → security headers (on the way out)
//!     → rate limiter (may answer 429)
//!     → application routes / admin / health
//!     → response.rs (JSON errors)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GateServer};
