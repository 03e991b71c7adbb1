//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive client identifier)
//!     → rate_limit.rs (general or auth sliding window, may reject with 429)
//!     → handler
//! Outgoing response:
//!     → headers.rs (environment security headers)
//! ```
//!
//! # Design Decisions
//! - Rejection is a typed value rendered as 429, not a handler error
//! - No trust in client input: unparsable address headers are skipped

pub mod client_ip;
pub mod headers;
pub mod rate_limit;

pub use client_ip::resolve_client_identifier;
pub use headers::SecurityHeaders;
pub use rate_limit::{rate_limit_middleware, Bucket, RateLimitExceeded, RateLimitPolicy, RateLimiter};
