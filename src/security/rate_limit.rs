//! Per-client rate limiting with a sliding-window log.
//!
//! Every admitted request leaves its timestamp in the client's log. A check
//! first drops timestamps that fell out of the trailing window, then admits
//! only if fewer than `calls` remain. Rejected requests are not recorded.
//!
//! Authentication routes use a second, stricter log so the two policies never
//! share state.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::Serialize;

use crate::clock::SharedClock;
use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::client_ip::resolve_client_identifier;

/// Key prefix for the authentication log.
const AUTH_KEY_PREFIX: &str = "auth:";

/// Which policy produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    General,
    Auth,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::General => "general",
            Bucket::Auth => "auth",
        }
    }
}

/// A request was rejected by the limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded on {} bucket, retry after {retry_after_secs}s", .bucket.as_str())]
pub struct RateLimitExceeded {
    pub bucket: Bucket,
    /// Equal to the window length of the rejecting bucket.
    pub retry_after_secs: u64,
}

#[derive(Serialize)]
struct RateLimitBody {
    error: &'static str,
    detail: String,
    retry_after: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let detail = match self.bucket {
            Bucket::Auth => format!(
                "Too many authentication attempts. Try again in {} seconds.",
                self.retry_after_secs
            ),
            Bucket::General => format!(
                "Too many requests. Try again in {} seconds.",
                self.retry_after_secs
            ),
        };
        let body = RateLimitBody {
            error: "rate_limit_exceeded",
            detail,
            retry_after: self.retry_after_secs,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        response
    }
}

/// Timestamp logs keyed by client identifier.
///
/// Each check holds the shard lock for its key, so concurrent requests from one
/// client are serialized and cannot both slip past a full window.
#[derive(Debug)]
pub struct SlidingWindowLog {
    buckets: DashMap<String, VecDeque<Instant>>,
    clock: SharedClock,
}

impl SlidingWindowLog {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Admit and record one request, or reject without recording.
    pub fn check_and_record(&self, identifier: &str, calls_limit: u32, period: Duration) -> bool {
        let now = self.clock.now();
        let mut log = self.buckets.entry(identifier.to_string()).or_default();
        prune(&mut log, now, period);

        if log.len() >= calls_limit as usize {
            false
        } else {
            log.push_back(now);
            true
        }
    }

    /// Requests currently counted against `identifier`.
    pub fn in_window(&self, identifier: &str, period: Duration) -> usize {
        let now = self.clock.now();
        self.buckets
            .get(identifier)
            .map(|log| log.iter().filter(|ts| now.saturating_duration_since(**ts) <= period).count())
            .unwrap_or(0)
    }

    /// Drop clients whose log holds nothing inside the window.
    ///
    /// Returns the number of clients removed.
    pub fn sweep_idle(&self, period: Duration) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();
        self.buckets.retain(|_, log| {
            prune(log, now, period);
            !log.is_empty()
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&self) {
        self.buckets.clear();
    }
}

/// Remove timestamps older than `now - period`. An entry exactly `period` old
/// still counts. The log is ordered oldest first.
fn prune(log: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while let Some(oldest) = log.front() {
        if now.saturating_duration_since(*oldest) > period {
            log.pop_front();
        } else {
            break;
        }
    }
}

/// Limits in effect. Swapped atomically on config reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub calls: u32,
    pub period_secs: u64,
    pub auth_calls: u32,
    pub auth_period_secs: u64,
    pub auth_path_prefixes: Vec<String>,
}

impl RateLimitPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            calls: config.calls,
            period_secs: config.period_secs,
            auth_calls: config.auth_calls,
            auth_period_secs: config.auth_period_secs,
            auth_path_prefixes: config.auth_path_prefixes.clone(),
        }
    }

    /// True when `path` equals a prefix or continues it with a `/` segment.
    pub fn is_auth_path(&self, path: &str) -> bool {
        self.auth_path_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }
}

/// Snapshot for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub policy: RateLimitPolicy,
    pub general_clients: usize,
    pub auth_clients: usize,
}

/// Request admission over the general and authentication logs.
#[derive(Debug)]
pub struct RateLimiter {
    general: SlidingWindowLog,
    auth: SlidingWindowLog,
    policy: ArcSwap<RateLimitPolicy>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            general: SlidingWindowLog::new(clock.clone()),
            auth: SlidingWindowLog::new(clock),
            policy: ArcSwap::from_pointee(RateLimitPolicy::from_config(config)),
        }
    }

    pub fn policy(&self) -> Arc<RateLimitPolicy> {
        self.policy.load_full()
    }

    /// Replace the active limits. Recorded timestamps are kept.
    pub fn update_policy(&self, config: &RateLimitConfig) {
        let policy = RateLimitPolicy::from_config(config);
        tracing::info!(
            enabled = policy.enabled,
            calls = policy.calls,
            period_secs = policy.period_secs,
            auth_calls = policy.auth_calls,
            auth_period_secs = policy.auth_period_secs,
            "Rate limit policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Decide on a request to `path` from `identifier`.
    pub fn admit(&self, path: &str, identifier: &str) -> Result<(), RateLimitExceeded> {
        let policy = self.policy.load();
        if !policy.enabled {
            return Ok(());
        }

        let (bucket, allowed, period_secs) = if policy.is_auth_path(path) {
            let key = format!("{}{}", AUTH_KEY_PREFIX, identifier);
            let allowed = self.auth.check_and_record(
                &key,
                policy.auth_calls,
                Duration::from_secs(policy.auth_period_secs),
            );
            (Bucket::Auth, allowed, policy.auth_period_secs)
        } else {
            let allowed = self.general.check_and_record(
                identifier,
                policy.calls,
                Duration::from_secs(policy.period_secs),
            );
            (Bucket::General, allowed, policy.period_secs)
        };

        if allowed {
            metrics::record_admitted(bucket.as_str());
            Ok(())
        } else {
            tracing::warn!(client = %identifier, bucket = bucket.as_str(), path = %path, "Rate limit exceeded");
            metrics::record_rate_limited(bucket.as_str());
            Err(RateLimitExceeded {
                bucket,
                retry_after_secs: period_secs,
            })
        }
    }

    /// Resolve the client from the request and run [`RateLimiter::admit`].
    pub fn admit_request<B>(&self, request: &Request<B>) -> Result<(), RateLimitExceeded> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let identifier = resolve_client_identifier(request.headers(), peer);
        self.admit(request.uri().path(), &identifier)
    }

    /// Drop idle clients from both logs. Returns the number removed.
    pub fn sweep_idle(&self) -> usize {
        let policy = self.policy.load();
        self.general.sweep_idle(Duration::from_secs(policy.period_secs))
            + self.auth.sweep_idle(Duration::from_secs(policy.auth_period_secs))
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            policy: RateLimitPolicy::clone(&self.policy.load()),
            general_clients: self.general.tracked_clients(),
            auth_clients: self.auth.tracked_clients(),
        }
    }
}

/// Middleware function for request admission.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.admit_request(&request) {
        Ok(()) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}
