//! Security response headers.
//!
//! # Responsibilities
//! - Pick a static header set for the deployment environment
//! - Attach it to every response without overriding handler-set values
//!
//! # Design Decisions
//! - HSTS only outside development (browsers pin it)
//! - Development keeps a permissive CSP so local tooling works

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Environment;

/// An ordered list of headers to set on responses.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    /// The header set for an environment.
    pub fn for_environment(env: Environment) -> Self {
        let mut headers = vec![
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("x-xss-protection", "1; mode=block"),
            ("referrer-policy", "strict-origin-when-cross-origin"),
            ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
        ];

        match env {
            Environment::Development => {
                headers.push((
                    "content-security-policy",
                    "default-src 'self' 'unsafe-inline' 'unsafe-eval' http://localhost:* ws://localhost:*",
                ));
            }
            Environment::Staging => {
                headers.push(("strict-transport-security", "max-age=86400"));
                headers.push(("content-security-policy", "default-src 'self'"));
            }
            Environment::Production => {
                headers.push((
                    "strict-transport-security",
                    "max-age=31536000; includeSubDomains; preload",
                ));
                headers.push((
                    "content-security-policy",
                    "default-src 'self'; frame-ancestors 'none'; object-src 'none'",
                ));
            }
        }

        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (HeaderName::from_static(k), HeaderValue::from_static(v)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> + '_ {
        self.headers.iter().map(|(k, v)| (k, v))
    }

    /// Wrap `router` so every response carries these headers.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.headers.iter().fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name.clone(), value.clone()))
        })
    }
}
