//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, periods > 0)
//! - Validate addresses and route prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GateConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let rl = &config.rate_limit;
    if rl.calls == 0 {
        errors.push(ValidationError::new("rate_limit.calls", "must be greater than 0"));
    }
    if rl.period_secs == 0 {
        errors.push(ValidationError::new("rate_limit.period_secs", "must be greater than 0"));
    }
    if rl.auth_calls == 0 {
        errors.push(ValidationError::new("rate_limit.auth_calls", "must be greater than 0"));
    }
    if rl.auth_period_secs == 0 {
        errors.push(ValidationError::new("rate_limit.auth_period_secs", "must be greater than 0"));
    }
    for prefix in &rl.auth_path_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "rate_limit.auth_path_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        } else if prefix.trim_end_matches('/').is_empty() {
            errors.push(ValidationError::new(
                "rate_limit.auth_path_prefixes",
                format!("'{}' would match every path", prefix),
            ));
        }
    }

    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new("cache.default_ttl_secs", "must be greater than 0"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
