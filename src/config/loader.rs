//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{Environment, GateConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied on top of the file contents before
/// validation runs.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    load_file(path, |key| std::env::var(key).ok())
}

fn load_file<F>(path: &Path, lookup: F) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path)?;
    let mut config: GateConfig = toml::from_str(&content)?;

    finish(&mut config, lookup)?;
    Ok(config)
}

/// Build a configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<GateConfig, ConfigError> {
    let mut config = GateConfig::default();
    finish(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn finish<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = apply_env_overrides(config, lookup);
    if let Err(mut semantic) = validate_config(config) {
        errors.append(&mut semantic);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Apply `GATE_*` environment overrides.
///
/// Returns one error per variable whose value could not be parsed; the
/// corresponding field is left untouched.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("GATE_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    override_parsed(&lookup, "GATE_RATE_LIMIT_CALLS", &mut config.rate_limit.calls, &mut errors);
    override_parsed(&lookup, "GATE_RATE_LIMIT_PERIOD", &mut config.rate_limit.period_secs, &mut errors);
    override_parsed(&lookup, "GATE_AUTH_RATE_LIMIT_CALLS", &mut config.rate_limit.auth_calls, &mut errors);
    override_parsed(&lookup, "GATE_AUTH_RATE_LIMIT_PERIOD", &mut config.rate_limit.auth_period_secs, &mut errors);
    override_parsed(&lookup, "GATE_CACHE_TTL", &mut config.cache.default_ttl_secs, &mut errors);
    override_parsed::<Environment, _>(&lookup, "GATE_ENVIRONMENT", &mut config.security.environment, &mut errors);
    if let Some(v) = lookup("GATE_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("GATE_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }

    errors
}

fn override_parsed<T, F>(lookup: &F, key: &str, slot: &mut T, errors: &mut Vec<ValidationError>)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => errors.push(ValidationError::new(key, format!("cannot parse '{}'", raw))),
        }
    }
}
