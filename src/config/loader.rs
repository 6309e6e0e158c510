//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Upstream base URL override.
pub const ENV_API_BASE_URL: &str = "COMP_API_BASE_URL";
/// Service API key override.
pub const ENV_API_KEY: &str = "COMP_API_KEY";
/// Deployment environment override ("development" / "production").
pub const ENV_ENVIRONMENT: &str = "GATEWAY_ENV";
/// Listener bind address override.
pub const ENV_BIND_ADDRESS: &str = "GATEWAY_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

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

/// Load a TOML file, apply process environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |var| std::env::var(var).ok())
}

/// Build a config from defaults plus process environment overrides.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    finalize(GatewayConfig::default(), |var| std::env::var(var).ok())
}

/// Parse TOML content with an explicit environment lookup.
pub fn parse_config<F>(content: &str, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config: GatewayConfig = toml::from_str(content)?;
    finalize(config, env)
}

fn finalize<F>(mut config: GatewayConfig, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values on top of file values. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |var: &str| env(var).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = lookup(ENV_API_BASE_URL) {
        config.upstream.base_url = base_url;
    }
    if let Some(api_key) = lookup(ENV_API_KEY) {
        config.upstream.api_key = Some(api_key);
    }
    if let Some(bind_address) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = bind_address;
    }
    if let Some(environment) = lookup(ENV_ENVIRONMENT) {
        config.environment = environment.parse().map_err(|message| ConfigError::Env {
            var: ENV_ENVIRONMENT,
            message,
        })?;
    }

    Ok(())
}
