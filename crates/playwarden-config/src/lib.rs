//! Configuration parsing and validation for playwarden
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - A single weekly budget and the tracked process list
//! - Sampling and enforcement timing
//! - Validation with clear error messages

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to render TOML: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Default seconds between process table samples
pub const DEFAULT_SAMPLE_PERIOD_SECS: u64 = 1;

/// Default milliseconds between enforcement checks
pub const DEFAULT_ENFORCE_INTERVAL_MS: u64 = 100;

/// Default wait between SIGTERM and SIGKILL
pub const DEFAULT_KILL_GRACE_MS: u64 = 500;

/// Default seconds between usage report log lines
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Policy::from_raw(raw))
}

/// Render the first-run configuration as TOML
pub fn render_default_config() -> ConfigResult<String> {
    Ok(toml::to_string_pretty(&default_raw_config())?)
}

/// Write the first-run configuration to `path`, creating parent directories
pub fn write_default_config(path: impl AsRef<Path>) -> ConfigResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_default_config()?)?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
