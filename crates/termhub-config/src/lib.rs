//! Termhub configuration system.
//!
//! TOML-based configuration with serde defaults, so a partial (or missing)
//! config file works out of the box. Loading never aborts the host: an
//! invalid file logs a warning and falls back to defaults.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::HostConfig;

use termhub_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Loads `termhub.toml` from the OS config directory, creates a default
/// file if none exists, and validates the result.
pub fn load_config() -> Result<HostConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}
