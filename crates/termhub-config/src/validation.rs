//! Full configuration validation.
//!
//! Validates numeric ranges and the service bind address, collecting all
//! errors into one message.

use crate::schema::HostConfig;
use termhub_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HostConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(&mut errors, "terminal.cols", config.terminal.cols as u64, 2, 500);
    validate_range(&mut errors, "terminal.rows", config.terminal.rows as u64, 2, 500);
    validate_range(
        &mut errors,
        "agent.quiet_window_ms",
        config.agent.quiet_window_ms,
        1_000,
        600_000,
    );

    if config.service.enabled && config.service.bind.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "service.bind is not a valid socket address: {}",
            config.service.bind
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} must be between {min} and {max}, got {value}"));
    }
}
