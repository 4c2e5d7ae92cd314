use std::path::PathBuf;

use crate::id::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Errors returned synchronously by session host operations.
///
/// Buffer-layer conditions (malformed UTF-8, unterminated escape sequences)
/// never surface here: they are resolved in-line by replacement-character
/// substitution and by the force-flush cap respectively.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Creating a session would exceed the session cap. Reports the current
    /// active count so the caller can decide whether to close something first.
    #[error("session capacity exceeded: {active} of {max} sessions active")]
    CapacityExceeded { active: usize, max: usize },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The child process could not be started. Carries the underlying OS
    /// error text unmodified.
    #[error("failed to spawn session process: {0}")]
    SpawnFailure(String),

    #[error("invalid terminal dimensions: {rows} rows x {cols} cols")]
    InvalidDimensions { rows: u16, cols: u16 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
