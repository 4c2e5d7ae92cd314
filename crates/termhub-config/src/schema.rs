//! Configuration schema types for the termhub host.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Terminal Config
// =============================================================================

/// Defaults applied to newly created sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell override. Empty string means "use $SHELL / $COMSPEC".
    pub shell: String,
    /// Default terminal columns for new sessions (valid range: 2-500).
    pub cols: u16,
    /// Default terminal rows for new sessions (valid range: 2-500).
    pub rows: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: String::new(),
            cols: 80,
            rows: 24,
        }
    }
}

// =============================================================================
// Service Config
// =============================================================================

/// Embedded WebSocket service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Whether the local WebSocket service is started at all.
    pub enabled: bool,
    /// Listen address for the WebSocket service.
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:7797".into(),
        }
    }
}

// =============================================================================
// Agent Config
// =============================================================================

/// Tuning for agent-oriented output detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Silence window in milliseconds before an agent session with no
    /// recognized prompt pattern is reported as waiting on a question
    /// (valid range: 1000-600000).
    pub quiet_window_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 30_000,
        }
    }
}

// =============================================================================
// Logging Config
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter directive, overridable by `--log-level`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "termhub=info".into(),
        }
    }
}

// =============================================================================
// Root Config
// =============================================================================

/// Root host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub terminal: TerminalConfig,
    pub service: ServiceConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}
