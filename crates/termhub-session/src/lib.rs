//! Termhub session core: PTY session orchestration and the output-processing
//! pipeline.
//!
//! Owns the table of live sessions, one dedicated reader loop per session,
//! the byte-safety buffering chain (raw bytes → valid UTF-8 →
//! escape-sequence-safe text), a bounded ring buffer of recent output, the
//! structured-event parser, and the pause/resume flow-control contract.
//!
//! The [`SessionHost`] is the native in-process command channel: the UI layer
//! and the embedded WebSocket service both drive sessions through it. It is
//! constructed once at startup and passed by reference into every entry
//! point; there is no ambient singleton.

pub mod buffer;
pub mod metrics;
pub mod parse;
pub mod pty;
pub mod reader;
pub mod session;
pub mod table;

pub use buffer::{EscapeAwareBuffer, RingBuffer, Utf8ReadBuffer, OUTPUT_RING_CAPACITY};
pub use metrics::{Metrics, MetricsSnapshot};
pub use parse::{AgentKind, OutputParser};
pub use pty::{NativePty, PtyBackend};
pub use session::{Session, SessionConfig, SessionInfo};
pub use table::{
    HostOptions, HostStats, SessionHost, DEFAULT_READ_LIMIT, MAX_READ_LIMIT, MAX_SESSIONS,
};
