use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::SessionId;

/// How a question event was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// A recognized prompt pattern matched an output line.
    Pattern,
    /// The session produced no output for the configured quiet window while
    /// a question-capable agent was running.
    Silence,
}

/// A structured event derived by pattern-matching one line of terminal text.
///
/// Detectors are independent: a single line may yield several of these, and
/// no variant suppresses another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedEvent {
    /// The agent reported hitting a provider rate limit.
    RateLimit {
        /// Retry-after duration converted to milliseconds, if the line
        /// carried one.
        retry_after_ms: Option<u64>,
    },
    /// Agent status row: current task plus optional timing/token annotations.
    StatusLine {
        task: String,
        elapsed_secs: Option<u64>,
        tokens: Option<u64>,
    },
    /// Progress marker. Phase 0 is a reset, phases 1-3 advance; both the
    /// phase and the 0-100 value arrive pre-clamped.
    Progress { phase: u8, percent: u8 },
    /// The agent appears to be waiting on an interactive answer.
    Question { text: String, source: QuestionSource },
    /// Percentage of the usage/quota budget consumed, clamped to 0-100.
    UsageLimit { percent_used: u8 },
    /// The agent declared where it wrote its plan file.
    PlanFile { path: String },
}

/// Push notifications fanned out to every subscribed consumer.
///
/// The WebSocket service mirrors these byte-exact for remote callers; native
/// consumers subscribe in-process through [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// One UTF-8-safe, escape-sequence-safe chunk of session output.
    SessionOutput { session_id: SessionId, data: String },
    /// The session's child process exited. Emitted exactly once per session.
    SessionExited { session_id: SessionId, exit_code: u32 },
    /// A detector matched an output line.
    StructuredEvent {
        session_id: SessionId,
        event: ParsedEvent,
    },
}

/// Broadcast capacity. A subscriber that falls behind by more than this many
/// events will skip (lagged) rather than block the reader loops.
const BUS_CAPACITY: usize = 1024;

/// Fan-out bus for host events.
///
/// Cloning is cheap; all clones publish into the same channel. `publish` is
/// non-blocking and a no-op when nobody is subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Returns the subscriber count.
    pub fn publish(&self, event: HostEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
