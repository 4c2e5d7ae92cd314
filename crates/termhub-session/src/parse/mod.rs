//! Structured output parsing.
//!
//! Escape-safe text is line-buffered here; each completed line runs through
//! an independent set of detectors. Detectors never suppress one another: a
//! line may yield zero, one, or several [`ParsedEvent`]s. The detector set is
//! selected per session from the agent kind attached at create time.

mod detectors;

pub use detectors::Detector;

use serde::{Deserialize, Serialize};
use termhub_common::ParsedEvent;

use crate::buffer::strip_sequences;

/// What kind of process a session wraps; selects the detector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Plain interactive shell; no detectors run.
    #[default]
    Shell,
    /// Autonomous coding agent; all detectors run.
    Agent,
}

impl AgentKind {
    /// Whether the silence-based question fallback applies.
    pub fn question_capable(self) -> bool {
        matches!(self, AgentKind::Agent)
    }
}

/// A line that never terminates is scanned and dropped once it grows past
/// this, bounding parser memory per session.
const MAX_LINE_BYTES: usize = 8192;

/// Line-buffered detector runner for one session.
pub struct OutputParser {
    detectors: Vec<Detector>,
    partial: String,
}

impl OutputParser {
    pub fn new(detectors: Vec<Detector>) -> Self {
        Self {
            detectors,
            partial: String::new(),
        }
    }

    pub fn for_agent(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Shell => Self::new(Vec::new()),
            AgentKind::Agent => Self::new(Detector::all()),
        }
    }

    /// Feed an escape-safe text chunk; returns events for every line
    /// completed by it.
    ///
    /// Both `\n` and bare `\r` count as line boundaries: TUI agents redraw
    /// status rows with carriage returns and those redraws must be observed.
    pub fn feed(&mut self, text: &str) -> Vec<ParsedEvent> {
        if self.detectors.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();
        self.partial.push_str(text);

        while let Some(pos) = self.partial.find(['\n', '\r']) {
            let mut end = pos + 1;
            // Collapse CRLF into one boundary.
            if self.partial.as_bytes()[pos] == b'\r' && self.partial.as_bytes().get(end) == Some(&b'\n')
            {
                end += 1;
            }
            let rest = self.partial.split_off(end);
            let line = std::mem::replace(&mut self.partial, rest);
            self.scan_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        if self.partial.len() > MAX_LINE_BYTES {
            let line = std::mem::take(&mut self.partial);
            self.scan_line(&line, &mut events);
        }

        events
    }

    /// Scan the final partial line. Called once when the session ends.
    pub fn flush(&mut self) -> Vec<ParsedEvent> {
        let mut events = Vec::new();
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.scan_line(&line, &mut events);
        }
        events
    }

    fn scan_line(&self, line: &str, out: &mut Vec<ParsedEvent>) {
        let clean = strip_sequences(line);
        let clean = clean.trim_end();
        if clean.is_empty() {
            return;
        }
        for detector in &self.detectors {
            if let Some(event) = detector.detect(clean) {
                out.push(event);
            }
        }
    }
}
