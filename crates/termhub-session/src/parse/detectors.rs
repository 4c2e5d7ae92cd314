//! Line detectors for semantically meaningful agent output.
//!
//! Each detector is a pure function of one escape-stripped line. Detectors
//! are independent and all run on every line; the grammar each one accepts
//! is documented on its match arm.

use std::sync::LazyLock;

use regex::Regex;
use termhub_common::{ParsedEvent, QuestionSource};

static RATE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    // A bare "429" is too common in ordinary output (counts, ports); only
    // match it when qualified as a status code.
    Regex::new(r"(?i)\brate[ -]?limit(?:ed)?\b|\btoo many requests\b|\b(?:http|status|error)\s+429\b")
        .unwrap()
});

static RETRY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:retry|try again|resets?)\s+(?:after|in)\s+(\d+)\s*(ms|milliseconds?|s|secs?|seconds?|m|mins?|minutes?|h|hours?)\b",
    )
    .unwrap()
});

static STATUS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // "✻ Deliberating… (esc to interrupt · 34s · ↓ 1.2k tokens)"
    Regex::new(r"^\s*[·✻✼✽✶✢⏺*]\s+([A-Z][A-Za-z][A-Za-z -]{0,40}?)(?:…|\.{3})").unwrap()
});

static STATUS_ELAPSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)s\b").unwrap());

static STATUS_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[↓↑]?\s*([\d.]+)(k?)\s*tokens\b").unwrap());

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bprogress\b(?:\s*\[(\d)/3\])?\s*[: ]\s*(\d{1,3})\s*%").unwrap()
});

static PROGRESS_RESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bprogress\s*[: ]?\s*reset\b").unwrap());

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[y(?:es)?/no?\]|\(y/n\)|^\s*(?:do you want|would you like|proceed\b)|^\s*❯\s*\d+[.)]")
        .unwrap()
});

static USAGE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:used\s+(\d{1,3})\s*%\s+of|(\d{1,3})\s*%\s+of\s+(?:your\s+)?(?:usage|quota|weekly|session)\s+limit)",
    )
    .unwrap()
});

static PLAN_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:plan\s+(?:written|saved)\s+(?:to|at)|saved\s+plan(?:\s+to)?|plan\s+file)\s*:?\s*(\S+)")
        .unwrap()
});

/// Longest line the question heuristic will treat as a bare trailing-`?`
/// prompt. Long prose sentences ending in `?` are narrative, not prompts.
const QUESTION_MAX_LEN: usize = 120;

/// One pattern detector over completed output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    RateLimit,
    StatusLine,
    Progress,
    Question,
    UsageLimit,
    PlanFile,
}

impl Detector {
    /// The full detector set, in a stable order.
    pub fn all() -> Vec<Detector> {
        vec![
            Detector::RateLimit,
            Detector::StatusLine,
            Detector::Progress,
            Detector::Question,
            Detector::UsageLimit,
            Detector::PlanFile,
        ]
    }

    /// Run this detector against one escape-stripped line.
    pub fn detect(&self, line: &str) -> Option<ParsedEvent> {
        match self {
            Detector::RateLimit => detect_rate_limit(line),
            Detector::StatusLine => detect_status_line(line),
            Detector::Progress => detect_progress(line),
            Detector::Question => detect_question(line),
            Detector::UsageLimit => detect_usage_limit(line),
            Detector::PlanFile => detect_plan_file(line),
        }
    }
}

fn detect_rate_limit(line: &str) -> Option<ParsedEvent> {
    if !RATE_LIMIT_RE.is_match(line) {
        return None;
    }
    let retry_after_ms = RETRY_AFTER_RE.captures(line).and_then(|caps| {
        let value: u64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_ascii_lowercase();
        let factor = match unit.as_str() {
            "ms" | "millisecond" | "milliseconds" => 1,
            "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
            "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
            _ => 3_600_000,
        };
        Some(value.saturating_mul(factor))
    });
    Some(ParsedEvent::RateLimit { retry_after_ms })
}

fn detect_status_line(line: &str) -> Option<ParsedEvent> {
    let caps = STATUS_LINE_RE.captures(line)?;
    let task = caps.get(1)?.as_str().trim().to_string();
    let annotations = &line[caps.get(0)?.end()..];
    let elapsed_secs = STATUS_ELAPSED_RE
        .captures(annotations)
        .and_then(|c| c.get(1)?.as_str().parse().ok());
    let tokens = STATUS_TOKENS_RE.captures(annotations).and_then(|c| {
        let value: f64 = c.get(1)?.as_str().parse().ok()?;
        let scaled = if c.get(2)?.as_str().is_empty() {
            value
        } else {
            value * 1_000.0
        };
        Some(scaled as u64)
    });
    Some(ParsedEvent::StatusLine {
        task,
        elapsed_secs,
        tokens,
    })
}

fn detect_progress(line: &str) -> Option<ParsedEvent> {
    if PROGRESS_RESET_RE.is_match(line) {
        return Some(ParsedEvent::Progress {
            phase: 0,
            percent: 0,
        });
    }
    let caps = PROGRESS_RE.captures(line)?;
    let phase: u8 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    let percent: u8 = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|v| v.min(100) as u8)
        .unwrap_or(0);
    Some(ParsedEvent::Progress {
        phase: phase.clamp(1, 3),
        percent,
    })
}

fn detect_question(line: &str) -> Option<ParsedEvent> {
    let trimmed = line.trim();
    let matched = QUESTION_RE.is_match(trimmed)
        || (trimmed.ends_with('?') && trimmed.len() <= QUESTION_MAX_LEN);
    if !matched {
        return None;
    }
    Some(ParsedEvent::Question {
        text: trimmed.to_string(),
        source: QuestionSource::Pattern,
    })
}

fn detect_usage_limit(line: &str) -> Option<ParsedEvent> {
    let caps = USAGE_LIMIT_RE.captures(line)?;
    let percent: u32 = caps
        .get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .parse()
        .ok()?;
    Some(ParsedEvent::UsageLimit {
        percent_used: percent.min(100) as u8,
    })
}

fn detect_plan_file(line: &str) -> Option<ParsedEvent> {
    let caps = PLAN_FILE_RE.captures(line)?;
    let path = caps
        .get(1)?
        .as_str()
        .trim_end_matches(['.', ',', ')', '"', '\''])
        .to_string();
    if path.is_empty() {
        return None;
    }
    Some(ParsedEvent::PlanFile { path })
}
