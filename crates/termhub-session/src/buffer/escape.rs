//! Escape-sequence-safe chunking.
//!
//! A PTY read can end in the middle of a terminal escape sequence; emitting
//! the two halves to separate consumers corrupts rendering. This buffer
//! withholds only an unterminated trailing sequence and emits everything
//! before it. Sequence classes recognized: bare ESC, CSI (`ESC [`), OSC
//! (`ESC ]`, terminated by BEL or ST), DCS/SOS/PM/APC (terminated by ST),
//! nF intermediates, and two-byte `ESC x` sequences.

/// Force-flush cap in bytes. A sequence introducer that has not terminated
/// after this much withheld data is treated as malformed input and emitted
/// as-is, bounding worst-case memory per session.
pub const ESCAPE_FLUSH_CAP: usize = 4096;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Withholds an incomplete trailing escape/control sequence between calls.
#[derive(Debug, Default)]
pub struct EscapeAwareBuffer {
    /// Withheld tail starting at the unterminated sequence introducer.
    pending: String,
}

impl EscapeAwareBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed UTF-8-safe text; returns everything up to (but not including)
    /// an unterminated trailing escape sequence.
    pub fn push(&mut self, text: &str) -> String {
        if self.pending.is_empty() && text.is_empty() {
            return String::new();
        }

        let mut input = std::mem::take(&mut self.pending);
        input.push_str(text);

        match unterminated_start(input.as_bytes()) {
            None => input,
            Some(start) => {
                if input.len() - start > ESCAPE_FLUSH_CAP {
                    tracing::debug!(
                        withheld = input.len() - start,
                        "force-flushing unterminated escape sequence"
                    );
                    input
                } else {
                    // ESC is ASCII, so `start` is a char boundary.
                    self.pending = input.split_off(start);
                    input
                }
            }
        }
    }

    /// Emit whatever is still withheld. Called once when the stream ends.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Remove complete escape/control sequences from text that already passed
/// through an [`EscapeAwareBuffer`]. An unterminated tail, which only a
/// force-flush can produce here, is dropped.
pub fn strip_sequences(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESC {
            match scan_sequence(bytes, i) {
                Scan::Complete(end) => i = end,
                Scan::Incomplete => break,
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    // Sequences start and end on ASCII bytes, so the remainder is intact
    // UTF-8; the lossy path is unreachable in practice.
    String::from_utf8(out)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Scan result for one sequence starting at an ESC byte.
enum Scan {
    /// Sequence ends before `end` (exclusive); resume scanning there.
    Complete(usize),
    /// Sequence reaches the end of input without terminating.
    Incomplete,
}

/// Returns the start index of a trailing unterminated sequence, if any.
fn unterminated_start(bytes: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != ESC {
            i += 1;
            continue;
        }
        match scan_sequence(bytes, i) {
            Scan::Complete(end) => i = end,
            Scan::Incomplete => return Some(i),
        }
    }
    None
}

/// Scan one escape sequence beginning at `start` (which indexes an ESC).
fn scan_sequence(bytes: &[u8], start: usize) -> Scan {
    let Some(&kind) = bytes.get(start + 1) else {
        return Scan::Incomplete;
    };

    match kind {
        // CSI: parameters / intermediates, then a final byte in 0x40-0x7E.
        b'[' => {
            let mut j = start + 2;
            while j < bytes.len() {
                if (0x40..=0x7E).contains(&bytes[j]) {
                    return Scan::Complete(j + 1);
                }
                j += 1;
            }
            Scan::Incomplete
        }
        // OSC: terminated by BEL or ST (ESC \).
        b']' => scan_string_body(bytes, start + 2, true),
        // DCS, SOS, PM, APC: terminated by ST.
        b'P' | b'X' | b'^' | b'_' => scan_string_body(bytes, start + 2, false),
        // nF sequences: intermediates 0x20-0x2F, then a final 0x30-0x7E.
        0x20..=0x2F => {
            let mut j = start + 2;
            while j < bytes.len() {
                match bytes[j] {
                    0x20..=0x2F => j += 1,
                    0x30..=0x7E => return Scan::Complete(j + 1),
                    // Malformed; stop treating it as a sequence.
                    _ => return Scan::Complete(j),
                }
            }
            Scan::Incomplete
        }
        // Two-byte sequence (ESC M, ESC 7, ESC =, ...).
        _ => Scan::Complete(start + 2),
    }
}

/// Scan a string-type control body starting at `from`.
fn scan_string_body(bytes: &[u8], from: usize, bel_terminates: bool) -> Scan {
    let mut j = from;
    while j < bytes.len() {
        let b = bytes[j];
        if bel_terminates && b == BEL {
            return Scan::Complete(j + 1);
        }
        if b == ESC {
            match bytes.get(j + 1) {
                Some(b'\\') => return Scan::Complete(j + 2),
                // ESC at the very end could be the first half of ST.
                None => return Scan::Incomplete,
                // Stray ESC inside the payload; keep scanning.
                Some(_) => {}
            }
        }
        j += 1;
    }
    Scan::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("hello world"), "hello world");
        assert_eq!(buf.finish(), "");
    }

    #[test]
    fn complete_csi_passes_through() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("a\x1b[31mred\x1b[0m"), "a\x1b[31mred\x1b[0m");
    }

    #[test]
    fn bare_esc_at_tail_withheld() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("text\x1b"), "text");
        assert_eq!(buf.push("[2K"), "\x1b[2K");
    }

    #[test]
    fn csi_split_never_emitted_in_halves() {
        let mut buf = EscapeAwareBuffer::new();
        let first = buf.push("before\x1b[38;5;1");
        assert_eq!(first, "before");
        assert!(!first.contains('\x1b'));
        let second = buf.push("2mafter");
        assert_eq!(second, "\x1b[38;5;12mafter");
    }

    #[test]
    fn osc_terminated_by_bel() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("\x1b]0;title\x07done"), "\x1b]0;title\x07done");
    }

    #[test]
    fn osc_split_before_st() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("x\x1b]8;;http://e"), "x");
        assert_eq!(buf.push("\x1b\\y"), "\x1b]8;;http://e\x1b\\y");
    }

    #[test]
    fn osc_tail_ending_in_esc_waits_for_st() {
        // The trailing ESC may be the first half of ST.
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("x\x1b]0;t\x1b"), "x");
        assert_eq!(buf.push("\\y"), "\x1b]0;t\x1b\\y");
    }

    #[test]
    fn dcs_terminated_by_st_only() {
        let mut buf = EscapeAwareBuffer::new();
        // BEL does not terminate DCS.
        assert_eq!(buf.push("\x1bPq\x07data"), "");
        assert_eq!(buf.push("\x1b\\z"), "\x1bPq\x07data\x1b\\z");
    }

    #[test]
    fn two_byte_sequence_complete() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("\x1bM up"), "\x1bM up");
        assert_eq!(buf.push("\x1b7saved"), "\x1b7saved");
    }

    #[test]
    fn nf_sequence_charset_designation() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("\x1b(Bok"), "\x1b(Bok");
        assert_eq!(buf.push("\x1b("), "");
        assert_eq!(buf.push("B"), "\x1b(B");
    }

    #[test]
    fn unterminated_sequence_force_flushed_at_cap() {
        let mut buf = EscapeAwareBuffer::new();
        // An OSC that never terminates.
        assert_eq!(buf.push("\x1b]0;"), "");
        let payload = "x".repeat(ESCAPE_FLUSH_CAP + 16);
        let out = buf.push(&payload);
        assert!(out.starts_with("\x1b]0;"));
        assert!(out.len() > ESCAPE_FLUSH_CAP);
        assert_eq!(buf.finish(), "");
        // Buffer keeps working afterwards.
        assert_eq!(buf.push("normal"), "normal");
    }

    #[test]
    fn byte_identity_across_arbitrary_splits() {
        let stream = "a\x1b[1;32mgreen\x1b[0m \x1b]0;title\x07 b\x1b(B end";
        let bytes = stream.as_bytes();
        for split in 0..=bytes.len() {
            // Splits here land on char boundaries; the stream is ASCII+ESC.
            let (l, r) = stream.split_at(split);
            let mut buf = EscapeAwareBuffer::new();
            let mut out = String::new();
            out.push_str(&buf.push(l));
            out.push_str(&buf.push(r));
            out.push_str(&buf.finish());
            assert_eq!(out, stream, "failed at split {split}");
        }
    }

    #[test]
    fn strip_removes_sequences_keeps_text() {
        assert_eq!(strip_sequences("a\x1b[31mred\x1b[0mb"), "aredb");
        assert_eq!(strip_sequences("\x1b]0;title\x07prompt $"), "prompt $");
        assert_eq!(strip_sequences("no sequences"), "no sequences");
        assert_eq!(strip_sequences("tail\x1b[3"), "tail");
    }

    #[test]
    fn finish_releases_withheld_tail() {
        let mut buf = EscapeAwareBuffer::new();
        assert_eq!(buf.push("end\x1b[3"), "end");
        assert_eq!(buf.finish(), "\x1b[3");
        assert_eq!(buf.finish(), "");
    }
}
