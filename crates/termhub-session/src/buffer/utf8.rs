//! Incremental UTF-8 decoding across chunk boundaries.

/// Decodes raw byte chunks into UTF-8 text, retaining an incomplete trailing
/// multi-byte sequence (at most 3 bytes) between calls.
///
/// Invalid bytes that can never complete to valid UTF-8 are substituted with
/// U+FFFD immediately; a valid-so-far tail is withheld until the next chunk
/// decides it.
#[derive(Debug, Default)]
pub struct Utf8ReadBuffer {
    /// Incomplete trailing sequence from the previous chunk.
    pending: Vec<u8>,
}

impl Utf8ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the longest prefix decodable without needing
    /// further bytes.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        if self.pending.is_empty() && chunk.is_empty() {
            return String::new();
        }

        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // SAFETY: `valid_up_to` guarantees `valid` is UTF-8.
                    out.push_str(unsafe { std::str::from_utf8_unchecked(valid) });
                    match e.error_len() {
                        // An invalid run that no continuation can repair.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete tail; wait for the next chunk.
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush the pending tail, substituting U+FFFD for whatever is held.
    ///
    /// Called once when the stream ends; a stream cut mid-codepoint can never
    /// complete.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"hello"), "hello");
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn empty_input_emits_nothing() {
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b""), "");
        assert_eq!(buf.finish(), "");
    }

    #[test]
    fn two_byte_sequence_split() {
        // é = 0xC3 0xA9
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"caf\xC3"), "caf");
        assert_eq!(buf.pending_len(), 1);
        assert_eq!(buf.push(b"\xA9"), "é");
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn three_byte_sequence_split_both_ways() {
        // ✓ = 0xE2 0x9C 0x93
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"\xE2"), "");
        assert_eq!(buf.push(b"\x9C"), "");
        assert_eq!(buf.push(b"\x93"), "✓");

        assert_eq!(buf.push(b"\xE2\x9C"), "");
        assert_eq!(buf.push(b"\x93ok"), "✓ok");
    }

    #[test]
    fn four_byte_sequence_split() {
        // 🦀 = 0xF0 0x9F 0xA6 0x80
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"\xF0\x9F"), "");
        assert_eq!(buf.push(b"\xA6"), "");
        assert_eq!(buf.push(b"\x80!"), "🦀!");
    }

    #[test]
    fn invalid_byte_substituted_once() {
        let mut buf = Utf8ReadBuffer::new();
        // 0xFF can never start a sequence.
        assert_eq!(buf.push(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn broken_continuation_substituted() {
        // Start of a 3-byte sequence followed by ASCII: unrecoverable.
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"\xE2x"), "\u{FFFD}x");
    }

    #[test]
    fn pending_tail_invalidated_by_next_chunk() {
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"\xE2\x9C"), "");
        // Next chunk starts a fresh character; the held tail is broken.
        assert_eq!(buf.push(b"ok"), "\u{FFFD}ok");
    }

    #[test]
    fn no_duplicate_replacement_at_valid_boundary() {
        let mut buf = Utf8ReadBuffer::new();
        let mut out = String::new();
        out.push_str(&buf.push("héllo".as_bytes()));
        out.push_str(&buf.push(" wörld".as_bytes()));
        out.push_str(&buf.finish());
        assert_eq!(out, "héllo wörld");
        assert!(!out.contains('\u{FFFD}'));
    }

    #[test]
    fn arbitrary_split_reconstructs_stream() {
        let text = "αβγ 你好 🦀 plain";
        let bytes = text.as_bytes();
        // Every split point, including mid-codepoint.
        for split in 0..=bytes.len() {
            let mut buf = Utf8ReadBuffer::new();
            let mut out = String::new();
            out.push_str(&buf.push(&bytes[..split]));
            out.push_str(&buf.push(&bytes[split..]));
            out.push_str(&buf.finish());
            assert_eq!(out, text, "failed at split {split}");
        }
    }

    #[test]
    fn finish_substitutes_held_tail() {
        let mut buf = Utf8ReadBuffer::new();
        assert_eq!(buf.push(b"ok\xF0\x9F"), "ok");
        assert_eq!(buf.finish(), "\u{FFFD}");
        assert_eq!(buf.finish(), "");
    }

    #[test]
    fn thousand_split_codepoints_reconstruct_exactly() {
        // One occurrence of a 3-byte character split across each boundary of
        // 5 chunks, repeated until 1,000 codepoints total.
        let text = "✓".repeat(1_000);
        let bytes = text.as_bytes();
        let chunk_len = bytes.len() / 5 + 1; // deliberately misaligned
        let mut buf = Utf8ReadBuffer::new();
        let mut out = String::new();
        for chunk in bytes.chunks(chunk_len) {
            out.push_str(&buf.push(chunk));
        }
        out.push_str(&buf.finish());
        assert_eq!(out.chars().filter(|&c| c == '✓').count(), 1_000);
        assert!(!out.contains('\u{FFFD}'));
        assert_eq!(out, text);
    }
}
