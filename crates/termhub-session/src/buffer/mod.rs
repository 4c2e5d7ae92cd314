//! Byte-safety buffering chain for PTY output.
//!
//! Raw PTY reads can split a multi-byte UTF-8 codepoint or a terminal escape
//! sequence at any boundary. Chunks flow through [`Utf8ReadBuffer`] first and
//! [`EscapeAwareBuffer`] second; the concatenation of everything emitted is
//! byte-identical to the concatenation of all inputs.

mod escape;
mod ring;
mod utf8;

pub use escape::{strip_sequences, EscapeAwareBuffer, ESCAPE_FLUSH_CAP};
pub use ring::{RingBuffer, OUTPUT_RING_CAPACITY};
pub use utf8::Utf8ReadBuffer;
