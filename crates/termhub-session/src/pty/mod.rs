//! Process/PTY backend abstraction.
//!
//! The session core depends only on [`PtyBackend`]; the one production
//! implementation wraps `portable-pty`, which selects the right OS primitive
//! (openpty / ConPTY). Tests substitute a scripted backend.

mod native;
#[cfg(test)]
pub(crate) mod testing;

pub use native::{default_shell, NativePty};

use std::io::Read;

/// Capability interface one PTY-attached child process exposes to the core.
///
/// `take_reader` hands out the output side exactly once, before the session
/// is published; the reader loop then owns it outside any session lock so a
/// blocked read never holds up write/resize/terminate.
pub trait PtyBackend: Send {
    /// Write input bytes to the child's terminal.
    fn write(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Resize the terminal.
    fn resize(&mut self, rows: u16, cols: u16) -> std::io::Result<()>;

    /// Take the blocking output reader. Returns `None` after the first call.
    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Terminate the child process. Closing the process this way forces a
    /// blocked read on the handle to return, which is how a reader loop is
    /// cancelled. Idempotent.
    fn terminate(&mut self);

    /// Block until the child exits; returns its exit code if obtainable.
    fn wait(&mut self) -> Option<u32>;
}
