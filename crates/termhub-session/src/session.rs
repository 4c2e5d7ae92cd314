//! Per-session record: one PTY instance plus its independently guarded state.
//!
//! Each field a caller or the reader loop mutates sits behind its own guard
//! (backend mutex, ring mutex, pause gate, atomics), so operations on one
//! session never contend with another session and never contend with the
//! table's membership lock.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use termhub_common::{HostError, Result, SessionId};

use crate::buffer::RingBuffer;
use crate::parse::AgentKind;
use crate::pty::PtyBackend;

/// Caller-supplied parameters for a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Program to run. `None` means the user's default shell.
    pub command: Option<String>,
    /// Working directory for the child process.
    pub cwd: PathBuf,
    pub rows: u16,
    pub cols: u16,
    /// Selects the structured-output detector set.
    pub agent: AgentKind,
    /// Opaque caller context (e.g. workspace association). Stored, listed,
    /// never interpreted.
    pub context: Value,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: None,
            cwd: PathBuf::from("."),
            rows: 24,
            cols: 80,
            agent: AgentKind::Shell,
            context: Value::Null,
        }
    }
}

/// Snapshot row returned by `list()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub cwd: PathBuf,
    pub context: Value,
}

/// Pause gate for one reader loop.
///
/// The flag is the only channel controlling whether the loop keeps draining
/// the PTY; while paused, output accumulates in the OS-level PTY buffer up
/// to that buffer's own limit, which is the deliberate backpressure bound.
#[derive(Debug, Default)]
pub(crate) struct PauseGate {
    paused: Mutex<bool>,
    unpaused: Condvar,
}

impl PauseGate {
    pub(crate) fn pause(&self) {
        *self.paused.lock().unwrap() = true;
    }

    pub(crate) fn resume(&self) {
        *self.paused.lock().unwrap() = false;
        self.unpaused.notify_all();
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }

    /// Block the calling reader loop until resumed. Returns immediately when
    /// not paused.
    pub(crate) fn wait_while_paused(&self) {
        let mut paused = self.paused.lock().unwrap();
        while *paused {
            paused = self.unpaused.wait(paused).unwrap();
        }
    }
}

/// One live PTY session.
pub struct Session {
    id: SessionId,
    cwd: PathBuf,
    context: Value,
    agent: AgentKind,
    backend: Mutex<Box<dyn PtyBackend>>,
    ring: Mutex<RingBuffer>,
    pub(crate) pause: PauseGate,
    closed: AtomicBool,
    /// Set by whichever path emits the exit notification first.
    exit_emitted: AtomicBool,
    last_output: Mutex<Instant>,
    /// Whether the current quiet period has already been reported.
    quiet_reported: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        cwd: PathBuf,
        context: Value,
        agent: AgentKind,
        backend: Box<dyn PtyBackend>,
    ) -> Self {
        Self {
            id,
            cwd,
            context,
            agent,
            backend: Mutex::new(backend),
            ring: Mutex::new(RingBuffer::with_default_capacity()),
            pause: PauseGate::default(),
            closed: AtomicBool::new(false),
            exit_emitted: AtomicBool::new(false),
            last_output: Mutex::new(Instant::now()),
            quiet_reported: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            cwd: self.cwd.clone(),
            context: self.context.clone(),
        }
    }

    /// Send input bytes to the child's terminal.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(HostError::SessionNotFound(self.id.clone()));
        }
        self.backend.lock().unwrap().write(data)?;
        Ok(())
    }

    /// Resize the terminal. Both dimensions must be positive.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(HostError::InvalidDimensions { rows, cols });
        }
        if self.is_closed() {
            return Err(HostError::SessionNotFound(self.id.clone()));
        }
        self.backend.lock().unwrap().resize(rows, cols)?;
        Ok(())
    }

    /// Stop the reader loop from draining output. Does not signal the child.
    pub fn pause(&self) {
        self.pause.pause();
    }

    /// Let the reader loop drain again.
    pub fn resume(&self) {
        self.pause.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Terminate the child and release the handle. Idempotent.
    ///
    /// Killing the child closes the PTY, which forces the reader loop's
    /// blocked read to return; a paused loop is woken first so it can
    /// observe the closure.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pause.resume();
        self.backend.lock().unwrap().terminate();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Read the most recent output bytes, raw (unresolved control sequences
    /// included — interpretation is a rendering concern).
    pub fn read_output(&self, limit: usize) -> Vec<u8> {
        self.ring.lock().unwrap().read(limit)
    }

    pub fn total_output_bytes(&self) -> u64 {
        self.ring.lock().unwrap().total_written()
    }

    pub(crate) fn append_output(&self, bytes: &[u8]) {
        self.ring.lock().unwrap().write(bytes);
        *self.last_output.lock().unwrap() = Instant::now();
        self.quiet_reported.store(false, Ordering::SeqCst);
    }

    pub(crate) fn take_reader(&self) -> Option<Box<dyn std::io::Read + Send>> {
        self.backend.lock().unwrap().take_reader()
    }

    pub(crate) fn wait_exit(&self) -> Option<u32> {
        self.backend.lock().unwrap().wait()
    }

    /// True exactly once, for whichever caller gets to emit the exit
    /// notification.
    pub(crate) fn claim_exit_emission(&self) -> bool {
        !self.exit_emitted.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn quiet_for(&self) -> Duration {
        self.last_output.lock().unwrap().elapsed()
    }

    /// True exactly once per quiet period; reset by the next output chunk.
    pub(crate) fn claim_quiet_report(&self) -> bool {
        !self.quiet_reported.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::testing::ScriptedPty;

    fn scripted_session() -> (Session, crate::pty::testing::ScriptHandle) {
        let (pty, handle) = ScriptedPty::new(0);
        let session = Session::new(
            SessionId::new(),
            PathBuf::from("/tmp"),
            Value::Null,
            AgentKind::Shell,
            Box::new(pty),
        );
        (session, handle)
    }

    #[test]
    fn write_reaches_backend() {
        let (session, handle) = scripted_session();
        session.write(b"echo hi\r").unwrap();
        assert_eq!(handle.written(), b"echo hi\r");
    }

    #[test]
    fn write_after_close_is_session_not_found() {
        let (session, _handle) = scripted_session();
        session.close();
        let err = session.write(b"x").unwrap_err();
        assert!(matches!(err, HostError::SessionNotFound(_)));
    }

    #[test]
    fn resize_rejects_zero_dimensions() {
        let (session, handle) = scripted_session();
        assert!(matches!(
            session.resize(0, 80),
            Err(HostError::InvalidDimensions { rows: 0, cols: 80 })
        ));
        assert!(matches!(
            session.resize(24, 0),
            Err(HostError::InvalidDimensions { rows: 24, cols: 0 })
        ));
        session.resize(40, 120).unwrap();
        assert_eq!(handle.last_resize(), Some((40, 120)));
    }

    #[test]
    fn close_is_idempotent_and_terminates_once() {
        let (session, handle) = scripted_session();
        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(handle.terminate_count(), 1);
    }

    #[test]
    fn pause_gate_blocks_and_releases() {
        use std::sync::Arc;

        let gate = Arc::new(PauseGate::default());
        gate.pause();
        assert!(gate.is_paused());

        let gate2 = Arc::clone(&gate);
        let waiter = std::thread::spawn(move || {
            gate2.wait_while_paused();
        });

        // The waiter should still be parked.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        gate.resume();
        waiter.join().unwrap();
        assert!(!gate.is_paused());
    }

    #[test]
    fn wait_while_paused_returns_immediately_when_unpaused() {
        let gate = PauseGate::default();
        gate.wait_while_paused();
    }

    #[test]
    fn exit_emission_claimed_once() {
        let (session, _handle) = scripted_session();
        assert!(session.claim_exit_emission());
        assert!(!session.claim_exit_emission());
    }

    #[test]
    fn quiet_report_resets_on_output() {
        let (session, _handle) = scripted_session();
        assert!(session.claim_quiet_report());
        assert!(!session.claim_quiet_report());
        session.append_output(b"data");
        assert!(session.claim_quiet_report());
    }

    #[test]
    fn output_ring_round_trip() {
        let (session, _handle) = scripted_session();
        session.append_output(b"hello ");
        session.append_output(b"world");
        assert_eq!(session.read_output(8192), b"hello world");
        assert_eq!(session.total_output_bytes(), 11);
    }
}
