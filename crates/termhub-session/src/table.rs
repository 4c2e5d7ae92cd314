//! The session table: host-wide registry and command surface.
//!
//! [`SessionHost`] owns the map of live sessions behind a single `RwLock`,
//! which guards membership only. All per-session state lives inside each
//! [`Session`] behind its own guards, so `write` on one session never blocks
//! `read_output` on another, and no lock is held across a PTY syscall.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use termhub_common::{EventBus, HostError, HostEvent, ParsedEvent, QuestionSource, Result, SessionId};
use tracing::{info, warn};

use crate::metrics::{Metrics, MetricsSnapshot};
use crate::pty::{default_shell, NativePty, PtyBackend};
use crate::reader::spawn_reader;
use crate::session::{Session, SessionConfig, SessionInfo};

/// Hard cap on concurrently live sessions.
pub const MAX_SESSIONS: usize = 50;

/// `read_output` limit when the caller does not pass one.
pub const DEFAULT_READ_LIMIT: usize = 8192;

/// Largest honored `read_output` limit; also the ring capacity, so the cap
/// never truncates below what the ring can hold.
pub const MAX_READ_LIMIT: usize = 64 * 1024;

/// Host-level tunables sourced from configuration.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Shell to launch when a session has no explicit command. `None` means
    /// the user's default shell.
    pub shell: Option<String>,
    /// Terminal dimensions for sessions created without explicit ones.
    pub rows: u16,
    pub cols: u16,
    /// How long a question-capable session must stay silent before the host
    /// reports it as probably waiting for input.
    pub quiet_window: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            shell: None,
            rows: 24,
            cols: 80,
            quiet_window: Duration::from_millis(30_000),
        }
    }
}

/// Capacity snapshot for callers that gate their own session creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostStats {
    pub active: usize,
    pub max: usize,
    pub available: usize,
}

/// Registry of live PTY sessions and the single entry point for operating
/// on them.
///
/// Constructed once behind an `Arc`; reader threads hold it weakly so the
/// host can be dropped while sessions are still winding down.
pub struct SessionHost {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    bus: EventBus,
    metrics: Arc<Metrics>,
    options: HostOptions,
}

impl SessionHost {
    pub fn new(options: HostOptions) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            bus: EventBus::new(),
            metrics: Arc::new(Metrics::new()),
            options,
        })
    }

    /// The bus every consumer (native or service) subscribes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// A [`SessionConfig`] seeded from the host's configured defaults.
    /// Callers override individual fields before `create`.
    pub fn default_session_config(&self) -> SessionConfig {
        SessionConfig {
            rows: self.options.rows,
            cols: self.options.cols,
            ..SessionConfig::default()
        }
    }

    /// Spawn a new PTY session.
    ///
    /// A capacity slot is reserved before the spawn is attempted so two
    /// concurrent creates cannot both squeeze past the cap; the slot is
    /// rolled back when the spawn fails.
    pub fn create(self: &Arc<Self>, config: SessionConfig) -> Result<SessionId> {
        self.metrics
            .try_reserve_session(MAX_SESSIONS)
            .map_err(|active| HostError::CapacityExceeded {
                active,
                max: MAX_SESSIONS,
            })?;

        if config.rows == 0 || config.cols == 0 {
            self.metrics.release_session();
            return Err(HostError::InvalidDimensions {
                rows: config.rows,
                cols: config.cols,
            });
        }

        let login_shell = config.command.is_none();
        let program = match (&config.command, &self.options.shell) {
            (Some(cmd), _) => cmd.clone(),
            (None, Some(shell)) => shell.clone(),
            (None, None) => default_shell(),
        };

        match NativePty::spawn(&program, &config.cwd, config.rows, config.cols, login_shell) {
            Ok(backend) => self.register(config, Box::new(backend)),
            Err(msg) => {
                self.metrics.release_session();
                self.metrics.record_spawn_failure();
                warn!(program = %program, "session spawn failed: {msg}");
                Err(HostError::SpawnFailure(msg))
            }
        }
    }

    /// Register an already-spawned backend. Test seam for driving the full
    /// pipeline without a real PTY; `create` funnels through here too.
    pub(crate) fn register(
        self: &Arc<Self>,
        config: SessionConfig,
        backend: Box<dyn PtyBackend>,
    ) -> Result<SessionId> {
        let id = SessionId::new();
        let session = Arc::new(Session::new(
            id.clone(),
            config.cwd,
            config.context,
            config.agent,
            backend,
        ));

        let Some(reader) = session.take_reader() else {
            self.metrics.release_session();
            return Err(HostError::SpawnFailure("PTY reader unavailable".into()));
        };

        // Insert before spawning the reader so an immediate EOF still finds
        // the entry to remove.
        self.sessions
            .write()
            .unwrap()
            .insert(id.clone(), Arc::clone(&session));

        if let Err(e) = spawn_reader(
            Arc::clone(&session),
            reader,
            Arc::downgrade(self),
            self.bus.clone(),
            Arc::clone(&self.metrics),
        ) {
            self.sessions.write().unwrap().remove(&id);
            session.close();
            self.metrics.release_session();
            self.metrics.record_spawn_failure();
            return Err(HostError::SpawnFailure(format!(
                "failed to start reader thread: {e}"
            )));
        }

        self.metrics.record_created();
        info!(session_id = %id, agent = ?session.agent(), "session created");
        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn create_with_backend(
        self: &Arc<Self>,
        config: SessionConfig,
        backend: Box<dyn PtyBackend>,
    ) -> Result<SessionId> {
        self.metrics
            .try_reserve_session(MAX_SESSIONS)
            .map_err(|active| HostError::CapacityExceeded {
                active,
                max: MAX_SESSIONS,
            })?;
        self.register(config, backend)
    }

    /// Look up a live session. Closed sessions are removed from the table,
    /// so they report `SessionNotFound` like never-created ones.
    pub fn get(&self, id: &SessionId) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| HostError::SessionNotFound(id.clone()))
    }

    pub fn write(&self, id: &SessionId, data: &[u8]) -> Result<()> {
        self.get(id)?.write(data)
    }

    pub fn resize(&self, id: &SessionId, rows: u16, cols: u16) -> Result<()> {
        self.get(id)?.resize(rows, cols)
    }

    pub fn pause(&self, id: &SessionId) -> Result<()> {
        self.get(id)?.pause();
        self.metrics.record_pause();
        Ok(())
    }

    pub fn resume(&self, id: &SessionId) -> Result<()> {
        self.get(id)?.resume();
        Ok(())
    }

    /// Terminate a session. Unlike the other operations this is idempotent:
    /// closing an unknown or already-closed id is a no-op, since the caller's
    /// intent (the session is gone) already holds.
    pub fn close(&self, id: &SessionId) -> Result<()> {
        let removed = self.sessions.write().unwrap().remove(id);
        if let Some(session) = removed {
            session.close();
            info!(session_id = %id, "session closed");
        }
        Ok(())
    }

    /// Close every live session. Used at shutdown; exit notifications still
    /// flow from the reader threads as each child dies.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Session>> =
            self.sessions.write().unwrap().drain().map(|(_, s)| s).collect();
        for session in drained {
            session.close();
        }
    }

    /// Recent output for one session, newest bytes last. `limit` defaults to
    /// [`DEFAULT_READ_LIMIT`] and is capped at [`MAX_READ_LIMIT`].
    pub fn read_output(&self, id: &SessionId, limit: Option<usize>) -> Result<Vec<u8>> {
        let limit = limit.unwrap_or(DEFAULT_READ_LIMIT).min(MAX_READ_LIMIT);
        Ok(self.get(id)?.read_output(limit))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .unwrap()
            .values()
            .map(|s| s.info())
            .collect()
    }

    pub fn stats(&self) -> HostStats {
        let active = self.metrics.active();
        HostStats {
            active,
            max: MAX_SESSIONS,
            available: MAX_SESSIONS.saturating_sub(active),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Report question-capable sessions that have been silent past the
    /// configured quiet window. At most one report per quiet period; the
    /// next output chunk re-arms the session.
    pub fn poll_quiet_sessions(&self) {
        let candidates: Vec<Arc<Session>> = self
            .sessions
            .read()
            .unwrap()
            .values()
            .filter(|s| s.agent().question_capable())
            .cloned()
            .collect();

        for session in candidates {
            if session.is_closed() || session.quiet_for() < self.options.quiet_window {
                continue;
            }
            if !session.claim_quiet_report() {
                continue;
            }
            let secs = self.options.quiet_window.as_secs();
            self.bus.publish(HostEvent::StructuredEvent {
                session_id: session.id().clone(),
                event: ParsedEvent::Question {
                    text: format!("No output for {secs}s; the agent may be waiting for input"),
                    source: QuestionSource::Silence,
                },
            });
        }
    }

    /// Called by a reader thread after its PTY reached EOF. Removes the
    /// table entry, frees the capacity slot, and emits the exit
    /// notification, all gated by the session's exactly-once claim so the
    /// close path and the EOF path cannot double-report.
    pub(crate) fn finalize_exit(&self, session: &Session, exit_code: u32) {
        self.sessions.write().unwrap().remove(session.id());
        if session.claim_exit_emission() {
            self.metrics.release_session();
            self.bus.publish(HostEvent::SessionExited {
                session_id: session.id().clone(),
                exit_code,
            });
        }
    }
}
