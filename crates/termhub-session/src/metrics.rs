//! Host-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters plus the `active` gauge. Everything is atomic; the
/// reader loops and caller-facing operations update these without any lock.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Sessions successfully created, ever.
    created: AtomicU64,
    /// Creations that failed at process spawn.
    spawn_failures: AtomicU64,
    /// Currently active sessions.
    active: AtomicU64,
    /// Safe-text bytes forwarded to sinks, across all sessions.
    bytes_forwarded: AtomicU64,
    /// `pause()` invocations, independent of byte volume.
    pauses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve one active slot, failing once `max` are taken. The slot is
    /// claimed before the process spawn so concurrent creates can never
    /// overshoot the cap; a failed spawn releases it.
    pub fn try_reserve_session(&self, max: usize) -> std::result::Result<(), usize> {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if current as usize >= max {
                return Err(current as usize);
            }
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release one active slot (session removed or spawn rolled back).
    ///
    /// Underflow means the table's accounting is corrupted; that must fail
    /// loudly rather than continue with an inconsistent count.
    pub fn release_session(&self) {
        let prev = self.active.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "active session count underflow");
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, n: usize) {
        self.bytes_forwarded.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed) as usize
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_created: self.created.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            active_sessions: self.active.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
        }
    }
}

/// Serializable point-in-time view, exposed through the bridge contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sessions_created: u64,
    pub spawn_failures: u64,
    pub active_sessions: u64,
    pub bytes_forwarded: u64,
    pub pauses: u64,
}
