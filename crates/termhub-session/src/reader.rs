//! Per-session reader loop.
//!
//! One dedicated OS thread per session does blocking reads from the PTY and
//! drives the whole output pipeline: UTF-8 reassembly, escape-sequence
//! buffering, the pause gate, the ring buffer, the event bus, and the
//! structured-output parser. Every sink sees the same chunks in the same
//! order because a single thread feeds them all.

use std::io::Read;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use termhub_common::{EventBus, HostEvent};
use tracing::{debug, info};

use crate::buffer::{EscapeAwareBuffer, Utf8ReadBuffer};
use crate::metrics::Metrics;
use crate::parse::OutputParser;
use crate::session::Session;
use crate::table::SessionHost;

/// Read buffer size for one `read()` call against the PTY.
pub(crate) const PTY_READ_CHUNK: usize = 8192;

/// Spawn the reader thread for `session`.
///
/// The thread runs until the PTY reports EOF or an error, then flushes the
/// buffering chain, waits for the child's exit status, and finalizes the
/// session through the host. The host is held weakly so a dropped host does
/// not keep reader threads pinning sessions alive.
pub(crate) fn spawn_reader(
    session: Arc<Session>,
    reader: Box<dyn Read + Send>,
    host: Weak<SessionHost>,
    bus: EventBus,
    metrics: Arc<Metrics>,
) -> std::io::Result<JoinHandle<()>> {
    let name = format!("pty-reader-{}", session.id());
    thread::Builder::new()
        .name(name)
        .spawn(move || read_loop(session, reader, host, bus, metrics))
}

fn read_loop(
    session: Arc<Session>,
    mut reader: Box<dyn Read + Send>,
    host: Weak<SessionHost>,
    bus: EventBus,
    metrics: Arc<Metrics>,
) {
    let mut buf = [0u8; PTY_READ_CHUNK];
    let mut utf8 = Utf8ReadBuffer::new();
    let mut escape = EscapeAwareBuffer::new();
    let mut parser = OutputParser::for_agent(session.agent());

    loop {
        if session.is_closed() {
            break;
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(session_id = %session.id(), error = %e, "pty read failed");
                break;
            }
        };

        let decoded = utf8.push(&buf[..n]);
        let text = escape.push(&decoded);
        if text.is_empty() {
            continue;
        }
        forward(&session, &text, &mut parser, &bus, &metrics);
    }

    // Release anything still held back by the safety buffers. A lone
    // continuation fragment becomes U+FFFD; an unterminated escape sequence
    // goes out raw rather than disappearing.
    let mut tail = escape.push(&utf8.finish());
    tail.push_str(&escape.finish());
    if !tail.is_empty() {
        forward(&session, &tail, &mut parser, &bus, &metrics);
    }
    for event in parser.flush() {
        bus.publish(HostEvent::StructuredEvent {
            session_id: session.id().clone(),
            event,
        });
    }

    let exit_code = session.wait_exit().unwrap_or(0);
    info!(session_id = %session.id(), exit_code, "session reader finished");

    match host.upgrade() {
        Some(host) => host.finalize_exit(&session, exit_code),
        // Host already gone (shutdown); still honor the exactly-once exit
        // notification for any remaining subscriber.
        None => {
            if session.claim_exit_emission() {
                metrics.release_session();
                bus.publish(HostEvent::SessionExited {
                    session_id: session.id().clone(),
                    exit_code,
                });
            }
        }
    }
}

/// Push one decoded chunk through the pause gate and into every sink.
///
/// The gate sits between the read and the fan-out: a chunk read concurrently
/// with `pause()` is withheld here, so after `pause()` returns no new bytes
/// reach the ring, the bus, or the parser until `resume()`.
fn forward(
    session: &Session,
    text: &str,
    parser: &mut OutputParser,
    bus: &EventBus,
    metrics: &Metrics,
) {
    session.pause.wait_while_paused();

    session.append_output(text.as_bytes());
    metrics.record_bytes(text.len());
    bus.publish(HostEvent::SessionOutput {
        session_id: session.id().clone(),
        data: text.to_string(),
    });
    for event in parser.feed(text) {
        bus.publish(HostEvent::StructuredEvent {
            session_id: session.id().clone(),
            event,
        });
    }
}
