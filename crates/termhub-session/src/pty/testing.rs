//! Scripted in-memory backend for pipeline tests.

use std::io::Read;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::PtyBackend;

/// What the test harness observed and controls about one [`ScriptedPty`].
#[derive(Clone)]
pub(crate) struct ScriptHandle {
    tx: Sender<Option<Vec<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
    last_resize: Arc<Mutex<Option<(u16, u16)>>>,
    terminates: Arc<AtomicU32>,
}

impl ScriptHandle {
    /// Feed one output chunk to the blocked reader.
    pub(crate) fn emit(&self, bytes: &[u8]) {
        self.tx.send(Some(bytes.to_vec())).unwrap();
    }

    /// Simulate the child exiting (EOF on the PTY).
    pub(crate) fn eof(&self) {
        let _ = self.tx.send(None);
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn last_resize(&self) -> Option<(u16, u16)> {
        *self.last_resize.lock().unwrap()
    }

    pub(crate) fn terminate_count(&self) -> u32 {
        self.terminates.load(Ordering::SeqCst)
    }
}

/// Blocking reader backed by the script channel. `None` or a disconnected
/// sender both read as EOF, mirroring a closed PTY. Chunks larger than the
/// caller's buffer carry over to the next read.
struct ScriptedReader {
    rx: Receiver<Option<Vec<u8>>>,
    leftover: Vec<u8>,
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.leftover.is_empty() {
            match self.rx.recv() {
                Ok(Some(chunk)) => self.leftover = chunk,
                Ok(None) | Err(_) => return Ok(0),
            }
        }
        let n = self.leftover.len().min(buf.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }
}

/// In-memory [`PtyBackend`] whose output is scripted by the test.
pub(crate) struct ScriptedPty {
    reader: Option<Box<dyn Read + Send>>,
    tx: Sender<Option<Vec<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
    last_resize: Arc<Mutex<Option<(u16, u16)>>>,
    terminates: Arc<AtomicU32>,
    exit_code: u32,
}

impl ScriptedPty {
    pub(crate) fn new(exit_code: u32) -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let last_resize = Arc::new(Mutex::new(None));
        let terminates = Arc::new(AtomicU32::new(0));
        let handle = ScriptHandle {
            tx: tx.clone(),
            written: Arc::clone(&written),
            last_resize: Arc::clone(&last_resize),
            terminates: Arc::clone(&terminates),
        };
        let pty = Self {
            reader: Some(Box::new(ScriptedReader {
                rx,
                leftover: Vec::new(),
            })),
            tx,
            written,
            last_resize,
            terminates,
            exit_code,
        };
        (pty, handle)
    }
}

impl PtyBackend for ScriptedPty {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, rows: u16, cols: u16) -> std::io::Result<()> {
        *self.last_resize.lock().unwrap() = Some((rows, cols));
        Ok(())
    }

    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    fn terminate(&mut self) {
        self.terminates.fetch_add(1, Ordering::SeqCst);
        // A killed child reads as EOF.
        let _ = self.tx.send(None);
    }

    fn wait(&mut self) -> Option<u32> {
        Some(self.exit_code)
    }
}
