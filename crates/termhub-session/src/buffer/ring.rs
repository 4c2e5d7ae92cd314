//! Bounded circular store of the most recent session output.

/// Retained output per session (64 KB), part of the observable contract.
pub const OUTPUT_RING_CAPACITY: usize = 64 * 1024;

/// Fixed-capacity circular byte store with a monotonic write counter.
///
/// Single writer (the session's reader loop); readers go through the same
/// lock the owning session wraps this in.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    capacity: usize,
    /// Next write position.
    write_pos: usize,
    /// Bytes written over the buffer's lifetime. Exceeds `capacity` once
    /// the buffer has wrapped.
    total_written: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            capacity,
            write_pos: 0,
            total_written: 0,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(OUTPUT_RING_CAPACITY)
    }

    /// Append bytes, overwriting the oldest once capacity is exceeded.
    pub fn write(&mut self, bytes: &[u8]) {
        self.total_written += bytes.len() as u64;

        // Only the last `capacity` bytes of an oversized write can survive.
        let bytes = if bytes.len() > self.capacity {
            &bytes[bytes.len() - self.capacity..]
        } else {
            bytes
        };

        let first = (self.capacity - self.write_pos).min(bytes.len());
        self.buf[self.write_pos..self.write_pos + first].copy_from_slice(&bytes[..first]);
        let rest = &bytes[first..];
        self.buf[..rest.len()].copy_from_slice(rest);
        self.write_pos = (self.write_pos + bytes.len()) % self.capacity;
    }

    /// Bytes currently retrievable.
    pub fn available(&self) -> usize {
        (self.total_written as usize).min(self.capacity)
    }

    /// Return the last `min(limit, capacity, available)` bytes in write order.
    pub fn read(&self, limit: usize) -> Vec<u8> {
        let n = limit.min(self.available());
        if n == 0 {
            return Vec::new();
        }
        let start = (self.write_pos + self.capacity - n) % self.capacity;
        let mut out = Vec::with_capacity(n);
        if start + n <= self.capacity {
            out.extend_from_slice(&self.buf[start..start + n]);
        } else {
            out.extend_from_slice(&self.buf[start..]);
            out.extend_from_slice(&self.buf[..n - (self.capacity - start)]);
        }
        out
    }

    /// Total bytes ever written; monotonic.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_wrap_returns_everything() {
        let mut ring = RingBuffer::new(16);
        ring.write(b"hello");
        assert_eq!(ring.read(16), b"hello");
        assert_eq!(ring.total_written(), 5);
        assert_eq!(ring.available(), 5);
    }

    #[test]
    fn read_respects_limit() {
        let mut ring = RingBuffer::new(16);
        ring.write(b"hello world");
        assert_eq!(ring.read(5), b"world");
    }

    #[test]
    fn wrap_keeps_most_recent_bytes() {
        let mut ring = RingBuffer::new(8);
        ring.write(b"abcdefgh");
        ring.write(b"ij");
        assert_eq!(ring.read(8), b"cdefghij");
        assert_eq!(ring.total_written(), 10);
        assert_eq!(ring.available(), 8);
    }

    #[test]
    fn oversized_single_write_keeps_tail() {
        let mut ring = RingBuffer::new(8);
        ring.write(b"0123456789abcdef");
        assert_eq!(ring.read(8), b"89abcdef");
        assert_eq!(ring.total_written(), 16);
    }

    #[test]
    fn read_never_exceeds_capacity_regardless_of_limit() {
        let mut ring = RingBuffer::new(8);
        ring.write(b"0123456789");
        assert_eq!(ring.read(usize::MAX).len(), 8);
    }

    #[test]
    fn empty_ring_reads_empty() {
        let ring = RingBuffer::new(8);
        assert!(ring.read(8).is_empty());
        assert_eq!(ring.total_written(), 0);
    }

    #[test]
    fn seventy_kib_into_default_capacity() {
        let mut ring = RingBuffer::with_default_capacity();
        let data: Vec<u8> = (0..70 * 1024u32).map(|i| (i % 251) as u8).collect();
        for chunk in data.chunks(4096) {
            ring.write(chunk);
        }
        assert_eq!(ring.total_written(), 70 * 1024);
        let out = ring.read(65_536);
        assert_eq!(out.len(), 64 * 1024);
        assert_eq!(out[..], data[data.len() - 64 * 1024..]);
    }

    #[test]
    fn many_small_writes_match_reference() {
        let mut ring = RingBuffer::new(32);
        let mut reference = Vec::new();
        for i in 0..100u8 {
            let chunk = vec![i; (i % 7 + 1) as usize];
            ring.write(&chunk);
            reference.extend_from_slice(&chunk);
        }
        let tail = &reference[reference.len() - 32..];
        assert_eq!(ring.read(32), tail);
        assert_eq!(ring.read(10), &tail[22..]);
    }
}
