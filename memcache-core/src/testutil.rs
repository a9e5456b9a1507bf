//! Shared test double for a non-blocking socket, generalized from the
//! `MockChannel` the teacher defines inline inside `net::buffer`'s test
//! module. Reused here by [`crate::buffer`], [`crate::protocol`] and
//! [`crate::dispatcher`] tests so each module doesn't redefine it.

#![cfg(test)]

use std::collections::VecDeque;
use std::io;

/// A scripted in-memory duplex socket. Reads are served from a preloaded byte queue in
/// chunks of at most `read_chunk` bytes; once exhausted, further reads return
/// `WouldBlock` unless `closed` is set, in which case they return `Ok(0)` (EOF). Writes are
/// appended to an internal buffer for assertions, in chunks of at most `write_chunk` bytes.
pub struct MockSocket {
    to_read: VecDeque<u8>,
    written: Vec<u8>,
    read_chunk: usize,
    write_chunk: usize,
    closed: bool,
}

impl MockSocket {
    pub fn new(to_read: Vec<u8>, read_chunk: usize) -> MockSocket {
        MockSocket {
            to_read: to_read.into(),
            written: Vec::new(),
            read_chunk,
            write_chunk: usize::MAX,
            closed: false,
        }
    }

    pub fn empty() -> MockSocket {
        MockSocket::new(Vec::new(), usize::MAX)
    }

    pub fn closed() -> MockSocket {
        let mut sock = MockSocket::empty();
        sock.closed = true;
        sock
    }

    pub fn with_write_chunk(mut self, write_chunk: usize) -> MockSocket {
        self.write_chunk = write_chunk;
        self
    }

    pub fn queue_read(&mut self, data: &[u8]) {
        self.to_read.extend(data);
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl io::Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.to_read.is_empty() {
            return if self.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }

        let take = buf.len().min(self.read_chunk).min(self.to_read.len());
        for slot in buf.iter_mut().take(take) {
            *slot = self.to_read.pop_front().unwrap();
        }
        Ok(take)
    }
}

impl io::Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let take = buf.len().min(self.write_chunk);
        self.written.extend_from_slice(&buf[..take]);
        if take == 0 && !buf.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
