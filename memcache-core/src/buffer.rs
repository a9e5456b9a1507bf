//! Growable FIFO byte buffer used as both the outbox and inbox of a
//! protocol engine (C6, spec §3 Engine, §5 Buffer discipline). Adapted from
//! the teacher's `net::buffer::Buffer`: same chunked-deque shape and the
//! same `ingress`/`egress` vocabulary (data flows *in* from a reader, *out*
//! to a writer), generalized to serve a text protocol's line- and
//! length-prefixed framing instead of the teacher's fixed-size binary
//! frames.
//!
//! One correction versus the teacher: the teacher's `ingress`/`egress` treat
//! a `Read`/`Write` call returning `Ok(0)` as "would block". That is only
//! true for the teacher's own `MockChannel` test double; for a real
//! non-blocking socket, `Ok(0)` means the peer closed the connection, while
//! "would block" is always signaled as `Err(WouldBlock)`. The teacher's own
//! socket read path (`net::channel::Channel::read`) was never finished
//! (`unimplemented!()`), so this gap was never exercised — this buffer
//! closes it by treating `Ok(0)` as a genuine EOF.

use crate::chunk::Chunk;
use crate::chunkpool::ChunkPool;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io;

/// A dynamically sized, chunked FIFO byte queue. Data is appended at the head and consumed
/// from the tail; the parser (C6) reads without copying when the readable region happens to
/// fit in one chunk, and copies once on hand-off otherwise (spec §5 Buffer discipline).
pub struct Buffer {
    chunks: VecDeque<Chunk>,
    pool: ChunkPool,
}

impl Buffer {
    #[inline]
    pub fn new() -> Buffer {
        let mut chunks = VecDeque::new();
        chunks.push_back(Chunk::new());
        Buffer { chunks, pool: ChunkPool::new() }
    }

    /// Total unread bytes currently buffered.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::remaining_data).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append bytes to the buffer (outbox use: framing a command for the wire).
    pub fn push(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let chunk = self.chunks.back_mut().expect("buffer always has a chunk");
            if chunk.capacity() == 0 {
                self.chunks.push_back(self.pool.alloc());
                continue;
            }
            let take = data.len().min(chunk.capacity());
            chunk.writeable_slice()[..take].copy_from_slice(&data[..take]);
            chunk.expand(take);
            data = &data[take..];
        }
    }

    /// Discard `count` bytes from the front of the buffer without returning them.
    pub fn consume(&mut self, mut count: usize) {
        assert!(count <= self.len(), "consume past buffered data");
        while count > 0 {
            let chunk = self.chunks.front_mut().expect("buffer always has a chunk");
            let take = count.min(chunk.remaining_data());
            chunk.advance(take);
            count -= take;
            if chunk.remaining_data() == 0 && self.chunks.len() > 1 {
                let spent = self.chunks.pop_front().unwrap();
                self.pool.reclaim(spent);
            }
        }
    }

    /// Borrow the first `count` readable bytes contiguously. Zero-copy when they fit in the
    /// front chunk; otherwise copies once into an owned buffer (spec §5).
    pub fn peek(&self, count: usize) -> Cow<'_, [u8]> {
        assert!(count <= self.len(), "peek past buffered data");

        let front = &self.chunks[0];
        if count <= front.remaining_data() {
            return Cow::Borrowed(&front.readable_slice()[..count]);
        }

        let mut out = Vec::with_capacity(count);
        for chunk in &self.chunks {
            let slice = chunk.readable_slice();
            let take = slice.len().min(count - out.len());
            out.extend_from_slice(&slice[..take]);
            if out.len() == count {
                break;
            }
        }
        Cow::Owned(out)
    }

    /// Take and consume the first `count` readable bytes as an owned buffer.
    pub fn take(&mut self, count: usize) -> Vec<u8> {
        let bytes = self.peek(count).into_owned();
        self.consume(count);
        bytes
    }

    /// Find the first occurrence of `needle` within the buffered data, scanning at most the
    /// first `limit` bytes. Used to locate a CRLF line terminator without copying the whole
    /// inbox when the terminator is near the front (the common case for reply tokens).
    pub fn find(&self, needle: &[u8], limit: usize) -> Option<usize> {
        let scan_len = self.len().min(limit);
        if scan_len < needle.len() {
            return None;
        }
        let haystack = self.peek(scan_len);
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
    }

    /// Pull as much data as is available from `reader` into the buffer without blocking.
    /// Returns the number of bytes read. A `WouldBlock` error from `reader` ends the loop
    /// normally (the socket has no more data *right now*); any other error, including a
    /// clean `Ok(0)` EOF, is propagated.
    pub fn ingress<R: io::Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let mut total = 0usize;

        loop {
            let chunk = self.chunks.back_mut().expect("buffer always has a chunk");
            if chunk.capacity() == 0 {
                self.chunks.push_back(self.pool.alloc());
                continue;
            }

            match reader.read(chunk.writeable_slice()) {
                Ok(0) => {
                    return if total > 0 {
                        Ok(total)
                    } else {
                        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed connection"))
                    };
                }
                Ok(n) => {
                    self.chunks.back_mut().unwrap().expand(n);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(e) => return Err(e),
            }
        }
    }

    /// Push as much buffered data as possible to `writer` without blocking. Returns the
    /// number of bytes written.
    pub fn egress<W: io::Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut total = 0usize;

        while !self.is_empty() {
            let chunk = self.chunks.front_mut().unwrap();
            match writer.write(chunk.readable_slice()) {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    chunk.advance(n);
                    total += n;
                    if chunk.remaining_data() == 0 && self.chunks.len() > 1 {
                        let spent = self.chunks.pop_front().unwrap();
                        self.pool.reclaim(spent);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_SIZE;
    use crate::testutil::MockSocket;

    #[test]
    fn push_and_take_roundtrip() {
        let mut buf = Buffer::new();
        buf.push(b"hello world");
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.take(5), b"hello");
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.take(6), b" world");
        assert!(buf.is_empty());
    }

    #[test]
    fn find_locates_crlf_across_chunk_boundary() {
        let mut buf = Buffer::new();
        let filler = vec![b'x'; CHUNK_SIZE - 1];
        buf.push(&filler);
        buf.push(b"\r\nSTORED\r\n");

        let pos = buf.find(b"\r\n", buf.len()).unwrap();
        assert_eq!(pos, CHUNK_SIZE - 1);
    }

    #[test]
    fn ingress_reads_until_would_block() {
        let mut buf = Buffer::new();
        let mut sock = MockSocket::new(vec![1, 2, 3, 4, 5], 2);
        let n = buf.ingress(&mut sock).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf.take(5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ingress_reports_eof_as_error() {
        let mut buf = Buffer::new();
        let mut sock = MockSocket::closed();
        let err = buf.ingress(&mut sock).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn egress_writes_until_would_block() {
        let mut buf = Buffer::new();
        buf.push(b"STORED\r\n");
        let mut sock = MockSocket::new(Vec::new(), 3);
        let n = buf.egress(&mut sock).unwrap();
        assert_eq!(n, 8);
        assert_eq!(sock.written(), b"STORED\r\n");
    }

    #[test]
    fn spans_multiple_chunks() {
        let mut buf = Buffer::new();
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3)).map(|i| i as u8).collect();
        buf.push(&data);
        assert_eq!(buf.len(), data.len());
        assert_eq!(buf.take(data.len()), data);
    }
}
