//! Protocol engine (C6, spec §4.6). One instance per server: frames
//! outbound commands into `outbox`, parses inbound replies out of `inbox`,
//! and keeps a FIFO `pending` queue so replies are matched to commands in
//! issue order regardless of nowait discarding (spec §3 invariants).
//!
//! The buffer plumbing (`outbox`/`inbox`, non-blocking egress/ingress) is
//! the teacher's `net::buffer::Buffer`; the framing and parsing below is
//! new — the teacher's own wire format is a fixed-size encrypted binary
//! frame (`net::frame::Header`/`ConnectionToken`), nothing like the
//! line-oriented ASCII dialect this component speaks.

use crate::address::{ServerAddress, Socket};
use crate::buffer::Buffer;
use crate::error::ServerError;
use std::collections::VecDeque;
use std::io;

/// Opaque handle the dispatcher (C7) attaches to an enqueued command; `None` means the
/// caller fired-and-forgot (nowait) and the reply, once parsed, is discarded.
pub type SlotId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Open,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVerb {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
}

impl StoreVerb {
    fn as_str(self) -> &'static str {
        match self {
            StoreVerb::Set => "set",
            StoreVerb::Add => "add",
            StoreVerb::Replace => "replace",
            StoreVerb::Append => "append",
            StoreVerb::Prepend => "prepend",
            StoreVerb::Cas => "cas",
        }
    }
}

/// A single fetched value inside a `get`/`gets` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEntry {
    pub key: Vec<u8>,
    pub flags: u32,
    pub bytes: Vec<u8>,
    pub cas: Option<String>,
}

enum PendingKind {
    Store(StoreVerb),
    Arith,
    Delete,
    Flush,
    Version,
    Get { collected: Vec<GetEntry> },
}

struct PendingRequest {
    kind: PendingKind,
    slot: Option<SlotId>,
}

/// Transport- or protocol-level failure attached to a single command result. Distinct from
/// [`crate::error::ErrorKind`], which is the client-facing error type the dispatcher and
/// façade build from this plus timeout/connect failures.
#[derive(Debug, Clone)]
pub enum EngineError {
    Server(ServerError),
    Protocol(String),
    Io(String),
    /// The connector (C4) could not reach the server at all, including a shun reported by
    /// the failure manager (C3); never enqueued onto the wire. Carried as a formatted
    /// message rather than the original [`crate::error::ConnectError`] so this type can stay
    /// `Clone` (needed to fan the same failure out to every pending request at once).
    Connect(String),
    /// The connection broke for a reason already reported against another request in the
    /// same batch; this request never got a chance to be answered.
    Broken,
}

pub type CmdResult<T> = Result<T, EngineError>;

/// The parsed outcome of one pending command, still in its protocol shape (the façade/
/// dispatcher translate this into the public `Outcome<T>` per spec §7).
#[derive(Debug)]
pub enum CommandResult {
    Store(CmdResult<bool>),
    Arith(CmdResult<Option<u64>>),
    Delete(CmdResult<bool>),
    Flush(CmdResult<()>),
    Version(CmdResult<String>),
    Get(CmdResult<Vec<GetEntry>>),
}

/// Per-server connection state: socket, framing buffers, and the pipelined pending queue
/// (spec §3 Engine).
pub struct Engine {
    server_index: usize,
    address: ServerAddress,
    socket: Option<Socket>,
    outbox: Buffer,
    inbox: Buffer,
    pending: VecDeque<PendingRequest>,
    nowait_count: usize,
    state: EngineState,
    close_on_error: bool,
}

impl Engine {
    pub fn new(server_index: usize, address: ServerAddress, close_on_error: bool) -> Engine {
        Engine {
            server_index,
            address,
            socket: None,
            outbox: Buffer::new(),
            inbox: Buffer::new(),
            pending: VecDeque::new(),
            nowait_count: 0,
            state: EngineState::Disconnected,
            close_on_error,
        }
    }

    pub fn server_index(&self) -> usize {
        self.server_index
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn nowait_count(&self) -> usize {
        self.nowait_count
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_outbound_data(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    /// Move the engine to `Open` with a freshly connected socket.
    pub fn open(&mut self, socket: Socket) {
        self.socket = Some(socket);
        self.state = EngineState::Open;
        tracing::debug!(server = %self.address, "engine open");
    }

    pub fn set_connecting(&mut self) {
        self.state = EngineState::Connecting;
    }

    /// Allow a reconnect attempt after a prior break.
    pub fn reset_for_reconnect(&mut self) {
        self.state = EngineState::Disconnected;
    }

    /// Force the engine to `Broken`, drop its socket, and fail every pending request with
    /// `reason` (spec §3: "any pending replies that had not arrived are reported as errors").
    pub fn mark_broken(&mut self, reason: EngineError) -> Vec<(Option<SlotId>, CommandResult)> {
        tracing::debug!(server = %self.address, ?reason, "engine broken");
        self.state = EngineState::Broken;
        self.socket = None;
        self.fail_all_pending(reason)
    }

    fn push_pending(&mut self, kind: PendingKind, slot: Option<SlotId>) {
        if slot.is_none() {
            self.nowait_count += 1;
        }
        self.pending.push_back(PendingRequest { kind, slot });
    }

    pub fn enqueue_store(
        &mut self,
        verb: StoreVerb,
        key: &[u8],
        flags: u32,
        exptime: u32,
        bytes: &[u8],
        cas_token: Option<&str>,
        slot: Option<SlotId>,
    ) {
        encode_store(&mut self.outbox, verb, key, flags, exptime, bytes, cas_token);
        self.push_pending(PendingKind::Store(verb), slot);
    }

    pub fn enqueue_arith(&mut self, incr: bool, key: &[u8], delta: u64, slot: Option<SlotId>) {
        encode_arith(&mut self.outbox, incr, key, delta);
        self.push_pending(PendingKind::Arith, slot);
    }

    pub fn enqueue_delete(&mut self, key: &[u8], slot: Option<SlotId>) {
        encode_delete(&mut self.outbox, key);
        self.push_pending(PendingKind::Delete, slot);
    }

    pub fn enqueue_get(&mut self, keys: &[Vec<u8>], with_cas: bool, slot: Option<SlotId>) {
        encode_get(&mut self.outbox, keys, with_cas);
        self.push_pending(PendingKind::Get { collected: Vec::new() }, slot);
    }

    pub fn enqueue_flush(&mut self, delay: u32, slot: Option<SlotId>) {
        encode_flush(&mut self.outbox, delay);
        self.push_pending(PendingKind::Flush, slot);
    }

    pub fn enqueue_version(&mut self, slot: Option<SlotId>) {
        encode_version(&mut self.outbox);
        self.push_pending(PendingKind::Version, slot);
    }

    /// Write as much of `outbox` to the socket as possible without blocking.
    pub fn flush_outbox(&mut self) -> io::Result<usize> {
        match &mut self.socket {
            Some(socket) => self.outbox.egress(socket),
            None => Ok(0),
        }
    }

    /// Read as much as is available from the socket into `inbox` without blocking.
    pub fn fill_inbox(&mut self) -> io::Result<usize> {
        match &mut self.socket {
            Some(socket) => self.inbox.ingress(socket),
            None => Ok(0),
        }
    }

    /// Parse and deliver every complete reply currently buffered in `inbox`, in FIFO order.
    /// Nowait entries (`slot == None`) are parsed structurally and discarded, exactly like
    /// any other entry — alignment falls out of always draining the queue in order rather
    /// than needing a special "skip nowait" step (spec §4.6 Nowait mode).
    pub fn poll_replies(&mut self) -> Vec<(Option<SlotId>, CommandResult)> {
        let mut out = Vec::new();

        while !self.pending.is_empty() {
            let is_get = matches!(self.pending.front().unwrap().kind, PendingKind::Get { .. });

            let step = if is_get { self.try_parse_get() } else { self.try_parse_simple() };

            match step {
                ParseStep::NeedMore => break,
                ParseStep::Delivered(slot, result, close_now) => {
                    out.push((slot, result));
                    if close_now {
                        self.state = EngineState::Broken;
                        self.socket = None;
                        out.extend(self.fail_all_pending(EngineError::Broken));
                        break;
                    }
                }
                ParseStep::Fatal(err) => {
                    self.state = EngineState::Broken;
                    self.socket = None;
                    out.extend(self.fail_all_pending(err));
                    break;
                }
            }
        }

        out
    }

    fn try_parse_simple(&mut self) -> ParseStep {
        let pos = match self.inbox.find(b"\r\n", self.inbox.len()) {
            Some(p) => p,
            None => return ParseStep::NeedMore,
        };
        let line = self.inbox.peek(pos).into_owned();

        let token = match classify_line(&line) {
            Some(t) => t,
            None => {
                self.inbox.consume(pos + 2);
                return ParseStep::Fatal(EngineError::Protocol(format!(
                    "unrecognized reply: {:?}",
                    String::from_utf8_lossy(&line)
                )));
            }
        };

        self.inbox.consume(pos + 2);

        let entry = self.pending.pop_front().unwrap();
        if entry.slot.is_none() {
            self.nowait_count -= 1;
        }

        match resolve_simple(&entry.kind, token) {
            Some((result, is_server_error)) => {
                ParseStep::Delivered(entry.slot, result, is_server_error && self.close_on_error)
            }
            None => ParseStep::Fatal(EngineError::Protocol("reply did not match pending command".into())),
        }
    }

    fn try_parse_get(&mut self) -> ParseStep {
        loop {
            let pos = match self.inbox.find(b"\r\n", self.inbox.len()) {
                Some(p) => p,
                None => return ParseStep::NeedMore,
            };
            let line = self.inbox.peek(pos).into_owned();

            let token = match classify_line(&line) {
                Some(t) => t,
                None => {
                    self.inbox.consume(pos + 2);
                    return ParseStep::Fatal(EngineError::Protocol(format!(
                        "unrecognized reply in get stream: {:?}",
                        String::from_utf8_lossy(&line)
                    )));
                }
            };

            if let Some(err) = server_error_from_token(&token) {
                self.inbox.consume(pos + 2);
                let entry = self.pending.pop_front().unwrap();
                if entry.slot.is_none() {
                    self.nowait_count -= 1;
                }
                let close_now = self.close_on_error;
                return ParseStep::Delivered(entry.slot, CommandResult::Get(Err(EngineError::Server(err))), close_now);
            }

            match token {
                Token::End => {
                    self.inbox.consume(pos + 2);
                    let mut entry = self.pending.pop_front().unwrap();
                    if entry.slot.is_none() {
                        self.nowait_count -= 1;
                    }
                    let values = match &mut entry.kind {
                        PendingKind::Get { collected } => std::mem::take(collected),
                        _ => unreachable!("get parser only runs against a Get pending entry"),
                    };
                    return ParseStep::Delivered(entry.slot, CommandResult::Get(Ok(values)), false);
                }
                Token::ValueHeader { key, flags, bytes, cas } => {
                    let header_len = pos + 2;
                    let needed = header_len + bytes + 2;
                    if self.inbox.len() < needed {
                        // Nothing consumed yet; re-parse this same header next time around.
                        return ParseStep::NeedMore;
                    }

                    self.inbox.consume(header_len);
                    let payload = self.inbox.take(bytes);
                    if *self.inbox.peek(2) != *b"\r\n" {
                        return ParseStep::Fatal(EngineError::Protocol("missing CRLF after value payload".into()));
                    }
                    self.inbox.consume(2);

                    let front = self.pending.front_mut().unwrap();
                    match &mut front.kind {
                        PendingKind::Get { collected } => {
                            collected.push(GetEntry { key, flags, bytes: payload, cas });
                        }
                        _ => unreachable!(),
                    }
                    // Loop again: another VALUE or the terminating END may already be buffered.
                }
                _ => {
                    self.inbox.consume(pos + 2);
                    return ParseStep::Fatal(EngineError::Protocol(format!(
                        "unexpected reply in get stream: {:?}",
                        String::from_utf8_lossy(&line)
                    )));
                }
            }
        }
    }

    fn fail_all_pending(&mut self, err: EngineError) -> Vec<(Option<SlotId>, CommandResult)> {
        let mut out = Vec::new();
        while let Some(entry) = self.pending.pop_front() {
            if entry.slot.is_none() {
                self.nowait_count -= 1;
            }
            out.push((entry.slot, wrap_kind_error(&entry.kind, err.clone())));
        }
        out
    }
}

enum ParseStep {
    NeedMore,
    Delivered(Option<SlotId>, CommandResult, bool),
    Fatal(EngineError),
}

enum Token {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Ok,
    Number(u64),
    VersionTok(String),
    ValueHeader { key: Vec<u8>, flags: u32, bytes: usize, cas: Option<String> },
    End,
    ClientError(String),
    ServerErrorTok(String),
    GenericError,
}

fn classify_line(line: &[u8]) -> Option<Token> {
    let s = std::str::from_utf8(line).ok()?;
    if let Some(rest) = s.strip_prefix("VERSION ") {
        return Some(Token::VersionTok(rest.to_owned()));
    }
    if let Some(rest) = s.strip_prefix("CLIENT_ERROR ") {
        return Some(Token::ClientError(rest.to_owned()));
    }
    if let Some(rest) = s.strip_prefix("SERVER_ERROR ") {
        return Some(Token::ServerErrorTok(rest.to_owned()));
    }
    if let Some(rest) = s.strip_prefix("VALUE ") {
        return parse_value_header(rest);
    }
    match s {
        "STORED" => Some(Token::Stored),
        "NOT_STORED" => Some(Token::NotStored),
        "EXISTS" => Some(Token::Exists),
        "NOT_FOUND" => Some(Token::NotFound),
        "DELETED" => Some(Token::Deleted),
        "OK" => Some(Token::Ok),
        "END" => Some(Token::End),
        "ERROR" => Some(Token::GenericError),
        _ => s.parse::<u64>().ok().map(Token::Number),
    }
}

fn parse_value_header(rest: &str) -> Option<Token> {
    let mut fields = rest.split(' ');
    let key = fields.next()?.as_bytes().to_vec();
    let flags: u32 = fields.next()?.parse().ok()?;
    let bytes: usize = fields.next()?.parse().ok()?;
    let cas = fields.next().map(str::to_owned);
    Some(Token::ValueHeader { key, flags, bytes, cas })
}

fn server_error_from_token(token: &Token) -> Option<ServerError> {
    match token {
        Token::GenericError => Some(ServerError::Error),
        Token::ClientError(s) => Some(ServerError::ClientError(s.clone())),
        Token::ServerErrorTok(s) => Some(ServerError::ServerError(s.clone())),
        _ => None,
    }
}

fn resolve_simple(kind: &PendingKind, token: Token) -> Option<(CommandResult, bool)> {
    if let Some(err) = server_error_from_token(&token) {
        return Some((wrap_kind_error(kind, EngineError::Server(err)), true));
    }

    match kind {
        PendingKind::Store(_) => match token {
            Token::Stored => Some((CommandResult::Store(Ok(true)), false)),
            Token::NotStored | Token::Exists | Token::NotFound => Some((CommandResult::Store(Ok(false)), false)),
            _ => None,
        },
        PendingKind::Arith => match token {
            Token::Number(n) => Some((CommandResult::Arith(Ok(Some(n))), false)),
            Token::NotFound => Some((CommandResult::Arith(Ok(None)), false)),
            _ => None,
        },
        PendingKind::Delete => match token {
            Token::Deleted => Some((CommandResult::Delete(Ok(true)), false)),
            Token::NotFound => Some((CommandResult::Delete(Ok(false)), false)),
            _ => None,
        },
        PendingKind::Flush => match token {
            Token::Ok => Some((CommandResult::Flush(Ok(())), false)),
            _ => None,
        },
        PendingKind::Version => match token {
            Token::VersionTok(v) => Some((CommandResult::Version(Ok(v)), false)),
            _ => None,
        },
        PendingKind::Get { .. } => None,
    }
}

fn wrap_kind_error(kind: &PendingKind, err: EngineError) -> CommandResult {
    match kind {
        PendingKind::Store(_) => CommandResult::Store(Err(err)),
        PendingKind::Arith => CommandResult::Arith(Err(err)),
        PendingKind::Delete => CommandResult::Delete(Err(err)),
        PendingKind::Flush => CommandResult::Flush(Err(err)),
        PendingKind::Version => CommandResult::Version(Err(err)),
        PendingKind::Get { .. } => CommandResult::Get(Err(err)),
    }
}

fn encode_store(
    buf: &mut Buffer,
    verb: StoreVerb,
    key: &[u8],
    flags: u32,
    exptime: u32,
    bytes: &[u8],
    cas_token: Option<&str>,
) {
    buf.push(verb.as_str().as_bytes());
    buf.push(b" ");
    buf.push(key);
    buf.push(format!(" {} {} {}", flags, exptime, bytes.len()).as_bytes());
    if let Some(cas) = cas_token {
        buf.push(b" ");
        buf.push(cas.as_bytes());
    }
    buf.push(b"\r\n");
    buf.push(bytes);
    buf.push(b"\r\n");
}

fn encode_arith(buf: &mut Buffer, incr: bool, key: &[u8], delta: u64) {
    buf.push(if incr { b"incr " } else { b"decr " });
    buf.push(key);
    buf.push(format!(" {}\r\n", delta).as_bytes());
}

fn encode_delete(buf: &mut Buffer, key: &[u8]) {
    buf.push(b"delete ");
    buf.push(key);
    buf.push(b"\r\n");
}

fn encode_get(buf: &mut Buffer, keys: &[Vec<u8>], with_cas: bool) {
    buf.push(if with_cas { b"gets" } else { b"get" });
    for key in keys {
        buf.push(b" ");
        buf.push(key);
    }
    buf.push(b"\r\n");
}

fn encode_flush(buf: &mut Buffer, delay: u32) {
    if delay == 0 {
        buf.push(b"flush_all\r\n");
    } else {
        buf.push(format!("flush_all {}\r\n", delay).as_bytes());
    }
}

fn encode_version(buf: &mut Buffer) {
    buf.push(b"version\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ServerAddress;

    fn engine() -> Engine {
        Engine::new(0, ServerAddress::Tcp { host: "h".into(), port: 1 }, true)
    }

    fn feed(engine: &mut Engine, bytes: &[u8]) {
        engine.inbox.push(bytes);
    }

    #[test]
    fn store_stored_roundtrip() {
        let mut e = engine();
        e.enqueue_store(StoreVerb::Set, b"k", 0, 0, b"v", None, Some(1));
        assert_eq!(e.outbox.len(), "set k 0 0 1\r\nv\r\n".len());

        feed(&mut e, b"STORED\r\n");
        let results = e.poll_replies();
        assert_eq!(results.len(), 1);
        match &results[0] {
            (Some(1), CommandResult::Store(Ok(true))) => {}
            other => panic!("unexpected: {:?}", other.1),
        }
    }

    #[test]
    fn cas_race_resolves_false_without_error() {
        let mut e = engine();
        e.enqueue_store(StoreVerb::Cas, b"k", 0, 0, b"c", Some("42"), Some(7));
        feed(&mut e, b"EXISTS\r\n");
        let results = e.poll_replies();
        match &results[0] {
            (Some(7), CommandResult::Store(Ok(false))) => {}
            other => panic!("unexpected: {:?}", other.1),
        }
        assert_eq!(e.state(), EngineState::Open); // negative reply never breaks the engine
    }

    #[test]
    fn get_multi_value_then_end() {
        let mut e = engine();
        e.enqueue_get(&[b"a".to_vec(), b"b".to_vec()], false, Some(3));
        feed(&mut e, b"VALUE a 0 1\r\nx\r\nVALUE b 5 2\r\nyz\r\nEND\r\n");

        let results = e.poll_replies();
        assert_eq!(results.len(), 1);
        match &results[0] {
            (Some(3), CommandResult::Get(Ok(values))) => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[0].key, b"a");
                assert_eq!(values[0].bytes, b"x");
                assert_eq!(values[1].flags, 5);
                assert_eq!(values[1].bytes, b"yz");
            }
            other => panic!("unexpected: {:?}", other.1),
        }
    }

    #[test]
    fn get_missing_key_is_absence_not_error() {
        let mut e = engine();
        e.enqueue_get(&[b"missing".to_vec()], false, Some(1));
        feed(&mut e, b"END\r\n");
        let results = e.poll_replies();
        match &results[0] {
            (Some(1), CommandResult::Get(Ok(values))) => assert!(values.is_empty()),
            other => panic!("unexpected: {:?}", other.1),
        }
        assert_eq!(e.state(), EngineState::Open);
    }

    #[test]
    fn get_partial_value_waits_for_full_payload() {
        let mut e = engine();
        e.enqueue_get(&[b"a".to_vec()], false, Some(1));
        feed(&mut e, b"VALUE a 0 5\r\nhel"); // payload not fully arrived
        assert!(e.poll_replies().is_empty());
        assert_eq!(e.pending_len(), 1);

        feed(&mut e, b"lo\r\nEND\r\n");
        let results = e.poll_replies();
        match &results[0] {
            (Some(1), CommandResult::Get(Ok(values))) => assert_eq!(values[0].bytes, b"hello"),
            other => panic!("unexpected: {:?}", other.1),
        }
    }

    #[test]
    fn nowait_replies_are_drained_before_later_non_nowait_reply() {
        let mut e = engine();
        for _ in 0..100 {
            e.enqueue_store(StoreVerb::Set, b"k", 0, 0, b"v", None, None);
        }
        e.enqueue_version(Some(999));
        assert_eq!(e.nowait_count(), 100);

        let mut wire = Vec::new();
        for _ in 0..100 {
            wire.extend_from_slice(b"STORED\r\n");
        }
        wire.extend_from_slice(b"VERSION 1.6.0\r\n");
        feed(&mut e, &wire);

        let results = e.poll_replies();
        assert_eq!(e.nowait_count(), 0);
        // Only the one slotted request surfaces a result; 100 nowait replies were parsed
        // and discarded to stay aligned.
        let slotted: Vec<_> = results.iter().filter(|(slot, _)| slot.is_some()).collect();
        assert_eq!(slotted.len(), 1);
        match slotted[0] {
            (Some(999), CommandResult::Version(Ok(v))) => assert_eq!(v, "1.6.0"),
            other => panic!("unexpected: {:?}", other.1),
        }
    }

    #[test]
    fn server_error_closes_connection_when_close_on_error() {
        let mut e = engine();
        e.enqueue_delete(b"k", Some(1));
        feed(&mut e, b"SERVER_ERROR out of memory\r\n");
        let results = e.poll_replies();
        assert_eq!(results.len(), 1);
        match &results[0] {
            (Some(1), CommandResult::Delete(Err(EngineError::Server(ServerError::ServerError(msg))))) => {
                assert_eq!(msg, "out of memory");
            }
            other => panic!("unexpected: {:?}", other.1),
        }
        assert_eq!(e.state(), EngineState::Broken);
    }

    #[test]
    fn server_error_kept_open_when_close_on_error_disabled() {
        let mut e = Engine::new(0, ServerAddress::Tcp { host: "h".into(), port: 1 }, false);
        e.enqueue_delete(b"k", Some(1));
        feed(&mut e, b"SERVER_ERROR oops\r\n");
        let results = e.poll_replies();
        assert_eq!(results.len(), 1);
        assert_eq!(e.state(), EngineState::Disconnected); // never opened, but not Broken either
    }

    #[test]
    fn unparseable_token_breaks_and_fails_remaining_pending() {
        let mut e = engine();
        e.enqueue_delete(b"a", Some(1));
        e.enqueue_delete(b"b", Some(2));
        feed(&mut e, b"GARBAGE\r\n");

        let results = e.poll_replies();
        assert_eq!(results.len(), 2);
        assert_eq!(e.state(), EngineState::Broken);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, CommandResult::Delete(Err(_)))));
    }

    #[test]
    fn mark_broken_fails_all_pending() {
        let mut e = engine();
        e.enqueue_delete(b"a", Some(1));
        e.enqueue_get(&[b"b".to_vec()], false, Some(2));
        let results = e.mark_broken(EngineError::Io("connection reset".into()));
        assert_eq!(results.len(), 2);
        assert_eq!(e.state(), EngineState::Broken);
        assert_eq!(e.pending_len(), 0);
    }

    #[test]
    fn encode_get_lists_all_keys() {
        let mut buf = Buffer::new();
        encode_get(&mut buf, &[b"a".to_vec(), b"b".to_vec()], true);
        assert_eq!(buf.take(buf.len()), b"gets a b\r\n");
    }

    #[test]
    fn encode_flush_all_with_delay() {
        let mut buf = Buffer::new();
        encode_flush(&mut buf, 5);
        assert_eq!(buf.take(buf.len()), b"flush_all 5\r\n");
    }
}
