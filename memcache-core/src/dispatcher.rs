//! Dispatcher (C7, spec §4.7). Drives I/O for every engine touched by one
//! batch behind a single deadline and assembles replies back into the
//! caller's slots, closing the poll-loop gap the teacher's own design notes
//! called for (`net/mod.rs`'s top-of-file commentary: "Use mio to poll
//! read/write on all connected streams... with a zero timeout") but never
//! implemented (`net::channel::Channel::read` is `unimplemented!()`).

use crate::protocol::{CommandResult, Engine, EngineError, EngineState};
use hashbrown::{HashMap, HashSet};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::os::unix::io::AsRawFd;
use std::time::Instant;

/// A caller-assigned slot a batch op expects to be filled, keyed the same way
/// [`Engine::enqueue_get`] and friends use `SlotId` (spec §3 PendingRequest `result_slot`).
pub type SlotId = usize;

/// What happened to one expected slot by the time the batch finished driving I/O.
#[derive(Debug)]
pub enum SlotOutcome {
    Delivered(CommandResult),
    Timeout,
}

/// Stateless I/O driver: everything it needs — the engines, which of them are engaged this
/// batch, and which slots are expected — is passed in per call. The façade (C8) owns the
/// engines and failure manager across calls; this only drives one batch to completion.
pub struct Dispatcher;

impl Dispatcher {
    /// Drive I/O for `engaged` engines (assumed already `Open`) until every slot in
    /// `expected` has a result or `deadline` passes (`None` = unbounded, per `io_timeout = 0`
    /// in spec §6). Returns one outcome per expected slot. On a socket error the owning
    /// engine is marked `Broken` and `on_io_error` is invoked once with its server index so
    /// the caller can feed the failure manager (spec §4.7 step 4).
    pub fn run(
        engines: &mut [Engine],
        engaged: &[usize],
        expected: &HashSet<SlotId>,
        deadline: Option<Instant>,
        mut on_io_error: impl FnMut(usize),
    ) -> HashMap<SlotId, SlotOutcome> {
        let mut results: HashMap<SlotId, SlotOutcome> = HashMap::with_capacity(expected.len());
        let mut readiness = match Readiness::new(engaged.len()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create mio poll, failing batch as broken");
                for &idx in engaged {
                    drain_broken(&mut engines[idx], EngineError::Io(e.to_string()), &mut results);
                }
                return fill_timeouts(results, expected);
            }
        };

        loop {
            if all_expected_answered(&results, expected) {
                break;
            }

            let (delivered, step) = poll_once(engines, engaged, &mut readiness, deadline, &mut on_io_error);
            for (slot, result) in delivered {
                if let Some(slot) = slot {
                    results.insert(slot, SlotOutcome::Delivered(result));
                }
            }
            if matches!(step, PollStep::Stop) {
                break;
            }
        }

        fill_timeouts(results, expected)
    }

    /// Drive I/O for `engaged` engines (assumed already `Open`) until none of them has
    /// outstanding nowait replies or unsent bytes, or `deadline` passes. Unlike [`Dispatcher::run`]
    /// this isn't waiting on any caller-visible slot — it exists purely to flush fire-and-forget
    /// writes and swallow their nowait replies before the engines are dropped or reused
    /// (spec §3 Lifecycle, §4.6 Nowait mode).
    pub fn drain(
        engines: &mut [Engine],
        engaged: &[usize],
        deadline: Option<Instant>,
        mut on_io_error: impl FnMut(usize),
    ) {
        let mut readiness = match Readiness::new(engaged.len()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create mio poll, abandoning nowait drain");
                for &idx in engaged {
                    let _ = engines[idx].mark_broken(EngineError::Io(e.to_string()));
                    on_io_error(idx);
                }
                return;
            }
        };

        loop {
            if engaged.iter().all(|&idx| engines[idx].nowait_count() == 0 && !engines[idx].has_outbound_data()) {
                break;
            }

            let (_, step) = poll_once(engines, engaged, &mut readiness, deadline, &mut on_io_error);
            if matches!(step, PollStep::Stop) {
                break;
            }
        }
    }
}

/// Owns the `mio::Poll` handle, its event buffer and the set of tokens currently registered,
/// so both [`Dispatcher::run`] and [`Dispatcher::drain`] can share [`poll_once`] without
/// re-creating a poller per iteration.
struct Readiness {
    poll: Poll,
    events: Events,
    registered: HashSet<usize>,
}

impl Readiness {
    fn new(capacity: usize) -> std::io::Result<Readiness> {
        Ok(Readiness { poll: Poll::new()?, events: Events::with_capacity(capacity.max(1)), registered: HashSet::new() })
    }
}

/// Whether the caller's loop should keep iterating or give up (no live engines left, or the
/// deadline elapsed).
enum PollStep {
    Continue,
    Stop,
}

/// One register/poll/process cycle shared by [`Dispatcher::run`] and [`Dispatcher::drain`].
/// Returns every reply delivered this cycle (slot is `None` for nowait requests) plus whether
/// the caller's loop should keep going. Factored out of `run` so neither entry point needs two
/// closures simultaneously borrowing the same result map.
fn poll_once(
    engines: &mut [Engine],
    engaged: &[usize],
    readiness: &mut Readiness,
    deadline: Option<Instant>,
    on_io_error: &mut impl FnMut(usize),
) -> (Vec<(Option<SlotId>, CommandResult)>, PollStep) {
    let mut delivered = Vec::new();

    let mut live_any = false;
    for &idx in engaged {
        let engine = &engines[idx];
        if engine.state() != EngineState::Open {
            readiness.registered.remove(&idx);
            continue;
        }
        live_any = true;

        let mut interest = Interest::READABLE;
        if engine.has_outbound_data() {
            interest = interest.add(Interest::WRITABLE);
        }

        let fd = engine.socket().unwrap().as_raw_fd();
        let outcome = if readiness.registered.contains(&idx) {
            readiness.poll.registry().reregister(&mut SourceFd(&fd), Token(idx), interest)
        } else {
            readiness.poll.registry().register(&mut SourceFd(&fd), Token(idx), interest)
        };

        match outcome {
            Ok(()) => {
                readiness.registered.insert(idx);
            }
            Err(e) => {
                tracing::warn!(server_index = idx, error = %e, "failed to register socket with poller");
                delivered.extend(engines[idx].mark_broken(EngineError::Io(e.to_string())));
                on_io_error(idx);
            }
        }
    }

    if !live_any {
        return (delivered, PollStep::Stop);
    }

    let timeout = match deadline {
        None => None,
        Some(dl) => {
            let now = Instant::now();
            if now >= dl {
                return (delivered, PollStep::Stop);
            }
            Some(dl - now)
        }
    };

    if let Err(e) = readiness.poll.poll(&mut readiness.events, timeout) {
        tracing::warn!(error = %e, "poll failed");
        return (delivered, PollStep::Stop);
    }

    if readiness.events.is_empty() {
        // Either the deadline elapsed (bounded wait) or nothing arrived during an unbounded
        // wait that mio still chose to return from spuriously; either way, re-checking the
        // deadline decides whether the caller's loop keeps going.
        if let Some(dl) = deadline {
            if Instant::now() >= dl {
                return (delivered, PollStep::Stop);
            }
        }
        return (delivered, PollStep::Continue);
    }

    for event in readiness.events.iter() {
        let idx = event.token().0;
        if idx >= engines.len() {
            continue;
        }

        if event.is_writable() {
            if let Err(e) = engines[idx].flush_outbox() {
                if !would_block(&e) {
                    tracing::debug!(server_index = idx, error = %e, "write failed, breaking engine");
                    delivered.extend(engines[idx].mark_broken(EngineError::Io(e.to_string())));
                    on_io_error(idx);
                    continue;
                }
            }
        }

        if event.is_readable() {
            match engines[idx].fill_inbox() {
                Ok(_) => {
                    delivered.extend(engines[idx].poll_replies());
                }
                Err(e) => {
                    if !would_block(&e) {
                        tracing::debug!(server_index = idx, error = %e, "read failed, breaking engine");
                        delivered.extend(engines[idx].mark_broken(EngineError::Io(e.to_string())));
                        on_io_error(idx);
                    }
                }
            }
        }
    }

    (delivered, PollStep::Continue)
}

fn would_block(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
}

fn all_expected_answered(results: &HashMap<SlotId, SlotOutcome>, expected: &HashSet<SlotId>) -> bool {
    expected.iter().all(|slot| results.contains_key(slot))
}

/// Mark `engine` broken, feed every failed pending entry that belongs to an expected slot
/// into `results` (spec §3: "any pending replies that had not arrived are reported as
/// errors for their owning requests").
fn drain_broken(engine: &mut Engine, reason: EngineError, results: &mut HashMap<SlotId, SlotOutcome>) {
    for (slot, result) in engine.mark_broken(reason) {
        if let Some(slot) = slot {
            results.insert(slot, SlotOutcome::Delivered(result));
        }
    }
}

fn fill_timeouts(mut results: HashMap<SlotId, SlotOutcome>, expected: &HashSet<SlotId>) -> HashMap<SlotId, SlotOutcome> {
    for &slot in expected {
        results.entry(slot).or_insert(SlotOutcome::Timeout);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ServerAddress;
    use crate::protocol::Engine;

    fn engine(idx: usize) -> Engine {
        Engine::new(idx, ServerAddress::Tcp { host: "h".into(), port: 1 }, true)
    }

    #[test]
    fn empty_expected_set_returns_immediately() {
        let mut engines = vec![engine(0)];
        let expected = HashSet::new();
        let results = Dispatcher::run(&mut engines, &[], &expected, None, |_| {});
        assert!(results.is_empty());
    }

    #[test]
    fn no_live_engines_times_out_expected_slots() {
        let mut engines = vec![engine(0)]; // never opened -> state Disconnected
        let mut expected = HashSet::new();
        expected.insert(1usize);
        let results = Dispatcher::run(&mut engines, &[0], &expected, None, |_| {});
        assert!(matches!(results.get(&1), Some(SlotOutcome::Timeout)));
    }

    #[test]
    fn already_broken_engine_is_skipped_without_panicking() {
        let mut e = engine(0);
        e.enqueue_delete(b"k", Some(5));
        e.mark_broken(EngineError::Io("reset".into()));
        let mut engines = vec![e];
        let mut expected = HashSet::new();
        expected.insert(5usize);
        let results = Dispatcher::run(&mut engines, &[0], &expected, None, |_| {});
        assert!(matches!(results.get(&5), Some(SlotOutcome::Timeout)));
    }

    #[test]
    fn drain_with_no_engaged_engines_returns_immediately() {
        let mut engines = vec![engine(0)];
        Dispatcher::drain(&mut engines, &[], None, |_| {});
    }

    #[test]
    fn drain_stops_once_broken_engine_has_no_nowait_work_left() {
        let mut e = engine(0);
        e.mark_broken(EngineError::Io("reset".into()));
        let mut engines = vec![e];
        // Already broken -> not Open -> poll_once reports no live engines -> Stop immediately.
        Dispatcher::drain(&mut engines, &[0], None, |_| {});
    }
}
