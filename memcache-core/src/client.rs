//! Client façade (C8, spec §4.8). Owns the selector, failure manager and
//! engine pool; validates configuration; prefixes `namespace`; shapes
//! results as scalar / list / map per the Design Notes' re-architecting of
//! "dynamic return shape" into three distinct methods instead of one that
//! inspects caller context (spec §9).

use crate::address::{self, ServerAddress};
use crate::codec::{AlgoRegistry, JsonCodec};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, SlotId, SlotOutcome};
use crate::error::{ConfigError, ConnectError, ErrorKind, Outcome};
use crate::failure::FailureManager;
use crate::protocol::{CommandResult, Engine, EngineError, EngineState, GetEntry, StoreVerb};
use crate::transform::{self, CompressPolicy, FetchedValue, StoreInput};
use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};

/// The minimum server version that supports `cas` / `gets` / `append` / `prepend` (spec §6
/// Wire protocol). Servers whose learned version is older have those commands elided client
/// side rather than sent and rejected.
const CAS_MIN_VERSION: (u32, u32, u32) = (1, 2, 4);

/// The façade. Not `Sync`/`Send`-required to be shared across threads — spec §5 models it as
/// a single-flow, cooperative engine owned by one caller thread for the duration of a call.
pub struct Client {
    addresses: Vec<ServerAddress>,
    selector: crate::selector::Selector,
    engines: Vec<Engine>,
    failure_mgr: FailureManager,
    algo_registry: AlgoRegistry,
    codec: JsonCodec,
    versions: Vec<Option<String>>,

    connect_timeout: Duration,
    io_timeout: Duration,
    compress_threshold: i64,
    compress_ratio: f64,
    compress_algo: String,
    namespace: String,
    nowait: bool,
    utf8: bool,
}

enum Op {
    Store { verb: StoreVerb, key: Vec<u8>, flags: u32, exptime: u32, bytes: Vec<u8>, cas: Option<String> },
    Arith { incr: bool, key: Vec<u8>, delta: u64 },
    Delete { key: Vec<u8> },
    Get { keys: Vec<Vec<u8>>, with_cas: bool },
    Flush { delay: u32 },
    Version,
}

impl Op {
    fn enqueue(self, engine: &mut Engine, slot: SlotId) {
        match self {
            Op::Store { verb, key, flags, exptime, bytes, cas } => {
                engine.enqueue_store(verb, &key, flags, exptime, &bytes, cas.as_deref(), Some(slot));
            }
            Op::Arith { incr, key, delta } => engine.enqueue_arith(incr, &key, delta, Some(slot)),
            Op::Delete { key } => engine.enqueue_delete(&key, Some(slot)),
            Op::Get { keys, with_cas } => engine.enqueue_get(&keys, with_cas, Some(slot)),
            Op::Flush { delay } => engine.enqueue_flush(delay, Some(slot)),
            Op::Version => engine.enqueue_version(Some(slot)),
        }
    }

    fn connect_error(&self, reason: &str) -> CommandResult {
        let err = EngineError::Connect(reason.to_owned());
        match self {
            Op::Store { .. } => CommandResult::Store(Err(err)),
            Op::Arith { .. } => CommandResult::Arith(Err(err)),
            Op::Delete { .. } => CommandResult::Delete(Err(err)),
            Op::Get { .. } => CommandResult::Get(Err(err)),
            Op::Flush { .. } => CommandResult::Flush(Err(err)),
            Op::Version => CommandResult::Version(Err(err)),
        }
    }
}

impl Client {
    /// Validate `config` and build a façade with one (as yet unconnected) engine per
    /// configured server. Engines connect lazily on first use (spec §3 Lifecycle).
    pub fn new(config: Config) -> Result<Client, ConfigError> {
        let resolved = config.resolve()?;
        let engines = resolved
            .addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| Engine::new(i, addr.clone(), resolved.close_on_error))
            .collect();
        let count = resolved.addresses.len();

        Ok(Client {
            addresses: resolved.addresses,
            selector: resolved.selector,
            engines,
            failure_mgr: FailureManager::new(resolved.max_failures, resolved.failure_timeout),
            algo_registry: AlgoRegistry::with_builtins(),
            codec: JsonCodec,
            versions: vec![None; count],
            connect_timeout: resolved.connect_timeout,
            io_timeout: resolved.io_timeout,
            compress_threshold: resolved.compress_threshold,
            compress_ratio: resolved.compress_ratio,
            compress_algo: resolved.compress_algo,
            namespace: resolved.namespace,
            nowait: resolved.nowait,
            utf8: resolved.utf8,
        })
    }

    fn namespaced(&self, key: &str) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.namespace.len() + key.len());
        v.extend_from_slice(self.namespace.as_bytes());
        v.extend_from_slice(key.as_bytes());
        v
    }

    fn server_for(&self, key: &str) -> usize {
        self.selector.select(key.as_bytes())
    }

    fn canonical(&self, server_index: usize) -> String {
        self.addresses[server_index].canonical()
    }

    /// Attempt to bring `server_index`'s engine to `Open`, consulting the failure manager
    /// first (spec §4.3: the selector never changes but the connector gates on a shun).
    fn ensure_connected(&mut self, server_index: usize) -> Result<(), String> {
        if self.engines[server_index].state() == EngineState::Open {
            return Ok(());
        }

        let now = Instant::now();
        if self.failure_mgr.is_shunned(server_index, now) {
            return Err(ConnectError::Shunned.to_string());
        }

        self.engines[server_index].set_connecting();
        match address::connect(self.engines[server_index].address(), self.connect_timeout) {
            Ok(socket) => {
                self.engines[server_index].open(socket);
                self.failure_mgr.record_success(server_index);
                Ok(())
            }
            Err(e) => {
                self.failure_mgr.record_failure(server_index, now);
                self.engines[server_index].reset_for_reconnect();
                Err(e.to_string())
            }
        }
    }

    /// Route, connect, enqueue and drive I/O for one batch. Returns one [`SlotOutcome`] per
    /// item, in the same order as `items` (spec §4.7 Result assembly operates on top of
    /// this, since this already preserves caller order via `SlotId = index into items`).
    fn run_batch(&mut self, items: Vec<(usize, Op)>) -> Vec<SlotOutcome> {
        let mut engaged: hashbrown::HashSet<usize> = hashbrown::HashSet::new();
        let mut expected: hashbrown::HashSet<SlotId> = hashbrown::HashSet::new();
        let mut immediate: HashMap<SlotId, SlotOutcome> = HashMap::new();

        for (slot, (server_index, op)) in items.into_iter().enumerate() {
            match self.ensure_connected(server_index) {
                Ok(()) => {
                    engaged.insert(server_index);
                    expected.insert(slot);
                    op.enqueue(&mut self.engines[server_index], slot);
                }
                Err(reason) => {
                    immediate.insert(slot, SlotOutcome::Delivered(op.connect_error(&reason)));
                }
            }
        }

        let total_slots = expected.len() + immediate.len();
        let deadline = if self.io_timeout.is_zero() { None } else { Some(Instant::now() + self.io_timeout) };
        let engaged: Vec<usize> = engaged.into_iter().collect();

        let engines = &mut self.engines;
        let failure_mgr = &mut self.failure_mgr;
        let driven = Dispatcher::run(engines, &engaged, &expected, deadline, |idx| {
            failure_mgr.record_failure(idx, Instant::now());
        });

        immediate.extend(driven);
        (0..total_slots).map(|slot| immediate.remove(&slot).unwrap_or(SlotOutcome::Timeout)).collect()
    }

    fn compress_algo(&self) -> Option<&(dyn crate::codec::CompressAlgo + Send + Sync)> {
        if self.compress_algo.is_empty() {
            None
        } else {
            self.algo_registry.get(&self.compress_algo)
        }
    }

    fn compress_policy(&self) -> CompressPolicy {
        CompressPolicy { threshold: self.compress_threshold, ratio: self.compress_ratio }
    }

    // ---- store-family --------------------------------------------------

    fn store_one<T: Serialize + DeserializeOwned>(
        &mut self,
        verb: StoreVerb,
        key: &str,
        value: StoreInput<'_, T>,
        exptime: u32,
        cas_token: Option<&str>,
    ) -> Outcome<bool> {
        let (bytes, flags) = match transform::encode_store(value, &self.codec, self.utf8, self.compress_policy(), self.compress_algo()) {
            Ok(v) => v,
            Err(e) => return Outcome::Err(ErrorKind::Transform(e)),
        };

        let server_index = self.server_for(key);
        let op = Op::Store {
            verb,
            key: self.namespaced(key),
            flags,
            exptime,
            bytes,
            cas: cas_token.map(str::to_owned),
        };
        let mut results = self.run_batch(vec![(server_index, op)]);
        store_outcome(results.remove(0))
    }

    pub fn set(&mut self, key: &str, bytes: &[u8], exptime: u32) -> Outcome<bool> {
        self.store_one::<()>(StoreVerb::Set, key, StoreInput::Bytes(bytes), exptime, None)
    }

    pub fn add(&mut self, key: &str, bytes: &[u8], exptime: u32) -> Outcome<bool> {
        self.store_one::<()>(StoreVerb::Add, key, StoreInput::Bytes(bytes), exptime, None)
    }

    pub fn replace(&mut self, key: &str, bytes: &[u8], exptime: u32) -> Outcome<bool> {
        self.store_one::<()>(StoreVerb::Replace, key, StoreInput::Bytes(bytes), exptime, None)
    }

    pub fn append(&mut self, key: &str, bytes: &[u8]) -> Outcome<bool> {
        if !self.server_supports_cas_family(self.server_for(key)) {
            return Outcome::Err(ErrorKind::Protocol("server predates append (requires >= 1.2.4)".into()));
        }
        self.store_one::<()>(StoreVerb::Append, key, StoreInput::Bytes(bytes), 0, None)
    }

    pub fn prepend(&mut self, key: &str, bytes: &[u8]) -> Outcome<bool> {
        if !self.server_supports_cas_family(self.server_for(key)) {
            return Outcome::Err(ErrorKind::Protocol("server predates prepend (requires >= 1.2.4)".into()));
        }
        self.store_one::<()>(StoreVerb::Prepend, key, StoreInput::Bytes(bytes), 0, None)
    }

    /// `cas` is elided client-side when the server's learned version predates 1.2.4 (spec §9
    /// Open Questions, decided in DESIGN.md): the command is never sent and the caller sees a
    /// `Protocol` error rather than a wire round-trip the server would reject.
    pub fn cas(&mut self, key: &str, cas_token: &str, bytes: &[u8], exptime: u32) -> Outcome<bool> {
        if !self.server_supports_cas_family(self.server_for(key)) {
            return Outcome::Err(ErrorKind::Protocol("server predates cas (requires >= 1.2.4)".into()));
        }
        self.store_one::<()>(StoreVerb::Cas, key, StoreInput::Bytes(bytes), exptime, Some(cas_token))
    }

    pub fn set_struct<T: Serialize + DeserializeOwned>(&mut self, key: &str, value: &T, exptime: u32) -> Outcome<bool> {
        self.store_one(StoreVerb::Set, key, StoreInput::Structured(value), exptime, None)
    }

    pub fn set_text(&mut self, key: &str, text: &str, exptime: u32) -> Outcome<bool> {
        self.store_one::<()>(StoreVerb::Set, key, StoreInput::Text(text), exptime, None)
    }

    // ---- arithmetic / delete / flush / version -------------------------

    pub fn incr(&mut self, key: &str, delta: u64) -> Outcome<u64> {
        self.arith_one(true, key, delta)
    }

    pub fn decr(&mut self, key: &str, delta: u64) -> Outcome<u64> {
        self.arith_one(false, key, delta)
    }

    fn arith_one(&mut self, incr: bool, key: &str, delta: u64) -> Outcome<u64> {
        let server_index = self.server_for(key);
        let op = Op::Arith { incr, key: self.namespaced(key), delta };
        let mut results = self.run_batch(vec![(server_index, op)]);
        match results.remove(0) {
            SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
            SlotOutcome::Delivered(CommandResult::Arith(Ok(Some(n)))) => Outcome::Ok(n),
            // server semantics: decr below zero clamps to "0", a distinguishable zero rather
            // than a miss (spec §8 boundary behaviors; §9 Open Questions, decided as-is).
            SlotOutcome::Delivered(CommandResult::Arith(Ok(None))) => Outcome::Miss,
            SlotOutcome::Delivered(CommandResult::Arith(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
            _ => unreachable!("arith slot always carries an Arith result"),
        }
    }

    pub fn delete(&mut self, key: &str) -> Outcome<bool> {
        let server_index = self.server_for(key);
        let op = Op::Delete { key: self.namespaced(key) };
        let mut results = self.run_batch(vec![(server_index, op)]);
        match results.remove(0) {
            SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
            SlotOutcome::Delivered(CommandResult::Delete(Ok(b))) => Outcome::Ok(b),
            SlotOutcome::Delivered(CommandResult::Delete(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
            _ => unreachable!("delete slot always carries a Delete result"),
        }
    }

    /// `flush_all(delay)` distributes a staggered delay across currently-connected servers
    /// (spec §4.6): server `i` of `N` (insertion order among the connected set) gets
    /// `delay * (N-1-i) / (N-1)`, rounded toward zero; with one connected server it gets
    /// `delay` unchanged. A server with no engine open yet falls back to counting against
    /// all configured servers, since there's no connected set to stagger over (spec §9:
    /// "connected" degrades to "configured" before any server has ever been reached).
    pub fn flush_all(&mut self, delay: u32) -> HashMap<String, Outcome<()>> {
        let total = self.addresses.len();
        let connected: Vec<usize> = (0..total).filter(|&i| self.engines[i].state() == EngineState::Open).collect();
        let order: Vec<usize> = if connected.is_empty() { (0..total).collect() } else { connected };
        let n = order.len();

        let items: Vec<(usize, Op)> = order
            .iter()
            .enumerate()
            .map(|(i, &server_index)| {
                let server_delay = if n <= 1 {
                    delay
                } else {
                    (delay as u64 * (n - 1 - i) as u64 / (n - 1) as u64) as u32
                };
                (server_index, Op::Flush { delay: server_delay })
            })
            .collect();

        let names: Vec<String> = order.iter().map(|&i| self.canonical(i)).collect();
        let results = self.run_batch(items);

        names
            .into_iter()
            .zip(results)
            .map(|(name, outcome)| {
                let value = match outcome {
                    SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
                    SlotOutcome::Delivered(CommandResult::Flush(Ok(()))) => Outcome::Ok(()),
                    SlotOutcome::Delivered(CommandResult::Flush(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
                    _ => unreachable!("flush slot always carries a Flush result"),
                };
                (name, value)
            })
            .collect()
    }

    /// Query every configured server's version and cache it for `cas`-family gating.
    pub fn version(&mut self) -> HashMap<String, Outcome<String>> {
        let n = self.addresses.len();
        let items: Vec<(usize, Op)> = (0..n).map(|i| (i, Op::Version)).collect();
        let names: Vec<String> = (0..n).map(|i| self.canonical(i)).collect();
        let results = self.run_batch(items);

        let mut out = HashMap::with_capacity(n);
        for (i, (name, outcome)) in names.into_iter().zip(results).enumerate() {
            let value = match outcome {
                SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
                SlotOutcome::Delivered(CommandResult::Version(Ok(v))) => {
                    self.versions[i] = Some(v.clone());
                    Outcome::Ok(v)
                }
                SlotOutcome::Delivered(CommandResult::Version(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
                _ => unreachable!("version slot always carries a Version result"),
            };
            out.insert(name, value);
        }
        out
    }

    /// A server with no learned version is assumed capable (spec §9 Open Questions: the
    /// source treats version-gating as best-effort, not a hard precondition); once
    /// [`Client::version`] has run, a confirmed pre-1.2.4 version disables the cas family.
    fn server_supports_cas_family(&self, server_index: usize) -> bool {
        match &self.versions[server_index] {
            None => true,
            Some(v) => parse_version(v).map(|parsed| parsed >= CAS_MIN_VERSION).unwrap_or(true),
        }
    }

    // ---- retrieval ------------------------------------------------------

    /// Scalar `get`, transform-decoded with `T` as the structured-value shape.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Outcome<FetchedValue<T>> {
        let mut map = self.get_multi_map::<T>(&[key]);
        map.remove(key).unwrap_or(Outcome::Miss)
    }

    /// List-shaped multi-get: one slot per input key, in input order (spec §9 "dynamic
    /// return shape" split into `op_many`).
    pub fn get_multi<T: DeserializeOwned>(&mut self, keys: &[&str]) -> Vec<Outcome<FetchedValue<T>>> {
        let (raw, server_of) = self.fetch_raw(keys);
        keys.iter()
            .map(|k| self.decode_one(&raw, &server_of, k))
            .collect()
    }

    /// Map-shaped multi-get keyed by original user key (spec §9 "dynamic return shape" split
    /// into `op_many_by_key`). A duplicate key in `keys` has the later occurrence win, per
    /// spec §4.7 Result assembly.
    pub fn get_multi_map<T: DeserializeOwned>(&mut self, keys: &[&str]) -> HashMap<String, Outcome<FetchedValue<T>>> {
        let (raw, server_of) = self.fetch_raw(keys);
        let mut out = HashMap::with_capacity(keys.len());
        for k in keys {
            out.insert((*k).to_owned(), self.decode_one(&raw, &server_of, k));
        }
        out
    }

    /// `gets`: like `get` but also returns the opaque CAS token, shipped back verbatim (spec
    /// §9 Open Questions, decided in DESIGN.md: never parsed, just echoed on `cas()`).
    pub fn gets<T: DeserializeOwned>(&mut self, key: &str) -> Outcome<(String, FetchedValue<T>)> {
        let server_index = self.server_for(key);
        let namespaced = self.namespaced(key);
        let op = Op::Get { keys: vec![namespaced.clone()], with_cas: true };
        let mut results = self.run_batch(vec![(server_index, op)]);

        match results.remove(0) {
            SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
            SlotOutcome::Delivered(CommandResult::Get(Ok(entries))) => {
                match entries.into_iter().find(|e| e.key == namespaced) {
                    None => Outcome::Miss,
                    Some(entry) => {
                        let cas = match entry.cas {
                            Some(c) => c,
                            None => return Outcome::Err(ErrorKind::Protocol("gets reply missing cas token".into())),
                        };
                        match transform::decode_fetch::<T>(entry.bytes, entry.flags, &self.codec, self.compress_algo()) {
                            Ok(value) => Outcome::Ok((cas, value)),
                            Err(e) => Outcome::Err(ErrorKind::Transform(e)),
                        }
                    }
                }
            }
            SlotOutcome::Delivered(CommandResult::Get(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
            _ => unreachable!("get slot always carries a Get result"),
        }
    }

    /// Issue one `get` per distinct server touched by `keys`, drive the batch, and return
    /// the raw per-server results plus which server owns each key — shared plumbing for
    /// `get`/`get_multi`/`get_multi_map` (spec §4.6 "Multi-key get").
    fn fetch_raw(&mut self, keys: &[&str]) -> (HashMap<usize, SlotOutcome>, HashMap<String, usize>) {
        let mut by_server: HashMap<usize, Vec<Vec<u8>>> = HashMap::new();
        let mut server_of: HashMap<String, usize> = HashMap::new();

        for k in keys {
            let server_index = self.server_for(k);
            server_of.insert((*k).to_owned(), server_index);
            by_server.entry(server_index).or_insert_with(Vec::new).push(self.namespaced(k));
        }

        let mut server_indices: Vec<usize> = by_server.keys().copied().collect();
        server_indices.sort_unstable();

        let items: Vec<(usize, Op)> = server_indices
            .iter()
            .map(|&idx| (idx, Op::Get { keys: by_server.remove(&idx).unwrap(), with_cas: false }))
            .collect();

        let results = self.run_batch(items);
        let raw: HashMap<usize, SlotOutcome> = server_indices.into_iter().zip(results).collect();
        (raw, server_of)
    }

    fn decode_one<T: DeserializeOwned>(
        &self,
        raw: &HashMap<usize, SlotOutcome>,
        server_of: &HashMap<String, usize>,
        key: &str,
    ) -> Outcome<FetchedValue<T>> {
        let server_index = match server_of.get(key) {
            Some(&i) => i,
            None => return Outcome::Miss,
        };
        let namespaced = self.namespaced(key);

        match raw.get(&server_index) {
            None | Some(SlotOutcome::Timeout) => Outcome::Err(ErrorKind::Timeout),
            Some(SlotOutcome::Delivered(CommandResult::Get(Ok(entries)))) => {
                match entries.iter().find(|e: &&GetEntry| e.key == namespaced) {
                    None => Outcome::Miss,
                    Some(entry) => {
                        match transform::decode_fetch::<T>(entry.bytes.clone(), entry.flags, &self.codec, self.compress_algo()) {
                            Ok(value) => Outcome::Ok(value),
                            Err(e) => Outcome::Err(ErrorKind::Transform(e)),
                        }
                    }
                }
            }
            Some(SlotOutcome::Delivered(CommandResult::Get(Err(e)))) => Outcome::Err(engine_error_to_kind(e.clone())),
            Some(SlotOutcome::Delivered(_)) => unreachable!("get slot always carries a Get result"),
        }
    }

    /// Fire-and-forget modifier (spec §9 Design Notes: replaces void-context inspection with
    /// an explicit builder). Only meaningful when `nowait` is enabled in configuration;
    /// otherwise behaves like the corresponding blocking call but discards its result.
    pub fn fire_and_forget(&mut self) -> FireAndForget<'_> {
        FireAndForget { client: self }
    }

    /// Drain every engine's outstanding nowait replies before the façade is dropped, so
    /// server-side work already acknowledged as sent isn't silently abandoned mid-pipeline
    /// (spec §3 Lifecycle, §4.8).
    fn drain_nowait(&mut self) {
        let deadline = if self.io_timeout.is_zero() { None } else { Some(Instant::now() + self.io_timeout) };
        let engaged: Vec<usize> = (0..self.engines.len())
            .filter(|&i| {
                self.engines[i].state() == EngineState::Open
                    && (self.engines[i].nowait_count() > 0 || self.engines[i].has_outbound_data())
            })
            .collect();

        if engaged.is_empty() {
            return;
        }

        let engines = &mut self.engines;
        let failure_mgr = &mut self.failure_mgr;
        Dispatcher::drain(engines, &engaged, deadline, |idx| {
            failure_mgr.record_failure(idx, Instant::now());
        });
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.drain_nowait();
    }
}

/// Builder returned by [`Client::fire_and_forget`]: enqueues without allocating a result
/// slot and returns immediately, never touching the dispatcher (spec §4.6 Nowait mode).
pub struct FireAndForget<'a> {
    client: &'a mut Client,
}

impl<'a> FireAndForget<'a> {
    /// Enqueue a `set` without allocating a result slot. Only actually fire-and-forgets when
    /// `nowait` is enabled in configuration; otherwise this falls back to the real blocking
    /// `set` and discards its result, since there's no wire-level nowait mode to piggyback on.
    pub fn set(&mut self, key: &str, bytes: &[u8], exptime: u32) {
        if !self.client.nowait {
            let _ = self.client.set(key, bytes, exptime);
            return;
        }

        let policy = self.client.compress_policy();
        let algo = self.client.compress_algo();
        let (encoded, flags) = match transform::encode_store::<()>(StoreInput::Bytes(bytes), &self.client.codec, self.client.utf8, policy, algo) {
            Ok(v) => v,
            Err(_) => return,
        };
        let server_index = self.client.server_for(key);
        let namespaced = self.client.namespaced(key);
        if self.client.ensure_connected(server_index).is_err() {
            return;
        }
        self.client.engines[server_index].enqueue_store(StoreVerb::Set, &namespaced, flags, exptime, &encoded, None, None);
    }

    /// Enqueue a `delete` without allocating a result slot. Only actually fire-and-forgets
    /// when `nowait` is enabled in configuration; otherwise behaves like the real blocking
    /// `delete` and discards its result.
    pub fn delete(&mut self, key: &str) {
        if !self.client.nowait {
            let _ = self.client.delete(key);
            return;
        }

        let server_index = self.client.server_for(key);
        let namespaced = self.client.namespaced(key);
        if self.client.ensure_connected(server_index).is_err() {
            return;
        }
        self.client.engines[server_index].enqueue_delete(&namespaced, None);
    }
}

fn store_outcome(outcome: SlotOutcome) -> Outcome<bool> {
    match outcome {
        SlotOutcome::Timeout => Outcome::Err(ErrorKind::Timeout),
        SlotOutcome::Delivered(CommandResult::Store(Ok(b))) => Outcome::Ok(b),
        SlotOutcome::Delivered(CommandResult::Store(Err(e))) => Outcome::Err(engine_error_to_kind(e)),
        _ => unreachable!("store slot always carries a Store result"),
    }
}

fn engine_error_to_kind(e: EngineError) -> ErrorKind {
    match e {
        EngineError::Server(s) => ErrorKind::Server(s),
        EngineError::Protocol(msg) => ErrorKind::Protocol(msg),
        EngineError::Io(msg) => ErrorKind::Protocol(format!("io error: {}", msg)),
        EngineError::Connect(msg) => ErrorKind::Connect(msg),
        EngineError::Broken => ErrorKind::EngineBroken,
    }
}

/// Parse a dotted `major.minor.patch` version string for `cas`-family gating (spec §6).
/// Anything that doesn't parse cleanly is treated as unknown (capable), not an error.
fn parse_version(v: &str) -> Option<(u32, u32, u32)> {
    let mut parts = v.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}
