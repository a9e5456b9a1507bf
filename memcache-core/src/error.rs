//! Error taxonomy. One flat enum per concern, re-expressed with `thiserror`
//! instead of hand-written `From` impls.

use std::io;
use thiserror::Error;

/// Failure raised while validating or constructing a client from a configuration object.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failure_timeout must be > 0, got {0}")]
    NonPositiveFailureTimeout(f64),
    #[error("ketama selector has zero total server weight")]
    ZeroKetamaWeight,
    #[error("legacy selector weight table exceeds 32768 slots (sum of weights = {0})")]
    WeightTableOverflow(u32),
    #[error("no servers configured")]
    NoServers,
    #[error("invalid server address `{0}`: {1}")]
    InvalidAddress(String, String),
}

/// Failure connecting to a server. Always fed to the failure manager.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("server is currently shunned, retry after failure window elapses")]
    Shunned,
    #[error("io error connecting: {0}")]
    Io(#[from] io::Error),
    #[error("connect timed out")]
    TimedOut,
}

/// A well-formed `ERROR` / `CLIENT_ERROR` / `SERVER_ERROR` token. Forces `Broken` iff
/// `close_on_error` is enabled (otherwise the connection is retained).
#[derive(Debug, Error, Clone)]
pub enum ServerError {
    #[error("ERROR")]
    Error,
    #[error("CLIENT_ERROR {0}")]
    ClientError(String),
    #[error("SERVER_ERROR {0}")]
    ServerError(String),
}

/// Compression or (de)serialization failed for a single value. Never affects the connection
/// or other keys in the same batch.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("compression failed: {0}")]
    Compress(String),
    #[error("decompression failed: {0}")]
    Decompress(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("deserialization failed: {0}")]
    Deserialize(String),
    #[error("value declared UTF-8 text is not valid UTF-8")]
    InvalidUtf8,
}

/// The per-key error kind surfaced by the dispatcher and façade. A negative-but-well-formed
/// reply (`NOT_STORED`, `EXISTS`, `NOT_FOUND`) is intentionally not part of this enum: a
/// well-formed semantic "no" is a valid boolean-false result, not an error.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("batch deadline expired before a reply arrived")]
    Timeout,
    #[error("{0}")]
    Protocol(String),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("engine is broken and not reconnected yet")]
    EngineBroken,
}

pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Per-key outcome. A value or absence for `get`-shaped calls, collapsed into this sum
/// type per the Design Notes' "dynamic error return" re-architecture (spec §9).
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Miss,
    Err(ErrorKind),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            _ => None,
        }
    }
}
