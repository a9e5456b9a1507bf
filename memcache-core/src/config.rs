//! Configuration object (spec §6). A typed mirror of the recognized option
//! table, deserializable with `serde` the way the teacher deserializes its
//! own wire structs, plus the validation that turns it into a [`Selector`]
//! and a set of [`Engine`](crate::protocol::Engine)-ready addresses.

use crate::address::ServerAddress;
use crate::error::ConfigError;
use crate::selector::{Selector, WeightedServer};
use serde::Deserialize;
use std::time::Duration;

/// One entry of the `servers` list: either a bare `"host:port"` / `"/path"` string, or a
/// record spelling out an explicit weight. Mirrors the teacher's own preference for
/// `#[serde(untagged)]` enums over hand-rolled discriminated parsing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerSpec {
    Bare(String),
    Weighted { address: String, #[serde(default = "default_weight")] weight: f64 },
}

fn default_weight() -> f64 {
    1.0
}

impl ServerSpec {
    fn address(&self) -> &str {
        match self {
            ServerSpec::Bare(s) => s,
            ServerSpec::Weighted { address, .. } => address,
        }
    }

    fn weight(&self) -> f64 {
        match self {
            ServerSpec::Bare(_) => 1.0,
            ServerSpec::Weighted { weight, .. } => *weight,
        }
    }
}

/// The recognized configuration option table (spec §6), with the documented defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub servers: Vec<ServerSpec>,
    pub namespace: String,
    pub connect_timeout: f64,
    pub io_timeout: f64,
    pub close_on_error: bool,
    pub compress_threshold: i64,
    pub compress_ratio: f64,
    pub compress_algo: String,
    pub max_failures: u32,
    pub failure_timeout: f64,
    pub ketama_points: u32,
    pub nowait: bool,
    pub utf8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            servers: Vec::new(),
            namespace: String::new(),
            connect_timeout: 0.25,
            io_timeout: 1.0,
            close_on_error: true,
            compress_threshold: -1,
            compress_ratio: 0.8,
            compress_algo: "gzip".to_owned(),
            max_failures: 0,
            failure_timeout: 10.0,
            ketama_points: 0,
            nowait: false,
            utf8: false,
        }
    }
}

/// The validated, ready-to-use form of a [`Config`]: parsed addresses in configuration
/// order (engines and the selector both index into this by position) plus a constructed
/// selector. Built once at façade construction (spec §4.8).
pub struct ResolvedConfig {
    pub addresses: Vec<ServerAddress>,
    pub selector: Selector,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub close_on_error: bool,
    pub compress_threshold: i64,
    pub compress_ratio: f64,
    pub compress_algo: String,
    pub max_failures: u32,
    pub failure_timeout: Duration,
    pub nowait: bool,
    pub utf8: bool,
    pub namespace: String,
}

impl Config {
    /// Validate the raw option table and build the immutable pieces derived from it: the
    /// selector (legacy or Ketama, per `ketama_points`) and the parsed server addresses.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        if self.failure_timeout <= 0.0 {
            return Err(ConfigError::NonPositiveFailureTimeout(self.failure_timeout));
        }

        let mut addresses = Vec::with_capacity(self.servers.len());
        let mut weighted = Vec::with_capacity(self.servers.len());

        for spec in &self.servers {
            let address = ServerAddress::parse(spec.address())
                .map_err(|e| ConfigError::InvalidAddress(spec.address().to_owned(), e))?;
            weighted.push(WeightedServer { canonical_address: address.canonical(), weight: spec.weight() });
            addresses.push(address);
        }

        let selector = if self.ketama_points > 0 {
            Selector::ketama(&weighted, self.ketama_points, &self.namespace)?
        } else {
            Selector::weighted(&weighted, &self.namespace)?
        };

        let compress_algo = if self.compress_threshold >= 0 && crate::codec::AlgoRegistry::with_builtins().get(&self.compress_algo).is_none() {
            tracing::warn!(algo = %self.compress_algo, "unknown compression algorithm, disabling compression");
            String::new()
        } else {
            self.compress_algo.clone()
        };

        Ok(ResolvedConfig {
            addresses,
            selector,
            connect_timeout: secs_to_duration(self.connect_timeout),
            io_timeout: secs_to_duration(self.io_timeout),
            close_on_error: self.close_on_error,
            compress_threshold: if compress_algo.is_empty() { -1 } else { self.compress_threshold },
            compress_ratio: self.compress_ratio,
            compress_algo,
            max_failures: self.max_failures,
            failure_timeout: secs_to_duration(self.failure_timeout),
            nowait: self.nowait,
            utf8: self.utf8,
            namespace: self.namespace.clone(),
        })
    }
}

/// `0` means "no timeout" throughout spec §6; represented internally as `Duration::ZERO`,
/// which every timeout-bounded call site treats as "unbounded" rather than "instant".
fn secs_to_duration(secs: f64) -> Duration {
    if secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.connect_timeout, 0.25);
        assert_eq!(cfg.io_timeout, 1.0);
        assert!(cfg.close_on_error);
        assert_eq!(cfg.compress_threshold, -1);
        assert_eq!(cfg.compress_ratio, 0.8);
        assert_eq!(cfg.compress_algo, "gzip");
        assert_eq!(cfg.max_failures, 0);
        assert_eq!(cfg.failure_timeout, 10.0);
        assert_eq!(cfg.ketama_points, 0);
        assert!(!cfg.nowait);
        assert!(!cfg.utf8);
    }

    #[test]
    fn bare_strings_default_to_weight_one() {
        let cfg = Config { servers: vec![ServerSpec::Bare("a:1".into())], ..Config::default() };
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.addresses.len(), 1);
    }

    #[test]
    fn rejects_empty_server_list() {
        let cfg = Config::default();
        assert!(matches!(cfg.resolve(), Err(ConfigError::NoServers)));
    }

    #[test]
    fn rejects_non_positive_failure_timeout() {
        let cfg = Config {
            servers: vec![ServerSpec::Bare("a:1".into())],
            failure_timeout: 0.0,
            ..Config::default()
        };
        assert!(matches!(cfg.resolve(), Err(ConfigError::NonPositiveFailureTimeout(_))));
    }

    #[test]
    fn ketama_enabled_when_points_positive() {
        let cfg = Config {
            servers: vec![ServerSpec::Bare("a:1".into()), ServerSpec::Bare("b:2".into())],
            ketama_points: 100,
            ..Config::default()
        };
        let resolved = cfg.resolve().unwrap();
        assert!(matches!(resolved.selector.select(b"x"), 0..=1));
    }

    #[test]
    fn unknown_compress_algo_warns_and_disables() {
        let cfg = Config {
            servers: vec![ServerSpec::Bare("a:1".into())],
            compress_threshold: 100,
            compress_algo: "lz4".into(),
            ..Config::default()
        };
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.compress_threshold, -1);
        assert!(resolved.compress_algo.is_empty());
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let cfg = Config { servers: vec![ServerSpec::Bare("a:1".into())], io_timeout: 0.0, ..Config::default() };
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.io_timeout, Duration::ZERO);
    }
}
