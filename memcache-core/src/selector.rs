//! Server selector. Given a key, deterministically return the index of the
//! responsible server. Immutable after construction — the selector never
//! reacts to failures; that's the failure manager's job, layered on top.

use crate::error::ConfigError;
use crate::hash::{hash_key, hash_point};

/// One configured server as seen by the selector: its canonical address string (used only
/// for Ketama point derivation) and its weight.
#[derive(Debug, Clone)]
pub struct WeightedServer {
    pub canonical_address: String,
    pub weight: f64,
}

/// A single point on the Ketama ring.
#[derive(Debug, Clone, Copy)]
struct RingPoint {
    hash: u32,
    server_index: usize,
}

enum Table {
    /// Legacy mode: a flat table of server indices, looked up by `hash(key) mod table.len()`.
    Weighted(Vec<usize>),
    /// Ketama mode: points sorted by hash, ties broken by construction order.
    Ketama(Vec<RingPoint>),
}

/// Pure `key -> server index` mapping. Construction is the only place that can fail or
/// branch; [`Selector::select`] never does either.
pub struct Selector {
    table: Table,
    namespace: String,
}

impl Selector {
    /// Build a legacy weighted selector. Non-integer weights truncate toward zero, floored
    /// at 1 after truncation.
    pub fn weighted(servers: &[WeightedServer], namespace: &str) -> Result<Selector, ConfigError> {
        let mut table = Vec::new();
        let mut sum: u32 = 0;

        for (index, server) in servers.iter().enumerate() {
            let weight = (server.weight.trunc() as i64).max(1) as u32;
            sum = sum
                .checked_add(weight)
                .filter(|&s| s < 32768)
                .ok_or(ConfigError::WeightTableOverflow(sum))?;
            table.extend(std::iter::repeat(index).take(weight as usize));
        }

        if table.is_empty() {
            return Err(ConfigError::NoServers);
        }

        Ok(Selector {
            table: Table::Weighted(table),
            namespace: namespace.to_owned(),
        })
    }

    /// Build a Ketama consistent-hashing selector. `points_per_unit_weight` must be > 0;
    /// the caller (client façade) is responsible for choosing between this and
    /// [`Selector::weighted`].
    pub fn ketama(
        servers: &[WeightedServer],
        points_per_unit_weight: u32,
        namespace: &str,
    ) -> Result<Selector, ConfigError> {
        if servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let total_weight: f64 = servers.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return Err(ConfigError::ZeroKetamaWeight);
        }

        let mut points = Vec::new();

        for (server_index, server) in servers.iter().enumerate() {
            let point_count = (points_per_unit_weight as f64 * server.weight).round() as u32;

            for sub_index in 0..point_count {
                let source = format!("{}-{}", server.canonical_address, sub_index);
                points.push(RingPoint {
                    hash: hash_point(&source),
                    server_index,
                });
            }
        }

        if points.is_empty() {
            return Err(ConfigError::ZeroKetamaWeight);
        }

        // Stable sort: points were pushed in (server_index, sub_index) ascending order, so
        // equal-hash ties keep the lexicographically smaller pair first.
        points.sort_by_key(|p| p.hash);

        Ok(Selector {
            table: Table::Ketama(points),
            namespace: namespace.to_owned(),
        })
    }

    /// Map a key to the index of the server responsible for it.
    pub fn select(&self, key: &[u8]) -> usize {
        let digest = hash_key(&self.namespace, key);

        match &self.table {
            Table::Weighted(table) => table[(digest % table.len() as u32) as usize],
            Table::Ketama(points) => {
                // First point whose hash >= digest, wrapping to the first point past the end.
                let idx = points.partition_point(|p| p.hash < digest);
                let idx = if idx == points.len() { 0 } else { idx };
                points[idx].server_index
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(n: usize) -> Vec<WeightedServer> {
        (0..n)
            .map(|i| WeightedServer {
                canonical_address: format!("10.0.0.{}:11211", i),
                weight: 1.0,
            })
            .collect()
    }

    #[test]
    fn weighted_is_pure() {
        let sel = Selector::weighted(&servers(3), "").unwrap();
        let a = sel.select(b"hello");
        let b = sel.select(b"hello");
        assert_eq!(a, b);
        assert!(a < 3);
    }

    #[test]
    fn ketama_is_pure() {
        let sel = Selector::ketama(&servers(3), 100, "").unwrap();
        let a = sel.select(b"hello");
        let b = sel.select(b"hello");
        assert_eq!(a, b);
        assert!(a < 3);
    }

    #[test]
    fn weighted_rejects_overflow() {
        let big = vec![WeightedServer { canonical_address: "x".into(), weight: 40000.0 }];
        assert!(matches!(
            Selector::weighted(&big, ""),
            Err(ConfigError::WeightTableOverflow(_))
        ));
    }

    #[test]
    fn ketama_rejects_zero_weight() {
        let zero = vec![WeightedServer { canonical_address: "x".into(), weight: 0.0 }];
        assert!(matches!(Selector::ketama(&zero, 100, ""), Err(ConfigError::ZeroKetamaWeight)));
    }

    #[test]
    fn ketama_distribution_is_roughly_proportional() {
        let servers = vec![
            WeightedServer { canonical_address: "a".into(), weight: 1.0 },
            WeightedServer { canonical_address: "b".into(), weight: 1.0 },
            WeightedServer { canonical_address: "c".into(), weight: 2.0 },
        ];
        let sel = Selector::ketama(&servers, 160, "").unwrap();

        let mut counts = [0u32; 3];
        for i in 0..20_000u32 {
            let key = i.to_be_bytes();
            counts[sel.select(&key)] += 1;
        }

        let total: u32 = counts.iter().sum();
        let frac_c = counts[2] as f64 / total as f64;
        // Expected ~0.5 (weight 2 of total weight 4); allow a generous error band.
        assert!(frac_c > 0.35 && frac_c < 0.65, "frac_c = {}", frac_c);
    }

    #[test]
    fn legacy_weight_truncates_and_floors() {
        let servers = vec![
            WeightedServer { canonical_address: "a".into(), weight: 1.9 },
            WeightedServer { canonical_address: "b".into(), weight: 0.2 },
        ];
        // a -> truncates to 1, b -> truncates to 0, floored to 1. Table length 2.
        let sel = Selector::weighted(&servers, "").unwrap();
        match &sel.table {
            Table::Weighted(table) => assert_eq!(table.len(), 2),
            _ => unreachable!(),
        }
    }
}
