//! Hashing primitives (C1, spec §4.1).
//!
//! One hash family covers both the legacy modulo selector and Ketama point
//! placement, the way the teacher keeps a single small `crypto` module of
//! pure free functions that everything else in `net` calls into.

use crc32fast::Hasher;

/// Hash `namespace` concatenated with `key`, used for both legacy modulo selection and
/// Ketama key lookup. Deterministic across processes (no random seed).
#[inline]
pub fn hash_key(namespace: &str, key: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(key);
    hasher.finalize()
}

/// Hash a single Ketama ring point source string (`"<address>-<index>"`). Kept as a
/// distinct function from [`hash_key`] even though the underlying algorithm is the same,
/// so the two call sites stay independently documented and swappable.
#[inline]
pub fn hash_point(source: &str) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(source.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_key("ns", b"foo"), hash_key("ns", b"foo"));
        assert_eq!(hash_point("10.0.0.1:11211-3"), hash_point("10.0.0.1:11211-3"));
    }

    #[test]
    fn namespace_changes_hash() {
        assert_ne!(hash_key("a", b"foo"), hash_key("b", b"foo"));
    }

    #[test]
    fn different_keys_usually_differ() {
        assert_ne!(hash_key("", b"foo"), hash_key("", b"bar"));
    }
}
