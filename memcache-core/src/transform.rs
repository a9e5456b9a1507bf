//! Value transform pipeline (C5, spec §4.5). Compression threshold/ratio
//! policy plus opaque structured-value serialization, tied together by the
//! flag word that travels with every stored value.

use crate::codec::{Codec, CompressAlgo};
use crate::error::TransformError;

/// Bit `b0`: value is a structured (serialized) object, not a raw byte string.
pub const FLAG_STRUCTURED: u32 = 0b001;
/// Bit `b1`: value is compressed.
pub const FLAG_COMPRESSED: u32 = 0b010;
/// Bit `b2`: value is UTF-8 text.
pub const FLAG_UTF8: u32 = 0b100;

/// Compression policy (spec §6 `compress_threshold` / `compress_ratio`).
#[derive(Debug, Clone, Copy)]
pub struct CompressPolicy {
    /// `< 0` disables compression entirely.
    pub threshold: i64,
    /// Accept compression only if `compressed_len <= ratio * original_len`.
    pub ratio: f64,
}

impl Default for CompressPolicy {
    fn default() -> Self {
        CompressPolicy { threshold: -1, ratio: 0.8 }
    }
}

/// The shape of a value on its way into the cache.
pub enum StoreInput<'a, T> {
    Bytes(&'a [u8]),
    Text(&'a str),
    Structured(&'a T),
}

/// The shape of a value on its way out of the cache, reconstructed from the flag word.
#[derive(Debug, PartialEq, Eq)]
pub enum FetchedValue<T> {
    Bytes(Vec<u8>),
    Text(String),
    Structured(T),
}

/// Apply the store-side pipeline: serialize if structured, transcode if text, then
/// compress if the policy accepts the result. Returns the bytes to ship plus the flag word.
pub fn encode_store<T>(
    input: StoreInput<'_, T>,
    codec: &dyn Codec<T>,
    utf8_enabled: bool,
    policy: CompressPolicy,
    algo: Option<&dyn CompressAlgo>,
) -> Result<(Vec<u8>, u32), TransformError> {
    let mut flags = 0u32;

    let mut bytes = match input {
        StoreInput::Structured(value) => {
            flags |= FLAG_STRUCTURED;
            codec.encode(value)?
        }
        StoreInput::Text(s) => {
            if utf8_enabled {
                flags |= FLAG_UTF8;
            }
            s.as_bytes().to_vec()
        }
        StoreInput::Bytes(b) => b.to_vec(),
    };

    if policy.threshold >= 0 && bytes.len() as i64 >= policy.threshold {
        if let Some(algo) = algo {
            let original_len = bytes.len();
            let compressed = algo.compress(&bytes)?;
            if (compressed.len() as f64) <= policy.ratio * (original_len as f64) {
                bytes = compressed;
                flags |= FLAG_COMPRESSED;
            }
        }
    }

    Ok((bytes, flags))
}

/// Apply the fetch-side pipeline in reverse order: decompress (b1), then interpret as text
/// (b2) or structured (b0). A failure here is reported only for the key being decoded; it
/// never touches the connection or other keys in the same batch (spec §4.5).
pub fn decode_fetch<T>(
    bytes: Vec<u8>,
    flags: u32,
    codec: &dyn Codec<T>,
    algo: Option<&dyn CompressAlgo>,
) -> Result<FetchedValue<T>, TransformError> {
    let bytes = if flags & FLAG_COMPRESSED != 0 {
        let algo = algo.ok_or_else(|| TransformError::Decompress("no compression algorithm configured".into()))?;
        algo.decompress(&bytes)?
    } else {
        bytes
    };

    if flags & FLAG_STRUCTURED != 0 {
        return Ok(FetchedValue::Structured(codec.decode(&bytes)?));
    }

    if flags & FLAG_UTF8 != 0 {
        let text = String::from_utf8(bytes).map_err(|_| TransformError::InvalidUtf8)?;
        return Ok(FetchedValue::Text(text));
    }

    Ok(FetchedValue::Bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AlgoRegistry, JsonCodec};

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn raw_bytes_roundtrip_without_flags() {
        let codec = JsonCodec;
        let (bytes, flags) = encode_store::<()>(
            StoreInput::Bytes(b"hello"),
            &codec,
            false,
            CompressPolicy::default(),
            None,
        )
        .unwrap();
        assert_eq!(flags, 0);

        let value = decode_fetch::<()>(bytes, flags, &codec, None).unwrap();
        assert_eq!(value, FetchedValue::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn text_sets_utf8_flag_when_enabled() {
        let codec = JsonCodec;
        let (bytes, flags) =
            encode_store::<()>(StoreInput::Text("héllo"), &codec, true, CompressPolicy::default(), None).unwrap();
        assert_eq!(flags, FLAG_UTF8);

        match decode_fetch::<()>(bytes, flags, &codec, None).unwrap() {
            FetchedValue::Text(s) => assert_eq!(s, "héllo"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn structured_values_roundtrip() {
        let codec = JsonCodec;
        let value = Point { x: 3, y: 4 };
        let (bytes, flags) =
            encode_store(StoreInput::Structured(&value), &codec, false, CompressPolicy::default(), None).unwrap();
        assert_eq!(flags, FLAG_STRUCTURED);

        match decode_fetch::<Point>(bytes, flags, &codec, None).unwrap() {
            FetchedValue::Structured(p) => assert_eq!(p, value),
            other => panic!("expected structured, got {:?}", other),
        }
    }

    #[test]
    fn compression_applied_above_threshold_and_ratio() {
        let codec = JsonCodec;
        let registry = AlgoRegistry::with_builtins();
        let algo = registry.get("gzip").unwrap();
        let repetitive = vec![b'a'; 200_000];

        let policy = CompressPolicy { threshold: 100_000, ratio: 0.5 };
        let (bytes, flags) =
            encode_store::<()>(StoreInput::Bytes(&repetitive), &codec, false, policy, Some(algo)).unwrap();
        assert_eq!(flags, FLAG_COMPRESSED);
        assert!(bytes.len() < repetitive.len());

        match decode_fetch::<()>(bytes, flags, &codec, Some(algo)).unwrap() {
            FetchedValue::Bytes(b) => assert_eq!(b, repetitive),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn compression_skipped_when_ratio_not_met() {
        let codec = JsonCodec;
        let registry = AlgoRegistry::with_builtins();
        let algo = registry.get("gzip").unwrap();
        // High-entropy-ish data that gzip won't shrink below a 0.1 ratio.
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

        let policy = CompressPolicy { threshold: 10, ratio: 0.1 };
        let (_bytes, flags) =
            encode_store::<()>(StoreInput::Bytes(&data), &codec, false, policy, Some(algo)).unwrap();
        assert_eq!(flags, 0);
    }

    #[test]
    fn below_threshold_is_not_considered() {
        let codec = JsonCodec;
        let registry = AlgoRegistry::with_builtins();
        let algo = registry.get("gzip").unwrap();
        let data = vec![b'a'; 99];

        let policy = CompressPolicy { threshold: 100, ratio: 0.9 };
        let (_bytes, flags) =
            encode_store::<()>(StoreInput::Bytes(&data), &codec, false, policy, Some(algo)).unwrap();
        assert_eq!(flags, 0);
    }
}
