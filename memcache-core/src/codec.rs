//! The two external collaborators spec.md §1 declares out of scope —
//! structured-value serialization and named compression algorithms — plus
//! one concrete built-in for each, so the crate is usable standalone. The
//! façade (C8) is generic over [`Codec`]; [`transform`](crate::transform)
//! is generic over the [`CompressAlgo`] registry.

use crate::error::TransformError;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use hashbrown::HashMap;
use std::io::Read;

/// Opaque structured-value serializer, per the Design Notes' re-architecting of "opaque
/// structured values" (spec §9): `encode`/`decode` are the only seam the transform
/// pipeline (C5) needs.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>, TransformError>;
    fn decode(&self, bytes: &[u8]) -> Result<T, TransformError>;
}

/// Default codec for "generic" callers: a tagged self-describing format (JSON), matching
/// how the rest of the crate already leans on `serde`.
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, TransformError> {
        serde_json::to_vec(value).map_err(|e| TransformError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, TransformError> {
        serde_json::from_slice(bytes).map_err(|e| TransformError::Deserialize(e.to_string()))
    }
}

/// `compress(bytes) -> bytes` / `decompress(bytes) -> bytes`, named by string in
/// configuration (spec §6 `compress_algo`). A global algorithm registry mirroring the
/// Design Notes' "Global algorithm registry" re-architecting of the source's compress-by-name
/// dispatch.
pub trait CompressAlgo {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError>;
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// The one built-in backend, matching `compress_algo`'s documented default (spec §6).
pub struct Gzip;

impl CompressAlgo for Gzip {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut encoder = GzEncoder::new(bytes, Compression::default());
        let mut out = Vec::new();
        encoder
            .read_to_end(&mut out)
            .map_err(|e| TransformError::Compress(e.to_string()))?;
        Ok(out)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| TransformError::Decompress(e.to_string()))?;
        Ok(out)
    }
}

/// `name -> algorithm` mapping, constructed once at façade start. Unknown names warn and
/// disable compression (spec §7 ConfigError, matching the source's behavior) rather than
/// failing construction outright.
pub struct AlgoRegistry {
    algos: HashMap<String, Box<dyn CompressAlgo + Send + Sync>>,
}

impl AlgoRegistry {
    pub fn with_builtins() -> AlgoRegistry {
        let mut algos: HashMap<String, Box<dyn CompressAlgo + Send + Sync>> = HashMap::new();
        algos.insert("gzip".to_owned(), Box::new(Gzip));
        AlgoRegistry { algos }
    }

    pub fn get(&self, name: &str) -> Option<&(dyn CompressAlgo + Send + Sync)> {
        self.algos.get(name).map(|b| b.as_ref())
    }
}

impl Default for AlgoRegistry {
    fn default() -> Self {
        AlgoRegistry::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn json_codec_roundtrips() {
        let codec = JsonCodec;
        let value = Point { x: 1, y: -2 };
        let bytes = codec.encode(&value).unwrap();
        let back: Point = codec.decode(&bytes).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn gzip_roundtrips() {
        let gzip = Gzip;
        let original = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = gzip.compress(&original).unwrap();
        let restored = gzip.decompress(&compressed).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn registry_exposes_gzip_by_name() {
        let registry = AlgoRegistry::with_builtins();
        assert!(registry.get("gzip").is_some());
        assert!(registry.get("lz4").is_none());
    }
}
