//! Payload codecs turning typed values into the bytes a backend stores

use crate::config::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shmcache_core::{CodecOp, Error, Result};
use std::io::{Read, Write};

/// Serialize values to bytes and back.
///
/// `decode` failures are reported as [`Error::Codec`]; the frontend turns
/// them into corruption of the stored entry.
pub trait PayloadCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Compact binary encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl PayloadCodec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::codec(CodecOp::Encode, e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| Error::codec(CodecOp::Decode, e))
    }
}

/// JSON encoding; readable with `shmcache get`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::codec(CodecOp::Encode, e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::codec(CodecOp::Decode, e))
    }
}

/// Wraps another codec and compresses its output
#[derive(Debug, Clone, Copy)]
pub struct Compressed<C> {
    inner: C,
    algorithm: Compression,
    level: i32,
}

impl<C: PayloadCodec> Compressed<C> {
    pub fn gzip(inner: C) -> Self {
        Self {
            inner,
            algorithm: Compression::Gzip,
            level: 6,
        }
    }

    pub fn zstd(inner: C) -> Self {
        Self {
            inner,
            algorithm: Compression::Zstd,
            level: 3,
        }
    }

    /// `Compression::None` passes the inner codec's bytes through unchanged
    pub fn with_algorithm(inner: C, algorithm: Compression) -> Self {
        match algorithm {
            Compression::Gzip => Self::gzip(inner),
            Compression::Zstd => Self::zstd(inner),
            Compression::None => Self {
                inner,
                algorithm,
                level: 0,
            },
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn algorithm(&self) -> Compression {
        self.algorithm
    }

    fn compress(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        match self.algorithm {
            Compression::None => Ok(bytes),
            Compression::Gzip => {
                let level = flate2::Compression::new(self.level.clamp(0, 9) as u32);
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder
                    .write_all(&bytes)
                    .map_err(|e| Error::codec(CodecOp::Compress, e))?;
                encoder.finish().map_err(|e| Error::codec(CodecOp::Compress, e))
            }
            Compression::Zstd => zstd::stream::encode_all(&bytes[..], self.level)
                .map_err(|e| Error::codec(CodecOp::Compress, e)),
        }
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            Compression::None => Ok(bytes.to_vec()),
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(bytes);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| Error::codec(CodecOp::Decompress, e))?;
                Ok(out)
            }
            Compression::Zstd => {
                zstd::stream::decode_all(bytes).map_err(|e| Error::codec(CodecOp::Decompress, e))
            }
        }
    }
}

impl<C: PayloadCodec> PayloadCodec for Compressed<C> {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let raw = self.inner.encode(value)?;
        self.compress(raw)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let raw = self.decompress(bytes)?;
        self.inner.decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        value: i64,
        items: Vec<String>,
    }

    fn sample() -> Entry {
        Entry {
            name: "config".to_string(),
            value: 42,
            items: vec!["one".to_string(); 64],
        }
    }

    #[test]
    fn test_json_is_plain_json() {
        let bytes = JsonCodec.encode(&sample()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["value"], 42);
    }

    #[test]
    fn test_compression_shrinks_repetitive_values() {
        let plain = BincodeCodec.encode(&sample()).unwrap();
        for codec in [Compressed::gzip(BincodeCodec), Compressed::zstd(BincodeCodec)] {
            let packed = codec.encode(&sample()).unwrap();
            assert!(packed.len() < plain.len());
            assert_eq!(codec.decode::<Entry>(&packed).unwrap(), sample());
        }
    }

    #[test]
    fn test_no_compression_passes_through() {
        let codec = Compressed::with_algorithm(JsonCodec, Compression::None);
        let mut map = HashMap::new();
        map.insert("k".to_string(), 1u8);
        assert_eq!(codec.encode(&map).unwrap(), JsonCodec.encode(&map).unwrap());
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = Compressed::gzip(JsonCodec)
            .decode::<Entry>(b"not gzip")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Codec {
                operation: CodecOp::Decompress,
                ..
            }
        ));
        assert!(BincodeCodec.decode::<Entry>(&[1, 2]).is_err());
    }
}
