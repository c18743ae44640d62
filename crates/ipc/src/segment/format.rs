//! Segment framing: a fixed header in front of every payload
//!
//! System V refuses zero-sized segments and may round the reported size up,
//! so the payload length lives in the header rather than being inferred from
//! the segment size. A checksum catches torn writes and foreign segments that
//! happen to sit on one of our keys.

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use shmcache_core::{Error, Result, SEGMENT_FORMAT_VERSION, SEGMENT_MAGIC};

/// Encoded size of [`SegmentHeader`]
pub const HEADER_LEN: usize = 24;

/// Binary header at offset 0 of every segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct SegmentHeader {
    /// Magic number for validation
    magic: u32,
    /// Segment format version
    version: u16,
    /// Reserved flag bits
    flags: u16,
    /// Payload length in bytes
    payload_len: u64,
    /// CRC32C of the payload
    payload_crc: u32,
    /// CRC32C of the header (excluding this field)
    header_crc: u32,
}

impl SegmentHeader {
    pub fn new(payload: &[u8]) -> Self {
        let mut header = Self {
            magic: SEGMENT_MAGIC,
            version: SEGMENT_FORMAT_VERSION,
            flags: 0,
            payload_len: payload.len() as u64,
            payload_crc: crc32c(payload),
            header_crc: 0,
        };
        header.header_crc = header.calculate_crc();
        header
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    pub fn payload_crc(&self) -> u32 {
        self.payload_crc
    }

    fn calculate_crc(&self) -> u32 {
        let mut temp = *self;
        temp.header_crc = 0;
        match bincode::serialize(&temp) {
            Ok(bytes) => crc32c(&bytes),
            Err(_) => 0,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::corrupt("<segment header>", format!("header encoding failed: {e}")))
    }

    /// Decode and validate the header at the start of `segment`.
    ///
    /// `identifier` only labels the error.
    pub fn decode(segment: &[u8], identifier: &str) -> Result<Self> {
        let prefix = &segment[..segment.len().min(HEADER_LEN)];
        Self::decode_prefix(prefix, segment.len(), identifier)
    }

    /// Decode a header from the leading bytes of a segment of `segment_len`
    /// bytes without copying the payload first.
    pub fn decode_prefix(prefix: &[u8], segment_len: usize, identifier: &str) -> Result<Self> {
        if prefix.len() < HEADER_LEN || segment_len < HEADER_LEN {
            return Err(Error::corrupt(
                identifier,
                format!("segment of {segment_len} bytes is smaller than its header"),
            ));
        }
        let header: Self = bincode::deserialize(&prefix[..HEADER_LEN])
            .map_err(|e| Error::corrupt(identifier, format!("unreadable header: {e}")))?;
        header.validate(segment_len - HEADER_LEN, identifier)?;
        Ok(header)
    }

    fn validate(&self, capacity: usize, identifier: &str) -> Result<()> {
        if self.magic != SEGMENT_MAGIC {
            return Err(Error::corrupt(
                identifier,
                format!(
                    "invalid magic number: expected {:08x}, got {:08x}",
                    SEGMENT_MAGIC, self.magic
                ),
            ));
        }
        if self.version > SEGMENT_FORMAT_VERSION {
            return Err(Error::corrupt(
                identifier,
                format!("unsupported segment format version: {}", self.version),
            ));
        }
        let expected_crc = self.calculate_crc();
        if self.header_crc != expected_crc {
            return Err(Error::corrupt(
                identifier,
                format!(
                    "header CRC mismatch: expected {:08x}, got {:08x}",
                    expected_crc, self.header_crc
                ),
            ));
        }
        if self.payload_len > capacity as u64 {
            return Err(Error::corrupt(
                identifier,
                format!(
                    "payload length {} exceeds segment capacity {}",
                    self.payload_len, capacity
                ),
            ));
        }
        Ok(())
    }

    /// Check `payload` against the recorded checksum
    pub fn verify_payload(&self, payload: &[u8], identifier: &str) -> Result<()> {
        let actual = crc32c(payload);
        if actual != self.payload_crc {
            return Err(Error::corrupt(
                identifier,
                format!(
                    "payload CRC mismatch: expected {:08x}, got {:08x}",
                    self.payload_crc, actual
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encoded_size_is_fixed() {
        let bytes = SegmentHeader::new(b"hello").encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
    }

    #[test]
    fn test_empty_payload_is_representable() {
        let header = SegmentHeader::new(b"");
        let bytes = header.encode().unwrap();
        let decoded = SegmentHeader::decode(&bytes, "empty").unwrap();
        assert_eq!(decoded.payload_len(), 0);
        decoded.verify_payload(b"", "empty").unwrap();
    }

    #[test]
    fn test_foreign_bytes_are_rejected() {
        let garbage = vec![0xAB; 64];
        let err = SegmentHeader::decode(&garbage, "foreign").unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_truncated_segment_is_rejected() {
        let mut bytes = SegmentHeader::new(&[7u8; 100]).encode().unwrap();
        bytes.extend_from_slice(&[7u8; 10]);
        let err = SegmentHeader::decode(&bytes, "short").unwrap_err();
        assert!(err.to_string().contains("exceeds segment capacity"));
    }

    #[test]
    fn test_payload_checksum_detects_flip() {
        let header = SegmentHeader::new(b"payload");
        assert!(header.verify_payload(b"paylOad", "flip").is_err());
    }

    proptest! {
        #[test]
        fn test_single_bit_flip_in_header_is_detected(bit in 0usize..(HEADER_LEN * 8)) {
            let mut bytes = SegmentHeader::new(b"some payload").encode().unwrap();
            bytes.extend_from_slice(b"some payload");
            bytes[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(SegmentHeader::decode(&bytes, "flip").is_err());
        }
    }
}
