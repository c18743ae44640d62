//! Core error type definitions

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for shmcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for shmcache operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A semaphore or shared memory system call failed
    ResourceAcquisition {
        resource: &'static str,
        key: u32,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A bounded lock wait expired
    LockTimeout {
        operation: &'static str,
        waited: Duration,
    },

    /// A bounded lock wait expired and the recorded holder is gone
    StaleLock {
        resource: &'static str,
        holder_pid: i32,
    },

    /// A present segment could not be decoded
    CorruptPayload { identifier: String, reason: String },

    /// The payload does not fit into a single segment
    OversizedPayload {
        identifier: String,
        size: usize,
        limit: usize,
    },

    /// An entry key coincides with a key already in use in the same cache
    KeyCollision {
        identifier: String,
        key: u32,
        occupant: String,
    },

    /// An entry identifier was rejected by the frontend
    InvalidIdentifier { identifier: String, reason: String },

    /// Encoding, decoding, compressing or decompressing a value failed
    Codec {
        operation: CodecOp,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    Configuration { message: String },

    /// File system operations (configuration files)
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Codec operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecOp {
    Encode,
    Decode,
    Compress,
    Decompress,
}
