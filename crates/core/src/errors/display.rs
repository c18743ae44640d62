//! Display implementations for error types

use super::types::{CodecOp, Error};
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceAcquisition {
                resource,
                key,
                operation,
                source,
            } => write!(
                f,
                "failed to {operation} {resource} (key {key:#010x}): {source}"
            ),
            Error::LockTimeout { operation, waited } => {
                write!(f, "timed out after {waited:?} waiting to {operation}")
            }
            Error::StaleLock {
                resource,
                holder_pid,
            } => write!(
                f,
                "{resource} is held by process {holder_pid}, which is no longer running; reset the locks to recover"
            ),
            Error::CorruptPayload { identifier, reason } => {
                write!(f, "corrupt payload for '{identifier}': {reason}")
            }
            Error::OversizedPayload {
                identifier,
                size,
                limit,
            } => write!(
                f,
                "payload for '{identifier}' is {size} bytes, exceeding the segment limit of {limit} bytes"
            ),
            Error::KeyCollision {
                identifier,
                key,
                occupant,
            } => write!(
                f,
                "entry '{identifier}' hashes to {key:#010x}, which is already used by '{occupant}'"
            ),
            Error::InvalidIdentifier { identifier, reason } => {
                write!(f, "invalid entry identifier '{identifier}': {reason}")
            }
            Error::Codec {
                operation, message, ..
            } => write!(f, "failed to {operation} payload: {message}"),
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => write!(
                f,
                "file system error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl fmt::Display for CodecOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CodecOp::Encode => "encode",
            CodecOp::Decode => "decode",
            CodecOp::Compress => "compress",
            CodecOp::Decompress => "decompress",
        };
        f.write_str(op)
    }
}
