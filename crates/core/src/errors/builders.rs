//! Builder methods for creating errors with context

use super::types::{CodecOp, Error};
use std::path::PathBuf;

impl Error {
    /// Wrap the current `errno` of a failed IPC call
    #[must_use]
    pub fn last_os_error(resource: &'static str, key: u32, operation: &'static str) -> Self {
        Self::os(resource, key, operation, std::io::Error::last_os_error())
    }

    /// Wrap an explicit OS error of a failed IPC call
    #[must_use]
    pub fn os(
        resource: &'static str,
        key: u32,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        Error::ResourceAcquisition {
            resource,
            key,
            operation,
            source,
        }
    }

    /// Create a corrupt payload error
    #[must_use]
    pub fn corrupt(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptPayload {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid identifier error
    #[must_use]
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create a codec error with a source error
    #[must_use]
    pub fn codec(
        operation: CodecOp,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        Error::Codec {
            operation,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}
