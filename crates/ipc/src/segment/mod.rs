//! Keyed shared memory segments, one framed payload each.
//!
//! A segment is never resized: every write deletes the old segment and
//! creates a new one of exactly header + payload bytes. The store performs no
//! locking; callers hold the cache lock in the matching mode for the whole
//! operation.

mod attach;
mod format;

pub use format::{SegmentHeader, HEADER_LEN};

use crate::sys;
use attach::Attachment;
use shmcache_core::{Error, ResourceKey, Result};
use tracing::{debug, trace, warn};

const RESOURCE: &str = "shared memory segment";

/// Stateless access to segments by key
#[derive(Debug, Clone)]
pub struct SegmentStore {
    permissions: u32,
    payload_limit: usize,
}

impl SegmentStore {
    /// `max_payload_size` is further capped by the host's segment size limit
    pub fn new(permissions: u32, max_payload_size: usize) -> Self {
        let host_limit = sys::host_segment_limit()
            .map(|limit| limit.saturating_sub(HEADER_LEN))
            .unwrap_or(usize::MAX);
        Self {
            permissions: permissions & 0o777,
            payload_limit: max_payload_size.min(host_limit),
        }
    }

    /// Largest payload a single segment accepts
    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }

    /// Whether a segment for `key` can be opened for attach
    pub fn exists(&self, key: ResourceKey) -> Result<bool> {
        Ok(self.open_id(key)?.is_some())
    }

    /// Replace the segment for `key` with one holding exactly `payload`.
    ///
    /// `identifier` labels errors and logs.
    pub fn write(&self, key: ResourceKey, identifier: &str, payload: &[u8]) -> Result<()> {
        if payload.len() > self.payload_limit {
            return Err(Error::OversizedPayload {
                identifier: identifier.to_string(),
                size: payload.len(),
                limit: self.payload_limit,
            });
        }

        if let Some(id) = self.open_id(key)? {
            sys::shmrm(id).map_err(|e| Error::os(RESOURCE, key.get(), "delete", e))?;
            trace!(key = %key, identifier, "deleted previous segment before rewrite");
        }

        let header = SegmentHeader::new(payload).encode()?;
        let total = HEADER_LEN + payload.len();
        let flags = libc::IPC_CREAT | libc::IPC_EXCL | self.permissions as libc::c_int;
        let id = match sys::shmget(key.as_ipc_key(), total, flags) {
            Ok(id) => id,
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => {
                return Err(Error::OversizedPayload {
                    identifier: identifier.to_string(),
                    size: payload.len(),
                    limit: self.payload_limit.min(total.saturating_sub(HEADER_LEN + 1)),
                });
            }
            Err(err) => return Err(Error::os(RESOURCE, key.get(), "create", err)),
        };

        let written = Attachment::attach(id, key, total, false).map(|mut attachment| {
            attachment.write(0, &header);
            attachment.write(HEADER_LEN, payload);
        });
        if let Err(e) = written {
            // Never leave a segment without a valid header behind
            if let Err(rm) = sys::shmrm(id) {
                warn!(key = %key, error = %rm, "failed to remove unwritten segment");
            }
            return Err(e);
        }

        debug!(key = %key, identifier, bytes = payload.len(), "wrote segment");
        Ok(())
    }

    /// Read the payload stored under `key`; `None` if no segment exists
    pub fn read(&self, key: ResourceKey, identifier: &str) -> Result<Option<Vec<u8>>> {
        let Some(id) = self.open_id(key)? else {
            return Ok(None);
        };

        let size = match sys::shm_segsz(id) {
            Ok(size) => size,
            Err(err) if sys::is_removed(&err) => return Ok(None),
            Err(err) => return Err(Error::os(RESOURCE, key.get(), "inspect", err)),
        };

        let attachment = match Attachment::attach(id, key, size, true) {
            Ok(attachment) => attachment,
            Err(Error::ResourceAcquisition { source, .. }) if sys::is_removed(&source) => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let header_bytes = attachment.read(0, HEADER_LEN.min(size));
        let header = SegmentHeader::decode_prefix(&header_bytes, size, identifier)?;
        let payload = attachment.read(HEADER_LEN, header.payload_len());
        header.verify_payload(&payload, identifier)?;

        trace!(key = %key, identifier, bytes = payload.len(), "read segment");
        Ok(Some(payload))
    }

    /// Remove the segment for `key`; `false` if there was none
    pub fn delete(&self, key: ResourceKey) -> Result<bool> {
        let Some(id) = self.open_id(key)? else {
            return Ok(false);
        };
        match sys::shmrm(id) {
            Ok(()) => {
                debug!(key = %key, "deleted segment");
                Ok(true)
            }
            Err(err) if sys::is_removed(&err) => Ok(false),
            Err(err) => Err(Error::os(RESOURCE, key.get(), "delete", err)),
        }
    }

    fn open_id(&self, key: ResourceKey) -> Result<Option<libc::c_int>> {
        match sys::shmget(key.as_ipc_key(), 0, 0) {
            Ok(id) => Ok(Some(id)),
            Err(err) if sys::is_missing(&err) => Ok(None),
            Err(err) => Err(Error::os(RESOURCE, key.get(), "open", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmcache_core::derive_key;

    fn key() -> ResourceKey {
        derive_key(&uuid::Uuid::new_v4().to_string(), "segment-tests", Some("entry"))
    }

    fn store() -> SegmentStore {
        SegmentStore::new(0o600, 1024 * 1024)
    }

    #[test]
    fn test_missing_segment() {
        let store = store();
        let key = key();
        assert!(!store.exists(key).unwrap());
        assert_eq!(store.read(key, "missing").unwrap(), None);
        assert!(!store.delete(key).unwrap());
    }

    #[test]
    fn test_write_read_delete() {
        let store = store();
        let key = key();
        store.write(key, "entry", b"hello segment").unwrap();
        assert!(store.exists(key).unwrap());
        assert_eq!(store.read(key, "entry").unwrap().as_deref(), Some(&b"hello segment"[..]));
        assert!(store.delete(key).unwrap());
        assert!(!store.exists(key).unwrap());
    }

    #[test]
    fn test_rewrite_changes_size() {
        let store = store();
        let key = key();
        store.write(key, "entry", &[1u8; 4096]).unwrap();
        store.write(key, "entry", b"tiny").unwrap();
        assert_eq!(store.read(key, "entry").unwrap().as_deref(), Some(&b"tiny"[..]));
        store.write(key, "entry", &[2u8; 8192]).unwrap();
        assert_eq!(store.read(key, "entry").unwrap().map(|p| p.len()), Some(8192));
        store.delete(key).unwrap();
    }

    #[test]
    fn test_empty_payload() {
        let store = store();
        let key = key();
        store.write(key, "empty", b"").unwrap();
        assert_eq!(store.read(key, "empty").unwrap(), Some(Vec::new()));
        store.delete(key).unwrap();
    }

    #[test]
    fn test_oversized_payload_is_rejected_before_touching_state() {
        let store = SegmentStore::new(0o600, 16);
        let key = key();
        store.write(key, "entry", b"small").unwrap();
        let err = store.write(key, "entry", &[0u8; 17]).unwrap_err();
        assert!(matches!(err, Error::OversizedPayload { size: 17, limit: 16, .. }));
        assert_eq!(store.read(key, "entry").unwrap().as_deref(), Some(&b"small"[..]));
        store.delete(key).unwrap();
    }

    #[test]
    fn test_foreign_segment_is_corrupt() {
        let store = store();
        let key = key();
        let id = sys::shmget(key.as_ipc_key(), 64, libc::IPC_CREAT | 0o600).unwrap();
        let err = store.read(key, "foreign").unwrap_err();
        assert!(err.is_corruption());
        sys::shmrm(id).unwrap();
    }
}
