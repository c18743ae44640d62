//! Scoped attachment of a segment into this process's address space

use crate::sys;
use shmcache_core::{Error, ResourceKey, Result};
use std::ptr::NonNull;
use tracing::warn;

/// A mapped segment; detached on drop.
///
/// Access goes through copies rather than slices: other processes may map
/// the same memory, and the only thing keeping their writes away is the
/// cache lock the caller holds.
pub(crate) struct Attachment {
    addr: NonNull<u8>,
    len: usize,
    key: ResourceKey,
}

impl Attachment {
    pub(crate) fn attach(
        id: libc::c_int,
        key: ResourceKey,
        len: usize,
        read_only: bool,
    ) -> Result<Self> {
        let addr = sys::shmat(id, read_only)
            .map_err(|e| Error::os("shared memory segment", key.get(), "attach", e))?;
        let addr = NonNull::new(addr).ok_or_else(|| {
            Error::os(
                "shared memory segment",
                key.get(),
                "attach",
                std::io::Error::new(std::io::ErrorKind::Other, "kernel returned a null mapping"),
            )
        })?;
        Ok(Self { addr, len, key })
    }

    /// Copy `len` bytes starting at `offset`
    pub(crate) fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset.checked_add(len).is_some_and(|end| end <= self.len));
        let mut out = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(self.addr.as_ptr().add(offset), out.as_mut_ptr(), len);
        }
        out
    }

    /// Copy `bytes` into the segment at `offset`
    pub(crate) fn write(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset.checked_add(bytes.len()).is_some_and(|end| end <= self.len));
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.addr.as_ptr().add(offset), bytes.len());
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Err(e) = sys::shmdt(self.addr.as_ptr()) {
            warn!(key = %self.key, error = %e, "failed to detach shared memory segment");
        }
    }
}
