//! Thin wrappers over the System V IPC calls.
//!
//! Each wrapper converts the C return convention into `io::Result` and
//! retries `EINTR` where the call is restartable. No other module touches
//! `libc` IPC functions directly.

use libc::{c_int, c_short, c_ushort, c_void};
use std::io;
use std::mem::MaybeUninit;

pub(crate) fn semget(key: i32, nsems: usize, flags: c_int) -> io::Result<c_int> {
    let id = unsafe { libc::semget(key, nsems as c_int, flags) };
    if id < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(id)
    }
}

/// One semaphore operation: `delta` on semaphore `index`
#[derive(Debug, Clone, Copy)]
pub(crate) struct SemOp {
    pub index: u16,
    pub delta: i16,
    pub undo: bool,
    pub nowait: bool,
}

impl SemOp {
    fn to_sembuf(self) -> libc::sembuf {
        let mut flags: c_int = 0;
        if self.undo {
            flags |= libc::SEM_UNDO;
        }
        if self.nowait {
            flags |= libc::IPC_NOWAIT;
        }
        libc::sembuf {
            sem_num: self.index as c_ushort,
            sem_op: self.delta as c_short,
            sem_flg: flags as c_short,
        }
    }
}

/// Apply all operations atomically. `EAGAIN` surfaces as `WouldBlock`.
pub(crate) fn semop(id: c_int, ops: &[SemOp]) -> io::Result<()> {
    let mut bufs: Vec<libc::sembuf> = ops.iter().map(|op| op.to_sembuf()).collect();
    loop {
        let rc = unsafe { libc::semop(id, bufs.as_mut_ptr(), bufs.len() as _) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// `semctl` commands that take no argument and return an int
pub(crate) fn semctl_get(id: c_int, index: u16, cmd: c_int) -> io::Result<c_int> {
    let rc = unsafe { libc::semctl(id, index as c_int, cmd) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

pub(crate) fn semctl_setval(id: c_int, index: u16, value: u16) -> io::Result<()> {
    // `union semun` is passed by value; its `val` member has the ABI of an int
    let rc = unsafe { libc::semctl(id, index as c_int, libc::SETVAL, value as c_int) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Last `semop` time of the set; zero until the creator has initialised it
pub(crate) fn sem_otime(id: c_int) -> io::Result<i64> {
    let mut ds = MaybeUninit::<libc::semid_ds>::zeroed();
    let rc = unsafe { libc::semctl(id, 0, libc::IPC_STAT, ds.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let ds = unsafe { ds.assume_init() };
    Ok(ds.sem_otime as i64)
}

pub(crate) fn semrm(id: c_int) -> io::Result<()> {
    let rc = unsafe { libc::semctl(id, 0, libc::IPC_RMID) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub(crate) fn shmget(key: i32, size: usize, flags: c_int) -> io::Result<c_int> {
    let id = unsafe { libc::shmget(key, size, flags) };
    if id < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(id)
    }
}

pub(crate) fn shmat(id: c_int, read_only: bool) -> io::Result<*mut u8> {
    let flags = if read_only { libc::SHM_RDONLY } else { 0 };
    let addr = unsafe { libc::shmat(id, std::ptr::null(), flags) };
    if addr as isize == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(addr.cast::<u8>())
    }
}

pub(crate) fn shmdt(addr: *mut u8) -> io::Result<()> {
    let rc = unsafe { libc::shmdt(addr.cast::<c_void>()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub(crate) fn shm_segsz(id: c_int) -> io::Result<usize> {
    let mut ds = MaybeUninit::<libc::shmid_ds>::zeroed();
    let rc = unsafe { libc::shmctl(id, libc::IPC_STAT, ds.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let ds = unsafe { ds.assume_init() };
    Ok(ds.shm_segsz as usize)
}

pub(crate) fn shmrm(id: c_int) -> io::Result<()> {
    let rc = unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// The host's maximum segment size, where the kernel publishes it
pub(crate) fn host_segment_limit() -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        let raw = std::fs::read_to_string("/proc/sys/kernel/shmmax").ok()?;
        let value = raw.trim().parse::<u64>().ok()?;
        Some(usize::try_from(value).unwrap_or(usize::MAX))
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENOENT))
}

pub(crate) fn is_removed(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EIDRM | libc::EINVAL))
}
