//! Shared-memory mappings for the descriptor-ring emulator.
//!
//! A [`SharedRegion`] is a `MAP_SHARED` view of a file or shm object that a peer
//! process (or another thread of this one) mutates concurrently. Plain `&[u8]`
//! borrows into such memory would be unsound, so every access goes through
//! atomic cells instead:
//!
//! - Bulk payload bytes use `AtomicU8` with relaxed ordering.
//! - Control words use `AtomicU32`; callers pick the ordering so that a word
//!   acting as a handoff flag can publish the bytes written before it.
//!
//! The mapping itself is created and torn down with `libc` (`open`/`mmap`/
//! `munmap`), and all raw-pointer handling stays inside this crate.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use thiserror::Error;

/// Errors from mapping or accessing a shared region.
#[derive(Debug, Error)]
pub enum ShmemError {
    #[error("open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("size {} to {len} bytes: {source}", path.display())]
    Size {
        path: PathBuf,
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("{} holds {have} bytes, need at least {need}", path.display())]
    TooSmall { path: PathBuf, have: u64, need: usize },
    #[error("map {len} bytes of {}: {source}", path.display())]
    Map {
        path: PathBuf,
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("map {len} anonymous bytes: {source}")]
    MapAnonymous {
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("range {offset:#x}+{len:#x} ends outside the {size:#x}-byte region")]
    OutOfRange { offset: usize, len: usize, size: usize },
    #[error("offset {offset:#x} is not aligned for a {size}-byte access")]
    Misaligned { offset: usize, size: usize },
    #[error("path {} contains an interior NUL byte", path.display())]
    BadPath { path: PathBuf },
}

impl ShmemError {
    fn out_of_range(offset: usize, len: usize, size: usize) -> Self {
        ShmemError::OutOfRange { offset, len, size }
    }
}

pub type ShmemResult<T> = Result<T, ShmemError>;

/// A `MAP_SHARED` mapping that both sides of the emulated DMA interface read
/// and write.
///
/// # Concurrency
///
/// The region never hands out `&[u8]` or `&mut [u8]`; a peer may store to any
/// byte at any time, and a plain reference would assert exclusive or frozen
/// memory that simply is not. Accessors return `&AtomicU8` / `&AtomicU32`
/// views or copy through them. The borrows keep the region alive, so a view
/// can never outlive the mapping it points into.
pub struct SharedRegion {
    base: *mut u8,
    len: usize,
    fd: libc::c_int,
}

// Safety: the region owns the mapping; all access to the memory goes through
// atomic operations, which are safe to issue from any thread.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Maps an existing file or shm object read-write.
    ///
    /// Fails if the object is missing or holds fewer than `len` bytes; a
    /// short mapping would fault on first access instead of erroring here.
    pub fn open(path: &Path, len: usize) -> ShmemResult<Self> {
        let c_path = c_path(path)?;
        // Safety: `c_path` is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(ShmemError::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }
        // Safety: `fd` is open and `stat` is a plain-data out parameter.
        let mut stat: libc::stat = unsafe { mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let source = io::Error::last_os_error();
            // Safety: `fd` is open and not used past this point.
            unsafe { libc::close(fd) };
            return Err(ShmemError::Stat {
                path: path.to_path_buf(),
                source,
            });
        }
        let have = stat.st_size as u64;
        if have < len as u64 {
            // Safety: `fd` is open and not used past this point.
            unsafe { libc::close(fd) };
            return Err(ShmemError::TooSmall {
                path: path.to_path_buf(),
                have,
                need: len,
            });
        }
        Self::map_fd(fd, len).map_err(|source| ShmemError::Map {
            path: path.to_path_buf(),
            len,
            source,
        })
    }

    /// Creates (or reuses) the object at `path` and sizes it to `len` bytes
    /// before mapping it.
    pub fn create(path: &Path, len: usize) -> ShmemResult<Self> {
        let c_path = c_path(path)?;
        // Safety: `c_path` is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CREAT, 0o600) };
        if fd < 0 {
            return Err(ShmemError::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }
        // Safety: `fd` is open for writing.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let source = io::Error::last_os_error();
            // Safety: `fd` is open and not used past this point.
            unsafe { libc::close(fd) };
            return Err(ShmemError::Size {
                path: path.to_path_buf(),
                len,
                source,
            });
        }
        Self::map_fd(fd, len).map_err(|source| ShmemError::Map {
            path: path.to_path_buf(),
            len,
            source,
        })
    }

    /// Maps `len` bytes of anonymous shared memory, not backed by any file.
    ///
    /// Useful when both sides of the interface live in one process.
    pub fn anonymous(len: usize) -> ShmemResult<Self> {
        // Safety: anonymous mapping request; no fd is involved.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(ShmemError::MapAnonymous {
                len,
                source: io::Error::last_os_error(),
            });
        }
        Ok(SharedRegion {
            base: base as *mut u8,
            len,
            fd: -1,
        })
    }

    fn map_fd(fd: libc::c_int, len: usize) -> Result<Self, io::Error> {
        // Safety: `fd` is open read-write and the object holds at least `len`
        // bytes, checked by the callers.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            let source = io::Error::last_os_error();
            // Safety: `fd` is open and not used past this point.
            unsafe { libc::close(fd) };
            return Err(source);
        }
        Ok(SharedRegion {
            base: base as *mut u8,
            len,
            fd,
        })
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, offset: usize, len: usize) -> ShmemResult<()> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| ShmemError::out_of_range(offset, len, self.len))?;
        if end > self.len {
            return Err(ShmemError::out_of_range(offset, len, self.len));
        }
        Ok(())
    }

    /// Atomic view of `len` bytes starting at `offset`.
    pub fn atomic_bytes(&self, offset: usize, len: usize) -> ShmemResult<&[AtomicU8]> {
        self.check_range(offset, len)?;
        // Safety: the range lies inside the live mapping, `AtomicU8` has the
        // layout of `u8`, and the borrow of `self` keeps the mapping alive.
        Ok(unsafe { slice::from_raw_parts(self.base.add(offset) as *const AtomicU8, len) })
    }

    /// Atomic view of the 32-bit word at `offset`.
    ///
    /// The mapping starts on a page boundary, so in-region alignment is
    /// absolute alignment.
    pub fn atomic_u32(&self, offset: usize) -> ShmemResult<&AtomicU32> {
        self.check_range(offset, mem::size_of::<u32>())?;
        if offset % mem::align_of::<AtomicU32>() != 0 {
            return Err(ShmemError::Misaligned {
                offset,
                size: mem::size_of::<u32>(),
            });
        }
        // Safety: in bounds, aligned, and the borrow of `self` keeps the
        // mapping alive.
        Ok(unsafe { &*(self.base.add(offset) as *const AtomicU32) })
    }

    /// Copies bytes out of the region into `dst`.
    pub fn read_into(&self, offset: usize, dst: &mut [u8]) -> ShmemResult<()> {
        let cells = self.atomic_bytes(offset, dst.len())?;
        for (byte, cell) in dst.iter_mut().zip(cells) {
            *byte = cell.load(Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copies `src` into the region at `offset`.
    pub fn write_from(&self, offset: usize, src: &[u8]) -> ShmemResult<()> {
        let cells = self.atomic_bytes(offset, src.len())?;
        for (byte, cell) in src.iter().zip(cells) {
            cell.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Loads the 32-bit word at `offset` with the given ordering.
    pub fn load_u32(&self, offset: usize, order: Ordering) -> ShmemResult<u32> {
        Ok(self.atomic_u32(offset)?.load(order))
    }

    /// Stores a 32-bit word at `offset` with the given ordering.
    pub fn store_u32(&self, offset: usize, value: u32, order: Ordering) -> ShmemResult<()> {
        self.atomic_u32(offset)?.store(value, order);
        Ok(())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // Safety: `base`/`len` describe a mapping we own; nothing can borrow
        // it past this point.
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
        if self.fd >= 0 {
            // Safety: the descriptor is ours and still open.
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

fn c_path(path: &Path) -> ShmemResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| ShmemError::BadPath {
        path: path.to_path_buf(),
    })
}
