//! Memory-access abstraction layer for a stack-unwinding library.
//!
//! Unwinding needs to read bytes at arbitrary addresses from many different
//! backing stores -- a running local process, a traced remote process, a
//! memory-mapped on-disk file (e.g. an ELF image), an in-RAM buffer, a
//! concatenation of disjoint offline snapshots, and range-windowed views
//! over any of those -- all behind one uniform read interface. Higher layers
//! (register unwinders, DWARF evaluators, symbol readers) treat every source
//! of bytes as an opaque address-indexed blob and never need to know
//! whether the bytes came from `ptrace`, `mmap`, or a test buffer.
//!
//! The trait at the center of all of this is [`Reader`]. Everything else in
//! this crate is either a way of obtaining one (the `create_*` functions
//! below) or a way of composing one out of another (`RangeReader`,
//! `RangesReader`, `SharedPageCache`, `ThreadPageCache`).
//!
//! This crate does not parse ELF, DWARF, or EH-frame data, does not do
//! symbol lookup, and does not configure a logging sink -- it only emits
//! [`log`] records for its own diagnostics, same as the rest of the stack it
//! plugs into.

mod buffer;
mod cache;
mod config;
mod error;
mod file;
mod offline;
mod range;
mod ranges;
mod reader;
mod remote;

pub use buffer::BufferReader;
pub use cache::{SharedPageCache, ThreadPageCache};
pub use config::{CACHE_PAGE, MAX_IOVECS_PER_CALL, MAX_SCRATCH_STRING};
pub use error::InitError;
pub use file::FileReader;
pub use offline::{OfflinePartsReader, OfflineReader};
pub use range::RangeReader;
pub use ranges::RangesReader;
pub use reader::Reader;
pub use remote::{LocalReader, RemoteReader};

use std::path::Path;
use std::sync::Arc;

/// Opens an `mmap`-backed window onto a file, or returns `None` if the file
/// can't be opened, can't be stat'd, the requested offset is beyond the end
/// of the file, or `mmap` itself refuses. The failure itself is logged by
/// [`FileReader::new`] at the point it occurs.
pub fn create_file_memory(path: impl AsRef<Path>, offset: u64, size: u64) -> Option<FileReader> {
    FileReader::new(&path, offset, size).ok()
}

/// Returns a reader over `pid`'s address space: a [`LocalReader`] if `pid`
/// is this process, otherwise a [`RemoteReader`].
pub fn create_process_memory(pid: u32) -> Box<dyn Reader + Send + Sync> {
    if pid == std::process::id() {
        Box::new(LocalReader::new())
    } else {
        Box::new(RemoteReader::new(pid))
    }
}

/// Like [`create_process_memory`], wrapped in a process-wide
/// [`SharedPageCache`].
pub fn create_process_memory_cached(
    pid: u32,
) -> SharedPageCache<Box<dyn Reader + Send + Sync>> {
    SharedPageCache::new(create_process_memory(pid))
}

/// Like [`create_process_memory`], wrapped in a per-thread
/// [`ThreadPageCache`].
pub fn create_process_memory_thread_cached(
    pid: u32,
) -> ThreadPageCache<Box<dyn Reader + Send + Sync>> {
    ThreadPageCache::new(create_process_memory(pid))
}

/// Builds a reader over an in-memory buffer with an explicit base address,
/// exposing `[start, end)`. `end` must be at least `start`; bytes beyond
/// `start + data.len()` within `[start, end)` are simply unavailable (reads
/// there return fewer bytes than requested, same as any other reader running
/// off the end of its backing store).
pub fn create_offline_memory(data: Arc<[u8]>, start: u64, end: u64) -> RangeReader {
    let buffer: Arc<dyn Reader + Send + Sync> = Arc::new(BufferReader::new(data));
    let length = end.saturating_sub(start);
    RangeReader::new(buffer, 0, length, start)
}
