use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::{Mmap, MmapOptions};

use crate::error::InitError;
use crate::reader::Reader;

/// Returns the OS virtual-memory page size, queried once per process and
/// cached afterwards.
///
/// This is unrelated to [`crate::config::CACHE_PAGE`], which is a cache
/// granularity this crate picks for itself.
pub fn os_page_size() -> u64 {
    static PAGE_SIZE: OnceLock<u64> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        #[cfg(unix)]
        {
            let rc = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if rc > 0 {
                return rc as u64;
            }
        }
        4096
    })
}

/// A [`Reader`] backed by an `mmap`-ed window of a file on disk.
///
/// Because `mmap` requires a page-aligned offset, `FileReader` maps starting
/// at `offset` rounded down to the nearest OS page and remembers the
/// sub-page remainder (`sub`). Logical address `0` always corresponds to the
/// byte at file offset `offset`, regardless of alignment.
pub struct FileReader {
    mmap: Mmap,
    /// Offset of the first logical byte within `mmap`.
    sub: usize,
    /// Logical size, i.e. `mmap.len() - sub`.
    size: u64,
}

impl FileReader {
    /// Maps up to `size` bytes of `path`, starting at file offset `offset`.
    ///
    /// Fails if the file can't be opened or stat'd, if `offset` is at or
    /// beyond the end of the file, or if `mmap` itself refuses.
    pub fn new(path: impl AsRef<Path>, offset: u64, size: u64) -> Result<Self, InitError> {
        let path: PathBuf = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|source| {
            let err = InitError::Io {
                path: path.clone(),
                source,
            };
            log::warn!("FileReader::new({path:?}): {err}");
            err
        })?;
        let filesize = file
            .metadata()
            .map_err(|source| {
                let err = InitError::Io {
                    path: path.clone(),
                    source,
                };
                log::warn!("FileReader::new({path:?}): {err}");
                err
            })?
            .len();

        if offset >= filesize {
            let err = InitError::OffsetBeyondEnd {
                path,
                offset,
                len: filesize,
            };
            log::warn!("FileReader::new: {err}");
            return Err(err);
        }

        let page = os_page_size();
        let aligned = offset & !(page - 1);
        let sub = (offset - aligned) as usize;

        let mut mapped_len = filesize - aligned;
        if let Some(requested) = size.checked_add(sub as u64) {
            if requested < mapped_len {
                mapped_len = requested;
            }
        }

        let mmap = unsafe {
            MmapOptions::new()
                .offset(aligned)
                .len(mapped_len as usize)
                .map(&file)
        }
        .map_err(|source| {
            let err = InitError::Mmap {
                path: path.clone(),
                source,
            };
            log::warn!("FileReader::new({path:?}): {err}");
            err
        })?;

        // The fd isn't needed once the mapping exists; dropping `file` here
        // makes that explicit, though `mmap` itself keeps the pages alive.
        drop(file);

        let logical_size = mapped_len - sub as u64;
        Ok(Self {
            mmap,
            sub,
            size: logical_size,
        })
    }

    /// Length of the exposed (logical, post-alignment) address space.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn data(&self) -> &[u8] {
        &self.mmap[self.sub..]
    }
}

impl Reader for FileReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        let size = self.size;
        if addr >= size {
            return 0;
        }
        let available = (size - addr) as usize;
        let n = dst.len().min(available);
        let data = self.data();
        dst[..n].copy_from_slice(&data[addr as usize..addr as usize + n]);
        n
    }
}
