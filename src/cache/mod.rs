//! Paged caching layers over a [`Reader`](crate::reader::Reader), for
//! amortizing syscalls when reads cluster around nearby addresses (the
//! common case during stack unwinding).

mod shared;
mod thread_local_cache;

pub use shared::SharedPageCache;
pub use thread_local_cache::ThreadPageCache;

use rustc_hash::FxHashMap;

use crate::config::CACHE_PAGE;
use crate::reader::Reader;

#[derive(Default)]
pub(crate) struct PageMap(FxHashMap<u64, Vec<u8>>);

impl PageMap {
    pub(crate) fn new() -> Self {
        Self(FxHashMap::default())
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// Fills the slot for `page` (of `page_size` bytes) by reading it in full
/// from `underlying`, if it isn't already cached. Returns `false` (and
/// evicts a half-filled entry) if the underlying read couldn't fill the
/// whole page.
fn ensure_page(pages: &mut PageMap, underlying: &dyn Reader, page: u64, page_size: u64) -> bool {
    if pages.0.contains_key(&page) {
        return true;
    }
    let mut slot = vec![0u8; page_size as usize];
    if underlying.read_fully(page * page_size, &mut slot) {
        pages.0.insert(page, slot);
        true
    } else {
        pages.0.remove(&page);
        false
    }
}

/// The shared implementation behind both [`SharedPageCache`] and
/// [`ThreadPageCache`]: look up (or fill) the page(s) covering `[addr, addr +
/// dst.len())` and copy out of them, falling back to an uncached read of
/// `underlying` whenever a page can't be filled.
///
/// No eviction happens except on fill failure -- the cache grows
/// monotonically. Unwinder traces touch a small, bounded working set, so
/// aging would cost more than it saves here.
///
/// `page_size` must be a power of two. Production callers always pass
/// [`CACHE_PAGE`]; tests exercise other geometries to check the
/// page-crossing logic independent of the production constant.
pub(crate) fn cached_read_with_page_size(
    pages: &mut PageMap,
    underlying: &dyn Reader,
    addr: u64,
    dst: &mut [u8],
    page_size: u64,
) -> usize {
    debug_assert!(page_size.is_power_of_two());
    if dst.is_empty() {
        return 0;
    }

    let shift = page_size.trailing_zeros();
    let mask = page_size - 1;

    let page = addr >> shift;
    if !ensure_page(pages, underlying, page, page_size) {
        return underlying.read(addr, dst);
    }

    let page_offset = addr & mask;
    let max_read = page_size - page_offset;

    if dst.len() as u64 <= max_read {
        let slot = &pages.0[&page];
        let n = dst.len();
        dst.copy_from_slice(&slot[page_offset as usize..page_offset as usize + n]);
        return n;
    }

    let first_chunk = max_read as usize;
    {
        let slot = &pages.0[&page];
        dst[..first_chunk].copy_from_slice(&slot[page_offset as usize..]);
    }

    let second_page = page + 1;
    let second_page_base = second_page << shift;
    let remaining = &mut dst[first_chunk..];
    if !ensure_page(pages, underlying, second_page, page_size) {
        // This coincides with `underlying.read(addr + max_read, remaining)`
        // because `second_page_base == addr + max_read` by construction of
        // `max_read`.
        return underlying.read(second_page_base, remaining) + first_chunk;
    }

    let slot = &pages.0[&second_page];
    remaining.copy_from_slice(&slot[..remaining.len()]);
    dst.len()
}

/// Production entry point: delegates to [`cached_read_with_page_size`] with
/// the crate's fixed cache granularity.
pub(crate) fn cached_read(
    pages: &mut PageMap,
    underlying: &dyn Reader,
    addr: u64,
    dst: &mut [u8],
) -> usize {
    cached_read_with_page_size(pages, underlying, addr, dst, CACHE_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferReader;
    use std::cell::Cell;

    struct CountingReader<'a> {
        inner: &'a BufferReader,
        reads: Cell<u32>,
    }

    impl Reader for CountingReader<'_> {
        fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(addr, dst)
        }
    }

    #[test]
    fn page_crossing_at_production_geometry() {
        // Invariant 9: CACHE_PAGE=1024, reading (addr=1020, size=8) returns
        // the concatenation of bytes 1020..1027, and both pages end up
        // cached.
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let underlying = BufferReader::new(data.clone());
        let mut pages = PageMap::new();

        let addr = CACHE_PAGE - 4;
        let mut dst = [0u8; 8];
        let n = cached_read(&mut pages, &underlying, addr, &mut dst);
        assert_eq!(n, 8);
        assert_eq!(&dst[..], &data[addr as usize..addr as usize + 8]);
        assert!(pages.0.contains_key(&0));
        assert!(pages.0.contains_key(&1));
    }

    #[test]
    fn single_page_read_does_not_touch_second_page() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let underlying = BufferReader::new(data.clone());
        let mut pages = PageMap::new();

        let mut dst = [0u8; 4];
        let n = cached_read(&mut pages, &underlying, 10, &mut dst);
        assert_eq!(n, 4);
        assert_eq!(&dst[..], &data[10..14]);
        assert_eq!(pages.0.len(), 1);
    }

    #[test]
    fn s6_page_crossing_at_small_geometry_hits_underlying_twice() {
        // S6: CACHE_PAGE=8, underlying buffer length 32, read(addr=6, size=4)
        // returns 4 with correct bytes; both page 0 and page 1 get cached;
        // underlying read-count == 2.
        let data: Vec<u8> = (0..32u32).map(|i| i as u8).collect();
        let buffer = BufferReader::new(data.clone());
        let counting = CountingReader {
            inner: &buffer,
            reads: Cell::new(0),
        };
        let mut pages = PageMap::new();

        let mut dst = [0u8; 4];
        let n = cached_read_with_page_size(&mut pages, &counting, 6, &mut dst, 8);
        assert_eq!(n, 4);
        assert_eq!(dst, [6, 7, 8, 9]);
        assert!(pages.0.contains_key(&0));
        assert!(pages.0.contains_key(&1));
        assert_eq!(counting.reads.get(), 2);
    }
}
