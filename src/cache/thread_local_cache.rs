use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use super::{cached_read, PageMap};
use crate::reader::Reader;

thread_local! {
    // Keyed by the cache instance's id (see `NEXT_ID` below), so that several
    // `ThreadPageCache`s can coexist on one thread without sharing pages.
    // Rust's `thread_local!` already runs `Drop` for this map when the
    // thread exits, which is the safe-Rust equivalent of the destructor a
    // manually-managed TLS key would need to register.
    static PER_THREAD: RefCell<FxHashMap<u64, PageMap>> = RefCell::new(FxHashMap::default());
}

/// Source of per-instance identities for [`ThreadPageCache`]. A plain
/// pointer-address identity would be reused once a `ThreadPageCache` is
/// dropped and its memory recycled, letting a brand new instance collide
/// with -- and silently inherit -- a stale entry left behind by an old one.
/// A monotonically increasing counter never repeats.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A [`Reader`] wrapper that caches pages in a cache private to each
/// accessing thread.
///
/// Unlike [`SharedPageCache`](super::SharedPageCache), there's no
/// synchronization here at all: each thread only ever touches its own
/// entry, so no lock is needed, and no thread ever observes another
/// thread's cached pages.
pub struct ThreadPageCache<R> {
    underlying: R,
    id: u64,
}

impl<R: Reader> ThreadPageCache<R> {
    pub fn new(underlying: R) -> Self {
        Self {
            underlying,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn key(&self) -> u64 {
        self.id
    }

    /// Drops every page this cache has accumulated on the *calling* thread.
    /// Other threads' entries for this same cache are untouched.
    pub fn clear(&self) {
        PER_THREAD.with(|cell| {
            if let Some(pages) = cell.borrow_mut().get_mut(&self.key()) {
                pages.clear();
            }
        });
    }
}

impl<R: Reader> Reader for ThreadPageCache<R> {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        PER_THREAD.with(|cell| {
            let mut map = cell.borrow_mut();
            let pages = map.entry(self.key()).or_insert_with(PageMap::new);
            cached_read(pages, &self.underlying, addr, dst)
        })
    }
}

impl<R> Drop for ThreadPageCache<R> {
    /// Removes this instance's entry from the calling thread's cache. This
    /// only reaches the entry on the thread that drops the value; entries
    /// left behind on other threads that once called `read`/`clear` on this
    /// same instance are reclaimed when those threads exit (via
    /// `thread_local!`'s own destructor), not here.
    fn drop(&mut self) {
        PER_THREAD.with(|cell| {
            cell.borrow_mut().remove(&self.key());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferReader;
    use std::thread;

    #[test]
    fn caches_pages_per_thread_without_cross_talk() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let cache = ThreadPageCache::new(BufferReader::new(data.clone()));

        let mut dst = [0u8; 4];
        let n = cache.read(100, &mut dst);
        assert_eq!(n, 4);
        assert_eq!(&dst[..], &data[100..104]);

        // A second thread sharing the same cache by reference sees correct
        // data too, and doesn't blow up from touching another thread's slot.
        thread::scope(|s| {
            s.spawn(|| {
                let mut dst = [0u8; 4];
                let n = cache.read(2000, &mut dst);
                assert_eq!(n, 4);
                assert_eq!(&dst[..], &data[2000..2004]);
            });
        });
    }

    #[test]
    fn clear_only_touches_calling_threads_pages() {
        let cache = ThreadPageCache::new(BufferReader::new(vec![1u8; 4096]));
        let mut dst = [0u8; 4];
        cache.read(0, &mut dst);
        cache.clear();
        PER_THREAD.with(|cell| {
            let map = cell.borrow();
            if let Some(pages) = map.get(&cache.key()) {
                assert!(pages.0.is_empty());
            }
        });
    }

    #[test]
    fn dropping_a_cache_removes_its_entry_from_the_calling_thread() {
        let cache = ThreadPageCache::new(BufferReader::new(vec![1u8; 4096]));
        let mut dst = [0u8; 4];
        cache.read(0, &mut dst);
        let key = cache.key();
        drop(cache);
        PER_THREAD.with(|cell| {
            assert!(!cell.borrow().contains_key(&key));
        });
    }

    #[test]
    fn fresh_instance_does_not_inherit_a_dropped_instances_pages() {
        // Guards against the address-reuse collision: a new instance must
        // never see pages cached by an old, already-dropped instance, even
        // if the old instance's id were (hypothetically) reused.
        let data_a: Vec<u8> = vec![0xAA; 4096];
        let cache_a = ThreadPageCache::new(BufferReader::new(data_a));
        let mut dst = [0u8; 4];
        cache_a.read(0, &mut dst);
        assert_eq!(dst, [0xAA, 0xAA, 0xAA, 0xAA]);
        drop(cache_a);

        let data_b: Vec<u8> = vec![0xBB; 4096];
        let cache_b = ThreadPageCache::new(BufferReader::new(data_b));
        let mut dst = [0u8; 4];
        let n = cache_b.read(0, &mut dst);
        assert_eq!(n, 4);
        assert_eq!(dst, [0xBB, 0xBB, 0xBB, 0xBB]);
    }
}
