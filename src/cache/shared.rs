use parking_lot::Mutex;

use super::{cached_read, PageMap};
use crate::reader::Reader;

/// A [`Reader`] wrapper that caches pages in a process-wide map guarded by a
/// single mutex.
///
/// The lock is held for the entire duration of each `read` call. This is
/// coarse on purpose: the design target is a single reader per process, and
/// the lock exists to make occasional concurrent access *safe*, not to make
/// it *fast*. Concurrent readers on the same addresses are guaranteed to see
/// bytewise-identical results to the uncached reader; they are not
/// guaranteed to scale.
pub struct SharedPageCache<R> {
    underlying: R,
    pages: Mutex<PageMap>,
}

impl<R: Reader> SharedPageCache<R> {
    pub fn new(underlying: R) -> Self {
        Self {
            underlying,
            pages: Mutex::new(PageMap::new()),
        }
    }

    /// Drops every cached page.
    pub fn clear(&self) {
        self.pages.lock().clear();
    }
}

impl<R: Reader> Reader for SharedPageCache<R> {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        let mut pages = self.pages.lock();
        cached_read(&mut pages, &self.underlying, addr, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferReader;
    use std::sync::Arc;
    use std::thread;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn is_send_and_sync() {
        assert_send_sync::<SharedPageCache<BufferReader>>();
    }

    #[test]
    fn concurrent_reads_match_uncached_reader() {
        let data: Vec<u8> = (0..8192u32).map(|i| (i % 256) as u8).collect();
        let underlying = BufferReader::new(data.clone());
        let cache = Arc::new(SharedPageCache::new(underlying.clone()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let data = data.clone();
                thread::spawn(move || {
                    for i in 0..200u64 {
                        let addr = (t as u64 * 37 + i * 13) % 8000;
                        let mut got = [0u8; 16];
                        let n = cache.read(addr, &mut got);
                        assert_eq!(n, 16);
                        assert_eq!(&got[..], &data[addr as usize..addr as usize + 16]);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn clear_drops_cached_pages() {
        let underlying = BufferReader::new(vec![1u8; 4096]);
        let cache = SharedPageCache::new(underlying);
        let mut dst = [0u8; 4];
        cache.read(0, &mut dst);
        assert!(!cache.pages.lock().0.is_empty());
        cache.clear();
        assert!(cache.pages.lock().0.is_empty());
    }
}
