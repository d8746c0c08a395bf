use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::range::RangeReader;
use crate::reader::Reader;

/// Dispatches reads to one of many [`RangeReader`]s, keyed by the exclusive
/// upper bound of each range's address interval.
///
/// Lookup picks the entry whose key is the smallest value strictly greater
/// than the requested address -- i.e. the range that could possibly contain
/// it -- and consults only that one. There is no splicing: a read that would
/// straddle two adjacent ranges is truncated to whichever range it started
/// in.
#[derive(Clone, Default)]
pub struct RangesReader {
    by_last_addr: BTreeMap<u64, RangeReader>,
}

impl RangesReader {
    pub fn new() -> Self {
        Self {
            by_last_addr: BTreeMap::new(),
        }
    }

    /// Registers `range`, keyed by its exclusive end address. Inserting a
    /// second range with the same end address overwrites the first, matching
    /// ordinary `BTreeMap` semantics.
    pub fn insert(&mut self, range: RangeReader) {
        self.by_last_addr.insert(range.end(), range);
    }

    fn range_for(&self, addr: u64) -> Option<&RangeReader> {
        self.by_last_addr
            .range((Excluded(addr), Unbounded))
            .next()
            .map(|(_, r)| r)
    }
}

impl Reader for RangesReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        match self.range_for(addr) {
            Some(range) => range.read(addr, dst),
            None => 0,
        }
    }
}
