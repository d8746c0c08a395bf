//! Named constants that would otherwise be magic numbers scattered through
//! the reader implementations.

/// Granularity of the page cache, in bytes. This is a cache-line size chosen
/// by this crate; it has no relationship to the OS's own page size (see
/// [`crate::file::os_page_size`] for that).
pub const CACHE_PAGE: u64 = 1024;

/// Number of trailing zero bits in [`CACHE_PAGE`]. `CACHE_PAGE` must stay a
/// power of two for the shift-based indexing in the cache to be valid.
pub const CACHE_PAGE_SHIFT: u32 = CACHE_PAGE.trailing_zeros();

/// Bytes below the cached page that belong to it (`CACHE_PAGE - 1`).
pub const CACHE_PAGE_MASK: u64 = CACHE_PAGE - 1;

/// Maximum number of source iovecs batched into a single `process_vm_readv`
/// call. The kernel accepts more, but batching keeps each syscall's blast
/// radius (in case of a partial transfer) small and bounded.
pub const MAX_IOVECS_PER_CALL: usize = 64;

/// Size of the on-stack scratch buffer used by `Reader::read_string` before
/// it falls back to a heap allocation sized to the exact string length.
pub const MAX_SCRATCH_STRING: usize = 256;

const _: () = assert!(CACHE_PAGE.is_power_of_two());
