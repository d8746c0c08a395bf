use std::path::PathBuf;

/// Failure modes of the fallible constructors in this crate.
///
/// Per-read failures are never represented here: a read that cannot make
/// progress simply returns fewer bytes than requested (possibly zero). This
/// enum only covers initialization, where "it didn't work" needs a reason a
/// caller can log or match on.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("offset {offset} is beyond the end of {path:?} ({len} bytes)")]
    OffsetBeyondEnd {
        path: PathBuf,
        offset: u64,
        len: u64,
    },

    #[error("failed to mmap {path:?}: {source}")]
    Mmap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("offline snapshot header is missing or truncated (file is only {len} bytes, need at least 8)")]
    TruncatedOfflineHeader { len: u64 },
}
