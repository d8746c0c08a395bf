use std::path::Path;
use std::sync::Arc;

use byteorder::{NativeEndian, ReadBytesExt};

use crate::error::InitError;
use crate::file::FileReader;
use crate::range::RangeReader;
use crate::reader::Reader;

/// A [`Reader`] over an offline memory snapshot file.
///
/// The snapshot file's first 8 bytes record the original base address
/// (native byte order); the remainder is raw captured bytes, with the byte
/// at file offset `8 + k` exposed at logical address `start + k`.
pub struct OfflineReader {
    range: RangeReader,
}

impl OfflineReader {
    /// Opens the snapshot file at `path` starting at byte `offset`, parses
    /// its header, and constructs the rebased view over the remaining bytes.
    pub fn new(path: impl AsRef<Path>, offset: u64) -> Result<Self, InitError> {
        let path = path.as_ref();
        let header_and_body = FileReader::new(path, offset, u64::MAX)?;
        let filesize = header_and_body.len();
        if filesize < 8 {
            let err = InitError::TruncatedOfflineHeader { len: filesize };
            log::warn!("OfflineReader::new({path:?}): {err}");
            return Err(err);
        }

        let mut header = [0u8; 8];
        if !header_and_body.read_fully(0, &mut header) {
            let err = InitError::TruncatedOfflineHeader { len: filesize };
            log::warn!("OfflineReader::new({path:?}): {err}");
            return Err(err);
        }
        let start = (&header[..]).read_u64::<NativeEndian>().unwrap();

        let file: Arc<dyn Reader + Send + Sync> = Arc::new(header_and_body);
        let range = RangeReader::new(file, 8, filesize - 8, start);
        Ok(Self { range })
    }
}

impl Reader for OfflineReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        self.range.read(addr, dst)
    }
}

/// Tries an ordered list of [`OfflineReader`]s, returning the first one that
/// transfers any bytes.
///
/// No splicing is attempted: a read that starts in one part and would
/// continue into the next is **not** stitched together. Callers that issue a
/// read spanning two adjacent parts only get the first part's contribution
/// back and must reissue at the boundary.
#[derive(Default)]
pub struct OfflinePartsReader {
    parts: Vec<OfflineReader>,
}

impl OfflinePartsReader {
    pub fn new(parts: Vec<OfflineReader>) -> Self {
        Self { parts }
    }

    pub fn push(&mut self, part: OfflineReader) {
        self.parts.push(part);
    }
}

impl Reader for OfflinePartsReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        for part in &self.parts {
            let n = part.read(addr, dst);
            if n != 0 {
                return n;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn snapshot_file(start: u64, body: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&start.to_ne_bytes()).unwrap();
        f.write_all(body).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn exposes_body_rebased_to_header_start() {
        // S3: file = u64(0x2000) then bytes 0x00..0x0F.
        let body: Vec<u8> = (0u8..16).collect();
        let f = snapshot_file(0x2000, &body);
        let reader = OfflineReader::new(f.path(), 0).unwrap();

        let mut dst = [0u8; 4];
        let n = reader.read(0x2004, &mut dst);
        assert_eq!(n, 4);
        assert_eq!(dst, [0x04, 0x05, 0x06, 0x07]);

        assert_eq!(reader.read(0x1FFF, &mut dst[..1]), 0);
    }

    #[test]
    fn truncated_header_fails() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[1, 2, 3]).unwrap();
        f.flush().unwrap();
        let err = OfflineReader::new(f.path(), 0);
        assert!(matches!(err, Err(InitError::TruncatedOfflineHeader { .. })));
    }

    #[test]
    fn parts_reader_returns_first_non_zero_part_without_splicing() {
        let part_a = OfflineReader::new(snapshot_file(0x1000, b"AAAA").path(), 0).unwrap();
        let part_b = OfflineReader::new(snapshot_file(0x1004, b"BBBB").path(), 0).unwrap();
        let parts = OfflinePartsReader::new(vec![part_a, part_b]);

        let mut dst = [0u8; 8];
        // A read spanning both parts only gets part A's contribution.
        let n = parts.read(0x1000, &mut dst);
        assert_eq!(n, 4);
        assert_eq!(&dst[..4], b"AAAA");
    }
}
