//! Strategy A: a single batched `process_vm_readv` call per chunk of iovecs.
//!
//! Only available where the kernel implements the syscall (Linux and
//! Android); gated by the caller.

use crate::config::MAX_IOVECS_PER_CALL;
use crate::file::os_page_size;

/// Reads up to `dst.len()` bytes from `pid`'s address space starting at
/// `addr`, using `process_vm_readv`.
///
/// The request is split into per-page iovecs (at most
/// [`MAX_IOVECS_PER_CALL`] per syscall) so that a partial transfer -- which
/// the kernel only ever does at iovec granularity -- is localized to a
/// single page rather than smearing across the whole request.
pub(crate) fn read(pid: libc::pid_t, addr: u64, dst: &mut [u8]) -> usize {
    if dst.is_empty() {
        return 0;
    }

    let page_size = os_page_size();
    let mut total = 0usize;
    let mut cursor = addr;

    while total < dst.len() {
        let mut remote_iovs: Vec<libc::iovec> = Vec::with_capacity(MAX_IOVECS_PER_CALL);
        let mut batch_len: usize = 0;

        while remote_iovs.len() < MAX_IOVECS_PER_CALL && batch_len < dst.len() - total {
            if cursor >= usize::MAX as u64 {
                break;
            }
            let misalign = cursor & (page_size - 1);
            let to_page_end = page_size - misalign;
            let remaining = (dst.len() - total - batch_len) as u64;
            let len = to_page_end.min(remaining);
            if len == 0 {
                break;
            }
            let next_cursor = match cursor.checked_add(len) {
                Some(c) => c,
                None => break,
            };
            remote_iovs.push(libc::iovec {
                iov_base: cursor as usize as *mut libc::c_void,
                iov_len: len as usize,
            });
            batch_len += len as usize;
            cursor = next_cursor;
        }

        if remote_iovs.is_empty() {
            break;
        }

        let local_iov = libc::iovec {
            iov_base: dst[total..total + batch_len].as_mut_ptr() as *mut libc::c_void,
            iov_len: batch_len,
        };

        let rc = unsafe {
            libc::process_vm_readv(
                pid,
                &local_iov as *const libc::iovec,
                1,
                remote_iovs.as_ptr(),
                remote_iovs.len() as libc::c_ulong,
                0,
            )
        };

        if rc < 0 {
            break;
        }
        let rc = rc as usize;
        total += rc;
        if rc < batch_len {
            // Partial transfer: the kernel stopped at some iovec boundary.
            // Don't keep retrying past where it actually got to.
            break;
        }
    }

    total
}
