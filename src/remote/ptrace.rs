//! Strategy B: word-at-a-time reads via `ptrace(PTRACE_PEEKTEXT, ...)`.
//!
//! Slower than `process_vm_readv` but available wherever `ptrace` attach is
//! permitted, which makes it the fallback when the vectored syscall is
//! unavailable (e.g. blocked by a seccomp policy).

use std::mem::size_of;

const WORD_SIZE: usize = size_of::<libc::c_long>();

/// Reads one word at `addr` via `PTRACE_PEEKTEXT`, disambiguating the
/// legitimate data value `-1` from a genuine error by checking `errno`.
fn peek_word(pid: libc::pid_t, addr: u64) -> Option<libc::c_long> {
    clear_errno();
    let value = unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKTEXT,
            pid,
            addr as *mut libc::c_void,
            std::ptr::null_mut::<libc::c_void>(),
        )
    };
    if value == -1 && errno() != 0 {
        return None;
    }
    Some(value)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn clear_errno() {
    unsafe { *libc::__errno_location() = 0 };
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn clear_errno() {}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Reads up to `dst.len()` bytes from `pid`'s address space starting at
/// `addr`, one machine word at a time.
pub(crate) fn read(pid: libc::pid_t, addr: u64, dst: &mut [u8]) -> usize {
    if dst.is_empty() {
        return 0;
    }

    let mut total = 0usize;
    let mut cursor = addr;

    let misalign = (cursor as usize) % WORD_SIZE;
    if misalign != 0 {
        let word_addr = cursor - misalign as u64;
        let word = match peek_word(pid, word_addr) {
            Some(w) => w,
            None => return 0,
        };
        let word_bytes = word.to_ne_bytes();
        let available = WORD_SIZE - misalign;
        let n = available.min(dst.len());
        dst[..n].copy_from_slice(&word_bytes[misalign..misalign + n]);
        total += n;
        cursor += n as u64;
    }

    while dst.len() - total >= WORD_SIZE {
        let word = match peek_word(pid, cursor) {
            Some(w) => w,
            None => return total,
        };
        dst[total..total + WORD_SIZE].copy_from_slice(&word.to_ne_bytes());
        total += WORD_SIZE;
        cursor += WORD_SIZE as u64;
    }

    let tail = dst.len() - total;
    if tail > 0 {
        let word = match peek_word(pid, cursor) {
            Some(w) => w,
            None => return total,
        };
        let word_bytes = word.to_ne_bytes();
        dst[total..total + tail].copy_from_slice(&word_bytes[..tail]);
        total += tail;
    }

    total
}
