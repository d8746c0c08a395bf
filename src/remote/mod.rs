//! Reading another process's (or, for [`LocalReader`], this process's own)
//! virtual memory.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod ptrace;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod vm_readv;

use std::sync::atomic::{AtomicU8, Ordering};

use crate::reader::Reader;

const STRATEGY_UNSET: u8 = 0;
const STRATEGY_VM_READV: u8 = 1;
const STRATEGY_PTRACE: u8 = 2;

/// Reads another process's address space, picking between two kernel
/// mechanisms and sticking with whichever one works.
///
/// The first successful read latches the reader onto that strategy for the
/// rest of its lifetime: `process_vm_readv` may be unavailable under a
/// sandboxing policy, but if it works once it works forever for this
/// process, so there's no point re-probing on every call.
pub struct RemoteReader {
    pid: libc::pid_t,
    strategy: AtomicU8,
}

impl RemoteReader {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: pid as libc::pid_t,
            strategy: AtomicU8::new(STRATEGY_UNSET),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid as u32
    }

    fn address_in_range(addr: u64) -> bool {
        #[cfg(target_pointer_width = "32")]
        {
            addr <= u32::MAX as u64
        }
        #[cfg(not(target_pointer_width = "32"))]
        {
            let _ = addr;
            true
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn try_vm_readv(&self, addr: u64, dst: &mut [u8]) -> usize {
        vm_readv::read(self.pid, addr, dst)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn try_vm_readv(&self, _addr: u64, _dst: &mut [u8]) -> usize {
        0
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn try_ptrace(&self, addr: u64, dst: &mut [u8]) -> usize {
        ptrace::read(self.pid, addr, dst)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn try_ptrace(&self, _addr: u64, _dst: &mut [u8]) -> usize {
        0
    }
}

impl Reader for RemoteReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        if dst.is_empty() || !Self::address_in_range(addr) {
            return 0;
        }

        match self.strategy.load(Ordering::Acquire) {
            STRATEGY_VM_READV => return self.try_vm_readv(addr, dst),
            STRATEGY_PTRACE => return self.try_ptrace(addr, dst),
            _ => {}
        }

        let n = self.try_vm_readv(addr, dst);
        if n > 0 {
            if self.strategy.load(Ordering::Acquire) == STRATEGY_UNSET {
                log::debug!(
                    "RemoteReader(pid={}): latching onto process_vm_readv",
                    self.pid
                );
            }
            self.strategy.store(STRATEGY_VM_READV, Ordering::Release);
            return n;
        }

        let n = self.try_ptrace(addr, dst);
        if n > 0 {
            if self.strategy.load(Ordering::Acquire) == STRATEGY_UNSET {
                log::debug!("RemoteReader(pid={}): latching onto ptrace", self.pid);
            }
            self.strategy.store(STRATEGY_PTRACE, Ordering::Release);
            return n;
        }

        n
    }

    fn read_fully(&self, addr: u64, dst: &mut [u8]) -> bool {
        let mut done = 0;
        while done < dst.len() {
            let n = self.read(addr + done as u64, &mut dst[done..]);
            if n == 0 {
                return false;
            }
            done += n;
        }
        true
    }
}

/// Reads the current process's own address space.
///
/// Tries `process_vm_readv` targeting our own pid first (cheaper than a
/// syscall-free direct read in some configurations, and uniform with
/// [`RemoteReader`]'s strategy); if that transfers nothing and the request
/// was non-empty, falls back to a direct dereference of `addr`. Unlike
/// `RemoteReader`, this fallback is attempted on every call -- there's no
/// latch, since the direct-dereference path is already as cheap as it gets.
pub struct LocalReader {
    pid: libc::pid_t,
}

impl LocalReader {
    pub fn new() -> Self {
        Self {
            pid: std::process::id() as libc::pid_t,
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn try_vm_readv(&self, addr: u64, dst: &mut [u8]) -> usize {
        vm_readv::read(self.pid, addr, dst)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn try_vm_readv(&self, _addr: u64, _dst: &mut [u8]) -> usize {
        0
    }

    /// # Safety contract (documented, not enforced)
    ///
    /// This performs a raw read from `addr` on the assumption that the
    /// caller already knows the address is mapped in this process (e.g. it
    /// came from parsing this process's own stack or a loaded image). If the
    /// assumption is wrong, this will segfault rather than return an error --
    /// there is no portable way to probe "is this address mapped" short of
    /// catching the fault, which this crate does not do.
    fn direct_read(&self, addr: u64, dst: &mut [u8]) -> usize {
        if addr == 0 {
            return 0;
        }
        unsafe {
            let src = addr as *const u8;
            std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len());
        }
        dst.len()
    }
}

impl Default for LocalReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for LocalReader {
    fn read(&self, addr: u64, dst: &mut [u8]) -> usize {
        if dst.is_empty() {
            return 0;
        }
        let n = self.try_vm_readv(addr, dst);
        if n > 0 {
            return n;
        }
        self.direct_read(addr, dst)
    }
}
