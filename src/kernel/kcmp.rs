//! `kcmp(2)` wrapper: compare whether two processes share a kernel resource.
//!
//! Returns 0 when the two resources are the same kernel object, 1/2 for a
//! stable ordering when they differ. Requires a kernel built with
//! checkpoint/restore support.

use libc::{c_int, c_long};
use nix::errno::Errno;
use nix::unistd::Pid;

/// Kernel resource classes that can be compared across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KcmpResource {
    File = 0,
    Vm = 1,
    Files = 2,
    Fs = 3,
    Sighand = 4,
    Io = 5,
    Sysvsem = 6,
}

// One past the last valid resource class; used to probe rejection of
// unknown classes.
pub(crate) const KCMP_TYPES: c_int = 8;

fn sys_kcmp(pid1: Pid, pid2: Pid, kind: c_int, idx1: u64, idx2: u64) -> c_long {
    // SAFETY: kcmp takes integer arguments only.
    unsafe {
        libc::syscall(
            libc::SYS_kcmp,
            pid1.as_raw(),
            pid2.as_raw(),
            kind,
            idx1,
            idx2,
        )
    }
}

/// Raw comparison with an arbitrary resource class number. Used to probe
/// how the kernel treats invalid classes.
pub fn compare_raw(
    pid1: Pid,
    pid2: Pid,
    kind: c_int,
    idx1: u64,
    idx2: u64,
) -> std::result::Result<i32, Errno> {
    let rc = sys_kcmp(pid1, pid2, kind, idx1, idx2);
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(rc as i32)
    }
}

/// Compare one resource class across two processes. For `File` the indices
/// are the file descriptors to compare; other classes ignore them.
pub fn compare(
    pid1: Pid,
    pid2: Pid,
    resource: KcmpResource,
    idx1: u64,
    idx2: u64,
) -> std::result::Result<i32, Errno> {
    compare_raw(pid1, pid2, resource as c_int, idx1, idx2)
}

/// Whether this kernel implements kcmp at all.
pub fn is_supported() -> bool {
    let pid = nix::unistd::getpid();
    match compare(pid, pid, KcmpResource::Vm, 0, 0) {
        Ok(_) => true,
        Err(errno) => errno != Errno::ENOSYS,
    }
}
