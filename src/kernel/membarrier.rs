//! `membarrier(2)` wrapper.

use libc::c_int;
use nix::errno::Errno;

/// Commands understood by the syscall. `Query` returns a bitmask of the
/// supported commands; `Global` issues a memory barrier across all threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Command {
    Query = 0,
    Global = 1,
}

/// Issue the syscall with arbitrary command and flag values. The harness
/// uses out-of-range values to probe rejection semantics.
pub fn call_raw(cmd: c_int, flags: c_int) -> std::result::Result<i32, Errno> {
    // SAFETY: integer-only syscall.
    let rc = unsafe { libc::syscall(libc::SYS_membarrier, cmd, flags) };
    if rc < 0 {
        Err(Errno::last())
    } else {
        Ok(rc as i32)
    }
}

/// Issue a known command with no flags.
pub fn call(cmd: Command) -> std::result::Result<i32, Errno> {
    call_raw(cmd as c_int, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_values_match_the_kernel_abi() {
        assert_eq!(Command::Query as c_int, 0);
        assert_eq!(Command::Global as c_int, 1);
    }
}
