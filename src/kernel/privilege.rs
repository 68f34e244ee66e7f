//! Process privilege probes.

use nix::unistd::Uid;

/// Whether the process runs as root. The engine requires it; absence is a
/// failing assertion, not a skip.
pub fn is_root() -> bool {
    Uid::current().is_root()
}
