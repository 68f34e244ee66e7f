//! The privileged next-id override channel.
//!
//! `/proc/sys/kernel/msg_next_id` sets the id the kernel will assign to the
//! next created message queue. It is global, system-wide mutable state: any
//! concurrent queue creator can steal the forced id between the write and the
//! recreate. Exclusive execution is a documented precondition, not something
//! enforced here. Writing requires elevated privilege and a kernel built with
//! checkpoint/restore support.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::types::{HarnessError, Result};
use crate::kernel::msgque::QueueId;

/// Control file that sets the next allocated queue id.
pub const MSG_NEXT_ID: &str = "/proc/sys/kernel/msg_next_id";

/// Whether this kernel exposes the override channel at all. Absent means the
/// kernel was built without checkpoint/restore support and there is nothing
/// for the engine to validate.
pub fn is_supported() -> bool {
    Path::new(MSG_NEXT_ID).exists()
}

/// Force the next allocated queue id to `id` by writing its decimal form.
/// A write of a non-matching byte count is an error.
pub fn force_next_id(id: QueueId) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(MSG_NEXT_ID)
        .map_err(|e| HarnessError::ForceIdentity(format!("open {MSG_NEXT_ID}: {e}")))?;

    let value = id.raw().to_string();
    let written = file
        .write(value.as_bytes())
        .map_err(|e| HarnessError::ForceIdentity(format!("write {MSG_NEXT_ID}: {e}")))?;
    if written != value.len() {
        return Err(HarnessError::ForceIdentity(format!(
            "short write to {MSG_NEXT_ID}: {written} of {} bytes",
            value.len()
        )));
    }
    log::debug!("forced next queue id to {}", id.raw());
    Ok(())
}
