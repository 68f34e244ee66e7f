//! Identity-forced queue recreation and replay.
//!
//! Forcing the id is the crux of checkpoint/restore fidelity: consumers of
//! the original queue reference it by kernel id, so a restore that silently
//! allocates a different id breaks every existing reference.

use std::io::Write;

use crate::config::types::{HarnessError, Result};
use crate::kernel::msgque::{self, QueueId};
use crate::kernel::next_id;
use crate::report::TapReporter;
use crate::checkpoint::snapshot::QueueSnapshot;

/// Force the kernel's next-allocated-id counter to the snapshot's id.
pub fn force_identity<W: Write>(report: &mut TapReporter<W>, id: QueueId) -> Result<()> {
    match next_id::force_next_id(id) {
        Ok(()) => {
            report.ok("forced next queue id");
            Ok(())
        }
        Err(e) => {
            report.not_ok(&format!("force next queue id: {e}"));
            Err(e)
        }
    }
}

/// Recreate the queue under the snapshot's key and assert it received the
/// snapshot's id, then replay every captured message in order.
///
/// An id mismatch or replay failure destroys the freshly created queue
/// before propagating; the caller must already have destroyed any prior
/// instance under the same key.
pub fn recreate_and_replay<W: Write>(
    report: &mut TapReporter<W>,
    snapshot: &QueueSnapshot,
) -> Result<QueueId> {
    let id = match msgque::create_exclusive(snapshot.key, snapshot.mode) {
        Ok(id) => {
            report.ok("recreated queue under checkpointed key");
            id
        }
        Err(e) => {
            report.not_ok(&format!("recreate queue: {e}"));
            return Err(e);
        }
    };

    if id != snapshot.id {
        report.not_ok(&format!(
            "restored queue id {} does not match checkpointed id {}",
            id.raw(),
            snapshot.id.raw()
        ));
        destroy_after_failure(report, id);
        return Err(HarnessError::IdentityMismatch {
            expected: snapshot.id.raw(),
            actual: id.raw(),
        });
    }
    report.ok("restored queue id matches checkpoint");

    for (index, message) in snapshot.messages.iter().enumerate() {
        if let Err(e) = msgque::send(id, message) {
            report.not_ok(&format!("replay message {index}: {e}"));
            destroy_after_failure(report, id);
            return Err(HarnessError::Replay {
                index,
                source: Box::new(e),
            });
        }
    }
    report.ok(&format!("replayed {} messages", snapshot.messages.len()));

    Ok(id)
}

/// The complete restore operation: force identity, recreate, replay.
pub fn restore_queue<W: Write>(
    report: &mut TapReporter<W>,
    snapshot: &QueueSnapshot,
) -> Result<QueueId> {
    force_identity(report, snapshot.id)?;
    recreate_and_replay(report, snapshot)
}

fn destroy_after_failure<W: Write>(report: &mut TapReporter<W>, id: QueueId) {
    match msgque::remove(id) {
        Ok(()) => report.ok("destroyed queue after failed restore"),
        Err(e) => report.not_ok(&format!("destroy queue after failed restore: {e}")),
    }
}
