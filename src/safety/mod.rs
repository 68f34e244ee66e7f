//! Safety and cleanup
//!
//! Tracks live kernel queues so an aborting run can destroy them before
//! exiting. Each queue has exactly one owner at a time; the ledger is that
//! ownership record.

use std::io::Write;

use crate::kernel::msgque::{self, QueueId};
use crate::report::TapReporter;

/// Ledger of queues created by the current run and not yet destroyed.
///
/// Recorded immediately after successful creation, removed once a destroy
/// has been attempted. Abort cleanup walks the entries in reverse creation
/// order with a single destroy attempt each; failures become additional
/// failing assertions but never change the already-determined outcome.
#[derive(Default)]
pub struct QueueLedger {
    live: Vec<QueueId>,
}

impl QueueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a queue right after its creation succeeded.
    pub fn record(&mut self, id: QueueId) {
        log::debug!("ledger: queue {} is live", id.raw());
        self.live.push(id);
    }

    /// Drop a queue whose destruction has been attempted.
    pub fn remove(&mut self, id: QueueId) {
        self.live.retain(|live| *live != id);
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Destroy every still-live queue, best-effort, reporting each attempt.
    pub fn abort_cleanup<W: Write>(&mut self, report: &mut TapReporter<W>) {
        for id in self.live.drain(..).rev() {
            match msgque::remove(id) {
                Ok(()) => report.ok(&format!("cleaned up queue {}", id.raw())),
                Err(e) => report.not_ok(&format!("clean up queue {}: {e}", id.raw())),
            }
        }
    }
}
