//! Orchestration of the checkpoint/restore verification run.
//!
//! Sequential, single-pass, fully synchronous: every kernel call is
//! non-blocking, so each step either completes or fails immediately. Any
//! failure short-circuits to best-effort cleanup of still-live queues,
//! a bail-out, the plan line, and the fail exit code.

use std::io::Write;

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::checkpoint::drain::verify_and_destroy;
use crate::checkpoint::restore;
use crate::checkpoint::snapshot::snapshot_queue;
use crate::config::types::{MsgqueConfig, Result};
use crate::kernel::msgque::{self, Message};
use crate::kernel::{next_id, privilege};
use crate::report::{Outcome, TapReporter};
use crate::safety::QueueLedger;

/// Type tag of the first fixture message.
pub const FIRST_MSG_TYPE: i64 = 1;
/// Type tag of the second fixture message; large enough to catch truncation
/// of the type field.
pub const SECOND_MSG_TYPE: i64 = 26538;

/// The fixture messages enqueued into the fresh queue.
pub fn fill_messages() -> Result<Vec<Message>> {
    Ok(vec![
        Message::new(FIRST_MSG_TYPE, &b"Test sysv5 msg"[..])?,
        Message::new(SECOND_MSG_TYPE, &b"Yet another test sysv5 msg"[..])?,
    ])
}

/// Progress of a run. Terminal states are `Verified2` (success), `Failed`,
/// and `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    KeyDerived,
    Created,
    Filled,
    SnapshotTaken,
    Verified1,
    IdentityForced,
    Restored,
    Verified2,
    Failed,
    Skipped,
}

/// Drives the capture/destroy/restore/verify sequence and owns the snapshot
/// and the live queue handles for its duration.
pub struct CheckpointEngine {
    config: MsgqueConfig,
    run_id: Uuid,
}

impl CheckpointEngine {
    pub fn new(config: MsgqueConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Run the full verification sequence, emitting one TAP line per
    /// assertion and returning the overall outcome.
    pub fn run<W: Write>(&self, report: &mut TapReporter<W>) -> Outcome {
        report.version();
        info!("queue checkpoint/restore run {} starting", self.run_id);

        let mut state = RunState::Start;

        // Feature probe before any kernel resource exists; the only skip
        // path. A kernel without the override channel has nothing for this
        // engine to validate.
        if !next_id::is_supported() {
            report.diagnostic(&format!(
                "{} is missing; kernel lacks checkpoint/restore support",
                next_id::MSG_NEXT_ID
            ));
            state = RunState::Skipped;
            debug!("run {} finished in state {:?}", self.run_id, state);
            report.plan();
            return Outcome::Skip;
        }

        // Missing privilege is a failing assertion, not a skip.
        if !privilege::is_root() {
            report.not_ok("running as root");
            report.plan();
            return Outcome::Fail;
        }
        report.ok("running as root");

        let mut ledger = QueueLedger::new();
        match self.drive(report, &mut ledger, &mut state) {
            Ok(()) => {
                info!(
                    "run {} passed with {} assertions",
                    self.run_id,
                    report.count()
                );
                report.plan();
                Outcome::Pass
            }
            Err(e) => {
                error!("run {} failed in state {:?}: {e}", self.run_id, state);
                state = RunState::Failed;
                debug!("run {} finished in state {:?}", self.run_id, state);
                ledger.abort_cleanup(report);
                report.bail_out();
                report.plan();
                Outcome::Fail
            }
        }
    }

    fn drive<W: Write>(
        &self,
        report: &mut TapReporter<W>,
        ledger: &mut QueueLedger,
        state: &mut RunState,
    ) -> Result<()> {
        let key = match msgque::derive_key(&self.config.key_path, self.config.salt) {
            Ok(key) => {
                report.ok("derived queue key");
                key
            }
            Err(e) => {
                report.not_ok(&format!("derive queue key: {e}"));
                return Err(e);
            }
        };
        self.transition(state, RunState::KeyDerived);

        let id = match msgque::create_exclusive(key, self.config.mode) {
            Ok(id) => {
                report.ok("created message queue");
                id
            }
            Err(e) => {
                report.not_ok(&format!("create message queue: {e}"));
                return Err(e);
            }
        };
        ledger.record(id);
        self.transition(state, RunState::Created);

        let fill = fill_messages()?;
        for (index, message) in fill.iter().enumerate() {
            match msgque::send(id, message) {
                Ok(()) => report.ok(&format!("enqueued message {index}")),
                Err(e) => {
                    report.not_ok(&format!("enqueue message {index}: {e}"));
                    return Err(e);
                }
            }
        }
        self.transition(state, RunState::Filled);

        let snapshot = match snapshot_queue(key, id, self.config.scan_limit) {
            Ok(snapshot) => {
                report.ok(&format!(
                    "captured snapshot of {} pending messages",
                    snapshot.pending()
                ));
                snapshot
            }
            Err(e) => {
                report.not_ok(&format!("capture snapshot: {e}"));
                return Err(e);
            }
        };
        if let Some(path) = &self.config.snapshot_out {
            // Debugging aid; its failure does not decide the run.
            match snapshot.write_json(path) {
                Ok(()) => info!("snapshot written to {}", path.display()),
                Err(e) => warn!("snapshot dump skipped: {e}"),
            }
        }
        self.transition(state, RunState::SnapshotTaken);

        // First verification: drain against the live fill. The queue is
        // destroyed by the verifier whatever the comparison outcome.
        let first_drain = verify_and_destroy(report, id, &fill);
        ledger.remove(id);
        first_drain?;
        self.transition(state, RunState::Verified1);

        restore::force_identity(report, snapshot.id)?;
        self.transition(state, RunState::IdentityForced);

        // A failed recreate/replay destroys its own queue before returning,
        // so the ledger only records a successful restore.
        let restored = restore::recreate_and_replay(report, &snapshot)?;
        ledger.record(restored);
        self.transition(state, RunState::Restored);

        // Second verification: drain against the snapshot.
        let second_drain = verify_and_destroy(report, restored, &snapshot.messages);
        ledger.remove(restored);
        second_drain?;
        self.transition(state, RunState::Verified2);

        Ok(())
    }

    fn transition(&self, state: &mut RunState, next: RunState) {
        debug!("run {}: {:?} -> {:?}", self.run_id, state, next);
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_messages_match_the_reference_pair() {
        let fill = fill_messages().unwrap();
        assert_eq!(fill.len(), 2);
        assert_eq!(fill[0].mtype(), FIRST_MSG_TYPE);
        assert_eq!(fill[0].payload(), b"Test sysv5 msg");
        assert_eq!(fill[1].mtype(), SECOND_MSG_TYPE);
        assert_eq!(fill[1].payload(), b"Yet another test sysv5 msg");
    }

    #[test]
    fn engine_fails_fast_without_root() {
        if privilege::is_root() || !next_id::is_supported() {
            return;
        }
        let engine = CheckpointEngine::new(MsgqueConfig::default());
        let mut report = TapReporter::new(Vec::new());
        let outcome = engine.run(&mut report);
        assert_eq!(outcome, Outcome::Fail);

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert!(text.contains("not ok 1 running as root"));
        assert!(text.ends_with("1..1\n"));
    }
}
