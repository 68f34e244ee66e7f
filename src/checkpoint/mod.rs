//! Queue checkpoint/restore verification engine.
//!
//! Capture a snapshot of a live queue, verify-and-destroy it, recreate it
//! under its original kernel id, replay the snapshot, and verify the replay.
//! Any divergence pinpoints the disagreeing field and position.

pub mod drain;
pub mod engine;
pub mod restore;
pub mod snapshot;

pub use drain::verify_and_destroy;
pub use engine::CheckpointEngine;
pub use restore::restore_queue;
pub use snapshot::{snapshot_queue, QueueSnapshot};
