//! Queue introspection: capture a snapshot without disturbing the queue.

use std::fs::File;
use std::path::Path;

use libc::c_int;
use serde::{Deserialize, Serialize};

use crate::config::types::{HarnessError, Result};
use crate::kernel::msgque::{self, Message, QueueId, QueueKey};

/// Immutable capture of a queue: its key, kernel id, metadata, and every
/// pending message in enqueue order. Consumed by the restorer (to replay)
/// and by the drain verifier (as the comparison oracle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub key: QueueKey,
    pub id: QueueId,
    /// Permission mode bits at capture time
    pub mode: u32,
    /// Byte quota at capture time
    pub max_bytes: u64,
    /// Pending messages, FIFO by original enqueue time
    pub messages: Vec<Message>,
}

impl QueueSnapshot {
    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    /// Dump the snapshot as JSON for offline inspection.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| HarnessError::SnapshotDump(format!("create {}: {e}", path.display())))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| HarnessError::SnapshotDump(e.to_string()))?;
        Ok(())
    }
}

/// Capture a complete snapshot of the queue identified by `id`.
///
/// Locates the queue by a bounded linear scan of kernel slots, reads its
/// metadata, then copies every pending message in position order without
/// removing any of them. The queue's contents are unchanged afterward.
pub fn snapshot_queue(key: QueueKey, id: QueueId, scan_limit: c_int) -> Result<QueueSnapshot> {
    let stat = msgque::locate(id, scan_limit)?;
    log::debug!(
        "queue {}: mode {:o}, byte quota {}, {} pending",
        id.raw(),
        stat.mode,
        stat.max_bytes,
        stat.pending
    );

    let mut messages = Vec::with_capacity(stat.pending);
    for index in 0..stat.pending {
        messages.push(msgque::copy_at(id, index)?);
    }

    Ok(QueueSnapshot {
        key,
        id,
        mode: stat.mode,
        max_bytes: stat.max_bytes,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> QueueSnapshot {
        serde_json::from_str(
            r#"{
                "key": 1234567,
                "id": 65538,
                "mode": 438,
                "max_bytes": 16384,
                "messages": [
                    { "mtype": 1, "payload": [84, 101, 115, 116] },
                    { "mtype": 26538, "payload": [] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn snapshot_serializes_round_trip() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: QueueSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, snapshot.id);
        assert_eq!(back.key, snapshot.key);
        assert_eq!(back.mode, 0o666);
        assert_eq!(back.max_bytes, 16384);
        assert_eq!(back.messages, snapshot.messages);
        assert_eq!(back.pending(), 2);
    }

    #[test]
    fn write_json_produces_a_readable_dump() {
        let snapshot = sample_snapshot();
        let path = std::env::temp_dir().join(format!(
            "crcheck-snapshot-{}.json",
            std::process::id()
        ));

        snapshot.write_json(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let back: QueueSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.messages.len(), 2);
        assert_eq!(back.messages[0].mtype(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_json_fails_for_unwritable_path() {
        let snapshot = sample_snapshot();
        let err = snapshot
            .write_json(Path::new("/nonexistent/crcheck/dump.json"))
            .unwrap_err();
        assert!(matches!(err, HarnessError::SnapshotDump(_)));
    }
}
