/// Core types and error taxonomy for the validation harnesses
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default salt mixed into queue key derivation.
pub const DEFAULT_SALT: i32 = 822155650;

/// Default upper bound of the kernel slot scan used to locate a queue.
pub const DEFAULT_SCAN_LIMIT: i32 = 256;

/// Default permission bits for created queues.
pub const DEFAULT_QUEUE_MODE: u32 = 0o666;

/// Run configuration for the queue checkpoint/restore engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgqueConfig {
    /// Seed path fed to queue key derivation
    pub key_path: PathBuf,
    /// Numeric salt mixed into the derived key
    pub salt: i32,
    /// Permission bits for the created queue
    pub mode: u32,
    /// Upper bound of the kernel slot scan used to locate the queue
    pub scan_limit: i32,
    /// Write the captured snapshot to this file as JSON (optional)
    pub snapshot_out: Option<PathBuf>,
}

impl Default for MsgqueConfig {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("/proc/self/exe"),
            salt: DEFAULT_SALT,
            mode: DEFAULT_QUEUE_MODE,
            scan_limit: DEFAULT_SCAN_LIMIT,
            snapshot_out: None,
        }
    }
}

/// Custom error types for the harnesses
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message rejected: {0}")]
    InvalidMessage(String),

    #[error("key derivation failed for {}: {}", path.display(), errno)]
    KeyDerivation { path: PathBuf, errno: Errno },

    #[error("a queue already exists under key {key:#010x}")]
    AlreadyExists { key: i32 },

    #[error("permission denied during {0}")]
    PermissionDenied(String),

    #[error("queue {id} is full")]
    QuotaExceeded { id: i32 },

    #[error("introspection failed: {0}")]
    Introspection(String),

    #[error("queue {id} not found in slots 0..{scan_limit}")]
    HandleNotFound { id: i32, scan_limit: i32 },

    #[error("non-destructive copy of message {index} failed: {errno}")]
    Copy { index: usize, errno: Errno },

    #[error("failed to force the next queue id: {0}")]
    ForceIdentity(String),

    #[error("restored queue id {actual} does not match checkpointed id {expected}")]
    IdentityMismatch { expected: i32, actual: i32 },

    #[error("replay of message {index} failed")]
    Replay {
        index: usize,
        #[source]
        source: Box<HarnessError>,
    },

    #[error(transparent)]
    Mismatch(#[from] DrainMismatch),

    #[error("snapshot dump failed: {0}")]
    SnapshotDump(String),

    #[error("{op} failed: {errno}")]
    Syscall { op: &'static str, errno: Errno },
}

/// Divergence found while draining a queue against an expected sequence.
///
/// Each variant carries the position and the disagreeing values so a failure
/// localizes the defect to a single field of a single message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrainMismatch {
    #[error("message {index}: size {actual} does not match expected {expected}")]
    Size {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("message {index}: type {actual} does not match expected {expected}")]
    Type {
        index: usize,
        expected: i64,
        actual: i64,
    },

    #[error("message {index}: payload differs from expected contents")]
    Content { index: usize },

    #[error("drained {actual} messages, expected {expected}")]
    Count { expected: usize, actual: usize },
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msgque_config_defaults() {
        let config = MsgqueConfig::default();
        assert_eq!(config.key_path, PathBuf::from("/proc/self/exe"));
        assert_eq!(config.salt, DEFAULT_SALT);
        assert_eq!(config.mode, 0o666);
        assert_eq!(config.scan_limit, 256);
        assert!(config.snapshot_out.is_none());
    }

    #[test]
    fn drain_mismatch_reports_position_and_field() {
        let err = DrainMismatch::Size {
            index: 3,
            expected: 14,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "message 3: size 12 does not match expected 14"
        );

        let err = DrainMismatch::Count {
            expected: 2,
            actual: 0,
        };
        assert_eq!(err.to_string(), "drained 0 messages, expected 2");
    }

    #[test]
    fn identity_mismatch_names_both_ids() {
        let err = HarnessError::IdentityMismatch {
            expected: 65538,
            actual: 98307,
        };
        assert_eq!(
            err.to_string(),
            "restored queue id 98307 does not match checkpointed id 65538"
        );
    }
}
