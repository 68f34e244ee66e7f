//! SysV message queue primitives.
//!
//! Covers the six kernel operations the checkpoint/restore engine needs:
//! exclusive create, non-blocking enqueue, destructive non-blocking receive,
//! positional non-destructive copy, slot stat (locate), and destroy. Key
//! derivation lives here too since it is what names a queue across
//! destroy/recreate cycles.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{c_int, c_long, c_void};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};

use crate::config::types::{HarnessError, Result};

/// Hard upper bound on a single message payload.
pub const MAX_MSG_SIZE: usize = 32;

// From <linux/msg.h>; not exposed by the libc crate on all targets.
pub(crate) const MSG_STAT: c_int = 11;
pub(crate) const MSG_COPY: c_int = 0o40000;

/// ftok-derived resource key. Names a queue independently of the id the
/// kernel assigns at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueKey(i32);

impl QueueKey {
    pub fn raw(self) -> i32 {
        self.0
    }
}

/// Kernel-assigned queue id. Not stable across destroy/recreate unless the
/// next-id counter is forced first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueId(i32);

impl QueueId {
    pub fn raw(self) -> i32 {
        self.0
    }
}

/// One queued message: a caller-chosen positive type tag plus up to
/// [`MAX_MSG_SIZE`] payload bytes. The tag demultiplexes, it does not order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    mtype: i64,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(mtype: i64, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        if mtype <= 0 {
            return Err(HarnessError::InvalidMessage(format!(
                "message type must be positive, got {mtype}"
            )));
        }
        if payload.len() > MAX_MSG_SIZE {
            return Err(HarnessError::InvalidMessage(format!(
                "payload of {} bytes exceeds the {MAX_MSG_SIZE} byte limit",
                payload.len()
            )));
        }
        Ok(Self { mtype, payload })
    }

    /// Construct from bytes the kernel handed back. The kernel enforces the
    /// size bound (we never ask for more than MAX_MSG_SIZE) and only stores
    /// positive types, so no re-validation.
    pub(crate) fn from_wire(mtype: i64, bytes: &[u8]) -> Self {
        Self {
            mtype,
            payload: bytes.to_vec(),
        }
    }

    pub fn mtype(&self) -> i64 {
        self.mtype
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Queue metadata as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStat {
    /// Permission mode bits
    pub mode: u32,
    /// Byte quota (msg_qbytes)
    pub max_bytes: u64,
    /// Number of pending messages
    pub pending: usize,
}

/// Wire layout shared by msgsnd/msgrcv.
#[repr(C)]
struct MsgBuf {
    mtype: c_long,
    mtext: [u8; MAX_MSG_SIZE],
}

impl MsgBuf {
    fn zeroed() -> Self {
        Self {
            mtype: 0,
            mtext: [0; MAX_MSG_SIZE],
        }
    }
}

/// Derive a queue key from a seed path and salt. Deterministic for identical
/// inputs; fails if the path cannot be resolved.
pub fn derive_key(path: &Path, salt: i32) -> Result<QueueKey> {
    let c_path =
        CString::new(path.as_os_str().as_bytes()).map_err(|_| HarnessError::KeyDerivation {
            path: path.to_path_buf(),
            errno: Errno::EINVAL,
        })?;

    // SAFETY: c_path is a valid NUL-terminated string for the duration of
    // the call.
    let key = unsafe { libc::ftok(c_path.as_ptr(), salt) };
    if key == -1 {
        return Err(HarnessError::KeyDerivation {
            path: path.to_path_buf(),
            errno: Errno::last(),
        });
    }
    Ok(QueueKey(key))
}

/// Claim a fresh queue under `key`, failing if one already exists.
pub fn create_exclusive(key: QueueKey, mode: u32) -> Result<QueueId> {
    // SAFETY: integer-only syscall.
    let id = unsafe { libc::msgget(key.0, (mode as c_int) | libc::IPC_CREAT | libc::IPC_EXCL) };
    if id == -1 {
        return Err(match Errno::last() {
            Errno::EEXIST => HarnessError::AlreadyExists { key: key.0 },
            Errno::EACCES => HarnessError::PermissionDenied("queue creation".to_string()),
            errno => HarnessError::Syscall {
                op: "msgget",
                errno,
            },
        });
    }
    log::debug!("created queue {} under key {:#010x}", id, key.0);
    Ok(QueueId(id))
}

/// Enqueue one message without blocking. A full queue surfaces as
/// [`HarnessError::QuotaExceeded`] rather than waiting.
pub fn send(id: QueueId, message: &Message) -> Result<()> {
    let mut buf = MsgBuf::zeroed();
    buf.mtype = message.mtype() as c_long;
    buf.mtext[..message.size()].copy_from_slice(message.payload());

    // SAFETY: buf outlives the call and message.size() <= MAX_MSG_SIZE by
    // construction.
    let rc = unsafe {
        libc::msgsnd(
            id.0,
            &buf as *const MsgBuf as *const c_void,
            message.size(),
            libc::IPC_NOWAIT,
        )
    };
    if rc != 0 {
        return Err(match Errno::last() {
            Errno::EAGAIN => HarnessError::QuotaExceeded { id: id.0 },
            Errno::EACCES => HarnessError::PermissionDenied("enqueue".to_string()),
            errno => HarnessError::Syscall {
                op: "msgsnd",
                errno,
            },
        });
    }
    Ok(())
}

/// Destructively receive the next pending message without blocking.
/// `Ok(None)` is the drain-complete signal (no message available).
pub fn receive(id: QueueId) -> Result<Option<Message>> {
    let mut buf = MsgBuf::zeroed();
    // SAFETY: buf is MAX_MSG_SIZE bytes as declared to the kernel.
    let n = unsafe {
        libc::msgrcv(
            id.0,
            &mut buf as *mut MsgBuf as *mut c_void,
            MAX_MSG_SIZE,
            0,
            libc::IPC_NOWAIT,
        )
    };
    if n < 0 {
        return match Errno::last() {
            Errno::ENOMSG => Ok(None),
            errno => Err(HarnessError::Syscall {
                op: "msgrcv",
                errno,
            }),
        };
    }
    Ok(Some(Message::from_wire(
        buf.mtype as i64,
        &buf.mtext[..n as usize],
    )))
}

/// Copy the message at queue position `index` without removing it.
/// Requires a kernel built with checkpoint/restore support.
pub fn copy_at(id: QueueId, index: usize) -> Result<Message> {
    let mut buf = MsgBuf::zeroed();
    // SAFETY: buf is MAX_MSG_SIZE bytes as declared to the kernel.
    let n = unsafe {
        libc::msgrcv(
            id.0,
            &mut buf as *mut MsgBuf as *mut c_void,
            MAX_MSG_SIZE,
            index as c_long,
            libc::IPC_NOWAIT | MSG_COPY,
        )
    };
    if n < 0 {
        return Err(HarnessError::Copy {
            index,
            errno: Errno::last(),
        });
    }
    Ok(Message::from_wire(buf.mtype as i64, &buf.mtext[..n as usize]))
}

/// Stat the queue occupying kernel slot `slot`, if any. `Ok(None)` means the
/// slot is empty, which is expected during a scan.
pub fn stat_slot(slot: c_int) -> Result<Option<(QueueId, QueueStat)>> {
    // SAFETY: zeroed msqid_ds is a plain-data struct the kernel fills on
    // success.
    let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
    // SAFETY: ds outlives the call.
    let rc = unsafe { libc::msgctl(slot, MSG_STAT, &mut ds) };
    if rc < 0 {
        return match Errno::last() {
            Errno::EINVAL | Errno::ENOENT => Ok(None),
            errno => Err(HarnessError::Introspection(format!(
                "stat of slot {slot} failed: {errno}"
            ))),
        };
    }
    let stat = QueueStat {
        mode: ds.msg_perm.mode as u32,
        max_bytes: ds.msg_qbytes as u64,
        pending: ds.msg_qnum as usize,
    };
    Ok(Some((QueueId(rc), stat)))
}

/// Locate a queue by id via a bounded linear scan of kernel slots.
/// Exhausting the bound without a match is a hard error, not a silent miss.
pub fn locate(id: QueueId, scan_limit: c_int) -> Result<QueueStat> {
    for slot in 0..scan_limit {
        if let Some((found, stat)) = stat_slot(slot)? {
            if found == id {
                log::debug!("queue {} found in slot {}", id.raw(), slot);
                return Ok(stat);
            }
        }
    }
    Err(HarnessError::HandleNotFound {
        id: id.0,
        scan_limit,
    })
}

/// Destroy a queue. Destroying an already-removed id fails distinctly.
pub fn remove(id: QueueId) -> Result<()> {
    // SAFETY: IPC_RMID takes no buffer.
    let rc = unsafe { libc::msgctl(id.0, libc::IPC_RMID, std::ptr::null_mut()) };
    if rc < 0 {
        return Err(HarnessError::Syscall {
            op: "msgctl(IPC_RMID)",
            errno: Errno::last(),
        });
    }
    log::debug!("destroyed queue {}", id.raw());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_accepts_payload_at_the_size_limit() {
        let msg = Message::new(1, vec![0xAB; MAX_MSG_SIZE]).unwrap();
        assert_eq!(msg.size(), MAX_MSG_SIZE);
        assert_eq!(msg.payload(), &[0xAB; MAX_MSG_SIZE][..]);
    }

    #[test]
    fn message_rejects_oversized_payload() {
        assert!(Message::new(1, vec![0; MAX_MSG_SIZE + 1]).is_err());
    }

    #[test]
    fn message_rejects_non_positive_type() {
        assert!(Message::new(0, b"x".to_vec()).is_err());
        assert!(Message::new(-5, b"x".to_vec()).is_err());
    }

    #[test]
    fn message_preserves_large_type_values() {
        let msg = Message::new(26538, b"Yet another test sysv5 msg".to_vec()).unwrap();
        assert_eq!(msg.mtype(), 26538);
        assert_eq!(msg.size(), 26);
    }

    #[test]
    fn message_allows_empty_payload() {
        let msg = Message::new(7, Vec::new()).unwrap();
        assert_eq!(msg.size(), 0);
    }

    #[test]
    fn key_derivation_is_deterministic() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("crcheck-key-seed-{}", std::process::id()));
        std::fs::write(&path, b"seed").unwrap();

        let a = derive_key(&path, 42).unwrap();
        let b = derive_key(&path, 42).unwrap();
        assert_eq!(a, b);

        let other_salt = derive_key(&path, 43).unwrap();
        assert_ne!(a, other_salt);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn key_derivation_fails_for_missing_path() {
        let path = Path::new("/nonexistent/crcheck/seed");
        match derive_key(path, 1) {
            Err(HarnessError::KeyDerivation { .. }) => {}
            other => panic!("expected KeyDerivation error, got {other:?}"),
        }
    }
}
