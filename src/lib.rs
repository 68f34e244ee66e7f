//! crcheck: checkpoint/restore validation harnesses for kernel IPC resources
//!
//! Proves that a SysV message queue can be introspected, destroyed, and
//! recreated under a forced kernel id with byte-for-byte fidelity of its
//! contents and metadata.
//!
//! # Architecture
//!
//! This crate is organized by concern:
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::msgque`]: SysV message queue operations (exclusive create,
//!   non-blocking send/receive, positional copy, slot stat, destroy)
//! - [`kernel::next_id`]: the privileged next-id override channel
//! - [`kernel::privilege`]: process privilege probes
//! - [`kernel::kcmp`]: cross-process resource comparison syscall
//! - [`kernel::membarrier`]: memory-barrier syscall
//!
//! ## Checkpoint/Restore Engine ([`checkpoint`])
//! - [`checkpoint::snapshot`]: non-destructive queue capture
//! - [`checkpoint::drain`]: destructive drain with field-by-field
//!   verification
//! - [`checkpoint::restore`]: identity-forced recreation and replay
//! - [`checkpoint::engine`]: the run state machine
//!
//! ## Safety & Cleanup ([`safety`])
//! - live-queue ledger so an aborting run destroys what it created
//!
//! ## Reporting ([`report`])
//! - [`report::tap`]: TAP line protocol, assertion counter, exit codes
//!
//! ## Sibling Harnesses ([`harness`])
//! - [`harness::kcmp`]: cross-process resource identity checks
//! - [`harness::membarrier`]: membarrier command semantics checks
//!
//! # Design Principles
//!
//! 1. **Kernel as truth** - every assertion is backed by a kernel-reported
//!    value, never by cached state
//! 2. **Single owner per resource** - a queue is owned by the run that
//!    created it until a destroy has been attempted
//! 3. **No retries** - every kernel operation is attempted exactly once;
//!    failures surface immediately and trigger cleanup-then-abort

// Kernel Primitives
pub mod kernel;

// Checkpoint/Restore Engine
pub mod checkpoint;

// Safety & Cleanup
pub mod safety;

// Reporting
pub mod report;

// Sibling Harnesses
pub mod harness;

// Configuration & Types
pub mod config;

// CLI entrypoint wiring shared by the msgque/kcmp/membarrier binaries.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
