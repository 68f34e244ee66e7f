//! Thin wrappers around Linux kernel primitives.
//!
//! All `unsafe` code is concentrated here with explicit SAFETY comments.
//! Callers see typed operations returning crate errors; nothing above this
//! layer touches raw syscalls.

pub mod kcmp;
pub mod membarrier;
pub mod msgque;
pub mod next_id;
pub mod privilege;
