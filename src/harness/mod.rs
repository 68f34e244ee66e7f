//! Sibling single-pass assertion harnesses.
//!
//! Independent of the checkpoint engine; they share only the TAP reporting
//! layer and the kselftest exit-code convention.

pub mod kcmp;
pub mod membarrier;

pub use kcmp::KcmpHarness;
