//! Configuration and shared types
//!
//! Run configuration for each harness plus the crate-wide error taxonomy.

pub mod types;
