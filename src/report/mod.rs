//! Reporting
//!
//! TAP line protocol emission and kselftest exit-code mapping.

pub mod tap;

pub use tap::{Outcome, TapReporter};
