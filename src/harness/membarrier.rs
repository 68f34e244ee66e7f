//! Memory-barrier command acceptance/rejection checks.
//!
//! Queries the supported command mask, then verifies that out-of-range
//! commands and flags are rejected and that the global barrier executes.
//! A kernel built without membarrier support skips rather than fails.

use std::io::Write;

use libc::c_int;
use nix::errno::Errno;

use crate::kernel::membarrier::{self, Command};
use crate::report::{Outcome, TapReporter};

pub fn run<W: Write>(report: &mut TapReporter<W>) -> Outcome {
    report.version();

    let mask = match membarrier::call(Command::Query) {
        Ok(mask) => {
            report.ok("queried supported commands");
            mask
        }
        Err(Errno::ENOSYS) => {
            report.diagnostic("membarrier is not built into this kernel");
            report.plan();
            return Outcome::Skip;
        }
        Err(e) => {
            report.not_ok(&format!("query supported commands: {e}"));
            return fail(report);
        }
    };

    if !report.check(
        "global command advertised",
        mask & (Command::Global as i32) != 0,
    ) {
        return fail(report);
    }
    if !report.check(
        "negative command rejected",
        membarrier::call_raw(-1, 0).is_err(),
    ) {
        return fail(report);
    }
    if !report.check(
        "nonzero flags rejected",
        membarrier::call_raw(Command::Query as c_int, 1).is_err(),
    ) {
        return fail(report);
    }
    if !report.check(
        "global barrier executed",
        matches!(membarrier::call(Command::Global), Ok(0)),
    ) {
        return fail(report);
    }

    report.plan();
    Outcome::Pass
}

fn fail<W: Write>(report: &mut TapReporter<W>) -> Outcome {
    report.bail_out();
    report.plan();
    Outcome::Fail
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercises the real syscall; every path still has to produce a
    // well-formed stream.
    #[test]
    fn stream_is_well_formed_on_any_kernel() {
        let mut report = TapReporter::new(Vec::new());
        let _ = run(&mut report);

        let raw = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.first(), Some(&"TAP version 13"));
        assert!(lines.last().unwrap().starts_with("1.."));
    }
}
