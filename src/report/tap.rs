//! TAP (Test Anything Protocol) emitter.
//!
//! One `ok`/`not ok` line per assertion with a 1-based monotonic counter,
//! a trailing `1..N` plan line, and `Bail out!` for unrecoverable failures.
//! Diagnostics (`# ...`) may be interleaved and do not advance the counter.
//! The stream goes to stdout; all logging goes to stderr so the protocol
//! stays machine-parseable.

use std::io::{self, Write};

/// kselftest exit codes.
pub const KSFT_PASS: i32 = 0;
pub const KSFT_FAIL: i32 = 1;
pub const KSFT_SKIP: i32 = 4;

/// Overall result of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    /// A required kernel feature is unavailable rather than broken.
    Skip,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Pass => KSFT_PASS,
            Outcome::Fail => KSFT_FAIL,
            Outcome::Skip => KSFT_SKIP,
        }
    }
}

/// Assertion counter plus the emitted TAP stream.
///
/// Owned by the orchestrator and threaded by `&mut` through every component
/// call; there is no process-global counter.
pub struct TapReporter<W: Write> {
    out: W,
    count: u32,
    failed: u32,
}

impl TapReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TapReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            count: 0,
            failed: 0,
        }
    }

    /// Emit the fixed version marker. Call once, before any assertion.
    pub fn version(&mut self) {
        let _ = writeln!(self.out, "TAP version 13");
    }

    /// Record a passing assertion.
    pub fn ok(&mut self, msg: &str) {
        self.count += 1;
        let _ = writeln!(self.out, "ok {} {}", self.count, msg);
    }

    /// Record a failing assertion.
    pub fn not_ok(&mut self, msg: &str) {
        self.count += 1;
        self.failed += 1;
        let _ = writeln!(self.out, "not ok {} {}", self.count, msg);
    }

    /// Record one assertion, passing or failing on `pass`. Returns `pass`.
    pub fn check(&mut self, msg: &str, pass: bool) -> bool {
        if pass {
            self.ok(msg);
        } else {
            self.not_ok(msg);
        }
        pass
    }

    /// Emit a `# ...` diagnostic line. Does not advance the counter.
    pub fn diagnostic(&mut self, msg: &str) {
        let _ = writeln!(self.out, "# {}", msg);
    }

    /// Emit the bail-out marker for an unrecoverable failure.
    pub fn bail_out(&mut self) {
        let _ = writeln!(self.out, "Bail out!");
    }

    /// Emit the final `1..N` plan line.
    pub fn plan(&mut self) {
        let _ = writeln!(self.out, "1..{}", self.count);
    }

    /// Number of assertions emitted so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of failing assertions emitted so far.
    pub fn failures(&self) -> u32 {
        self.failed
    }

    /// Consume the reporter and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(report: TapReporter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(report.into_inner())
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn counter_is_monotonic_and_one_based() {
        let mut report = TapReporter::new(Vec::new());
        report.version();
        report.ok("first");
        report.not_ok("second");
        report.ok("third");
        report.plan();

        assert_eq!(report.count(), 3);
        assert_eq!(report.failures(), 1);
        assert_eq!(
            lines(report),
            vec![
                "TAP version 13",
                "ok 1 first",
                "not ok 2 second",
                "ok 3 third",
                "1..3",
            ]
        );
    }

    #[test]
    fn diagnostics_do_not_advance_the_counter() {
        let mut report = TapReporter::new(Vec::new());
        report.ok("before");
        report.diagnostic("some context");
        report.ok("after");

        assert_eq!(report.count(), 2);
        assert_eq!(
            lines(report),
            vec!["ok 1 before", "# some context", "ok 2 after"]
        );
    }

    #[test]
    fn bail_out_precedes_the_plan_line() {
        let mut report = TapReporter::new(Vec::new());
        report.version();
        report.not_ok("broken");
        report.bail_out();
        report.plan();

        assert_eq!(
            lines(report),
            vec!["TAP version 13", "not ok 1 broken", "Bail out!", "1..1"]
        );
    }

    #[test]
    fn empty_run_plans_zero() {
        let mut report = TapReporter::new(Vec::new());
        report.version();
        report.plan();
        assert_eq!(lines(report), vec!["TAP version 13", "1..0"]);
    }

    #[test]
    fn check_returns_its_condition() {
        let mut report = TapReporter::new(Vec::new());
        assert!(report.check("yes", true));
        assert!(!report.check("no", false));
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn outcome_exit_codes_follow_kselftest() {
        assert_eq!(Outcome::Pass.exit_code(), 0);
        assert_eq!(Outcome::Fail.exit_code(), 1);
        assert_eq!(Outcome::Skip.exit_code(), 4);
    }
}
