//! Cross-process resource identity checks.
//!
//! Forks a child that compares its kernel resources against the parent's:
//! an inherited descriptor must map to the same file object, a process must
//! compare equal to itself, and unknown resource classes must be rejected.
//! The child continues the parent's TAP stream and finishes it; the parent
//! only collects the child's exit status and removes the scratch file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getpid, ForkResult, Pid};
use uuid::Uuid;

use crate::kernel::kcmp::{self, KcmpResource, KCMP_TYPES};
use crate::report::tap::{KSFT_PASS, KSFT_SKIP};
use crate::report::{Outcome, TapReporter};

pub struct KcmpHarness {
    scratch_dir: PathBuf,
}

impl KcmpHarness {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }

    pub fn run<W: Write>(&self, report: &mut TapReporter<W>) -> Outcome {
        report.version();

        if !kcmp::is_supported() {
            report.diagnostic("kcmp is not available on this kernel");
            report.plan();
            return Outcome::Skip;
        }

        let path = self
            .scratch_dir
            .join(format!("kcmp-scratch-{}", Uuid::new_v4()));
        let parent_file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                report.ok("created scratch file");
                file
            }
            Err(e) => {
                report.not_ok(&format!("create scratch file: {e}"));
                report.plan();
                return Outcome::Fail;
            }
        };
        let parent_pid = getpid();
        let parent_fd = parent_file.as_raw_fd() as u64;

        // SAFETY: the harness is single-threaded and the child only issues
        // syscalls before exiting.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                // Every TAP line is flushed as it is written, so the child
                // picks up the stream exactly where the parent left it.
                let outcome = child_comparisons(report, parent_pid, parent_fd, &path);
                if outcome == Outcome::Fail {
                    report.bail_out();
                }
                report.plan();
                std::process::exit(outcome.exit_code());
            }
            Ok(ForkResult::Parent { child }) => {
                let outcome = wait_for_child(child);
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("scratch file not removed: {e}");
                }
                outcome
            }
            Err(e) => {
                report.not_ok(&format!("fork comparison process: {e}"));
                let _ = fs::remove_file(&path);
                report.bail_out();
                report.plan();
                Outcome::Fail
            }
        }
    }
}

fn child_comparisons<W: Write>(
    report: &mut TapReporter<W>,
    parent: Pid,
    parent_fd: u64,
    path: &Path,
) -> Outcome {
    let me = getpid();

    let own_file = match File::open(path) {
        Ok(file) => {
            report.ok("reopened scratch file");
            file
        }
        Err(e) => {
            report.not_ok(&format!("reopen scratch file: {e}"));
            return Outcome::Fail;
        }
    };
    let own_fd = own_file.as_raw_fd() as u64;

    // Informational survey across the resource classes; an independent open
    // of the same path is expected to differ, shared task structures too
    // since this is a real fork.
    let survey = [
        (
            "file",
            kcmp::compare(parent, me, KcmpResource::File, parent_fd, own_fd),
        ),
        ("files", kcmp::compare(parent, me, KcmpResource::Files, 0, 0)),
        ("vm", kcmp::compare(parent, me, KcmpResource::Vm, 0, 0)),
        ("fs", kcmp::compare(parent, me, KcmpResource::Fs, 0, 0)),
        (
            "sighand",
            kcmp::compare(parent, me, KcmpResource::Sighand, 0, 0),
        ),
        ("io", kcmp::compare(parent, me, KcmpResource::Io, 0, 0)),
        (
            "sysvsem",
            kcmp::compare(parent, me, KcmpResource::Sysvsem, 0, 0),
        ),
    ];
    let mut line = String::new();
    for (name, result) in survey {
        match result {
            Ok(v) => line.push_str(&format!("{name}={v} ")),
            Err(e) => line.push_str(&format!("{name}=err({e}) ")),
        }
    }
    report.diagnostic(line.trim_end());

    let mut pass = true;
    pass &= report.check(
        "inherited descriptor maps to the same file object",
        matches!(
            kcmp::compare(parent, me, KcmpResource::File, parent_fd, parent_fd),
            Ok(0)
        ),
    );
    pass &= report.check(
        "process address space compares equal to itself",
        matches!(kcmp::compare(me, me, KcmpResource::Vm, 0, 0), Ok(0)),
    );
    pass &= report.check(
        "unknown resource class is rejected",
        matches!(
            kcmp::compare_raw(parent, me, KCMP_TYPES + 1, 0, 0),
            Err(Errno::EINVAL)
        ),
    );

    if pass {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

fn wait_for_child(child: Pid) -> Outcome {
    match waitpid(child, None) {
        Ok(WaitStatus::Exited(_, code)) => match code {
            KSFT_PASS => Outcome::Pass,
            KSFT_SKIP => Outcome::Skip,
            _ => Outcome::Fail,
        },
        other => {
            log::error!("comparison process ended abnormally: {other:?}");
            Outcome::Fail
        }
    }
}
