use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::checkpoint::CheckpointEngine;
use crate::config::types::{MsgqueConfig, DEFAULT_SALT, DEFAULT_SCAN_LIMIT};
use crate::harness;
use crate::report::TapReporter;

/// Which harness binary is running. All three share this entrypoint so the
/// logger setup and exit-code mapping live in one place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliMode {
    Msgque,
    Kcmp,
    Membarrier,
}

#[derive(Parser)]
#[command(
    name = "msgque",
    version,
    about = "Validate checkpoint/restore of SysV message queues",
    long_about = None
)]
struct MsgqueArgs {
    /// Seed path for queue key derivation
    #[arg(long, default_value = "/proc/self/exe")]
    key_path: PathBuf,
    /// Numeric salt mixed into the derived key
    #[arg(long, default_value_t = DEFAULT_SALT)]
    salt: i32,
    /// Permission bits for the created queue, in octal
    #[arg(long, default_value = "0666", value_parser = parse_octal)]
    mode: u32,
    /// Upper bound of the kernel slot scan used to locate the queue
    #[arg(long, default_value_t = DEFAULT_SCAN_LIMIT)]
    scan_limit: i32,
    /// Write the captured snapshot to this file as JSON
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

impl MsgqueArgs {
    fn into_config(self) -> MsgqueConfig {
        MsgqueConfig {
            key_path: self.key_path,
            salt: self.salt,
            mode: self.mode,
            scan_limit: self.scan_limit,
            snapshot_out: self.snapshot_out,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "kcmp",
    version,
    about = "Validate cross-process resource identity comparison",
    long_about = None
)]
struct KcmpArgs {
    /// Directory for the scratch file shared between the two processes
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "membarrier",
    version,
    about = "Validate memory-barrier command acceptance and rejection",
    long_about = None
)]
struct MembarrierArgs {}

fn parse_octal(s: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8)
        .map_err(|e| format!("invalid octal mode: {e}"))
}

/// Shared entrypoint for the harness binaries. Emits TAP on stdout, logs on
/// stderr, and exits with the kselftest code for the outcome.
pub fn run(mode: CliMode) -> Result<()> {
    env_logger::init();

    let mut report = TapReporter::stdout();
    let outcome = match mode {
        CliMode::Msgque => {
            let args = MsgqueArgs::parse();
            CheckpointEngine::new(args.into_config()).run(&mut report)
        }
        CliMode::Kcmp => {
            let args = KcmpArgs::parse();
            let scratch_dir = args.scratch_dir.unwrap_or_else(std::env::temp_dir);
            harness::KcmpHarness::new(scratch_dir).run(&mut report)
        }
        CliMode::Membarrier => {
            let _args = MembarrierArgs::parse();
            harness::membarrier::run(&mut report)
        }
    };

    std::process::exit(outcome.exit_code())
}
