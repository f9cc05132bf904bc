//! lmdb-stress: write-serialization stress harness for LMDB.
//!
//! Runs `loop-count` update transactions of `batch-count` random-key puts
//! through a single writer thread, then reads every key back.
//!
//! Exit status: 0 when verification is clean, 1 on any error, 2 when
//! mismatches were found.

mod commands;
mod format;

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::{build_cli, init_config, matches_to_action, write_config, CliAction};
use format::{format_error, format_report, OutputMode};
use stress_harness::{run_harness, HarnessReport};

const EXIT_ERROR: i32 = 1;
const EXIT_MISMATCH: i32 = 2;

fn main() {
    init_tracing();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match run(&matches) {
        Ok(Some(report)) => {
            println!("{}", format_report(&report, mode));
            if !report.is_clean() {
                process::exit(EXIT_MISMATCH);
            }
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(EXIT_ERROR);
        }
    }
}

/// `None` when the invocation only wrote a config file.
fn run(matches: &clap::ArgMatches) -> anyhow::Result<Option<HarnessReport>> {
    match matches_to_action(matches)? {
        CliAction::Run(config) => run_harness(&config)
            .map(Some)
            .with_context(|| format!("harness run against {} failed", config.path.display())),
        CliAction::WriteConfig { config, path } => {
            write_config(&config, &path)?;
            info!(path = %path.display(), "config written");
            Ok(None)
        }
        CliAction::InitConfig(path) => {
            init_config(&path)?;
            info!(path = %path.display(), "config initialized");
            Ok(None)
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
