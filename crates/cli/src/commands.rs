//! Clap command definition and config resolution.
//!
//! Values come from three layers: built-in defaults, an optional TOML file
//! (`--config`), then explicit flags. Later layers win.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use stress_core::HarnessConfig;

/// Build the CLI command.
pub fn build_cli() -> Command {
    Command::new("lmdb-stress")
        .about("Serialize batched writes to LMDB through one writer thread and verify them")
        .arg(
            Arg::new("loop-count")
                .short('l')
                .long("loop-count")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Number of write-batch iterations (default: 100)"),
        )
        .arg(
            Arg::new("batch-count")
                .short('b')
                .long("batch-count")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Records per batch (default: 100)"),
        )
        .arg(
            Arg::new("enable-rewind")
                .short('r')
                .long("enable-rewind")
                .action(ArgAction::SetTrue)
                .help("Journal every write to the rewind log"),
        )
        .arg(
            Arg::new("path")
                .long("path")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Environment directory (default: /tmp/lmdb-test/)"),
        )
        .arg(
            Arg::new("map-size")
                .long("map-size")
                .value_name("BYTES")
                .value_parser(value_parser!(usize))
                .help("Storage capacity bound in bytes (default: 2147483648)"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .help("Seed for reproducible keys"),
        )
        .arg(
            Arg::new("strict-keys")
                .long("strict-keys")
                .action(ArgAction::SetTrue)
                .help("Fail on a duplicate generated key instead of overwriting it"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file; flags override its values"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the final report as JSON"),
        )
        .arg(
            Arg::new("write-config")
                .long("write-config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Write the resolved config as TOML and exit without running"),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .conflicts_with("write-config")
                .help("Write a commented default config unless FILE exists, then exit"),
        )
}

/// What the binary should do for a parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Run the harness.
    Run(HarnessConfig),
    /// Save the resolved config and stop.
    WriteConfig {
        /// Config after defaults, file and flags are merged.
        config: HarnessConfig,
        /// Destination file.
        path: PathBuf,
    },
    /// Create a default config file if absent and stop.
    InitConfig(PathBuf),
}

/// Turn parsed arguments into a [`CliAction`].
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction> {
    if let Some(path) = matches.get_one::<PathBuf>("init-config") {
        return Ok(CliAction::InitConfig(path.clone()));
    }
    let config = resolve_config(matches)?;
    Ok(match matches.get_one::<PathBuf>("write-config") {
        Some(path) => CliAction::WriteConfig {
            config,
            path: path.clone(),
        },
        None => CliAction::Run(config),
    })
}

/// Save `config` to `path`.
pub fn write_config(config: &HarnessConfig, path: &Path) -> Result<()> {
    config
        .write_to_file(path)
        .with_context(|| format!("failed to write config to {}", path.display()))
}

/// Write the default config to `path` unless something is already there.
pub fn init_config(path: &Path) -> Result<()> {
    HarnessConfig::write_default_if_missing(path)
        .with_context(|| format!("failed to initialize config at {}", path.display()))
}

/// Merge defaults, the config file and flags into one config.
pub fn resolve_config(matches: &ArgMatches) -> Result<HarnessConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(&n) = matches.get_one::<usize>("loop-count") {
        config.loop_count = n;
    }
    if let Some(&n) = matches.get_one::<usize>("batch-count") {
        config.batch_count = n;
    }
    if matches.get_flag("enable-rewind") {
        config.enable_rewind = true;
    }
    if let Some(path) = matches.get_one::<PathBuf>("path") {
        config.path = path.clone();
    }
    if let Some(&size) = matches.get_one::<usize>("map-size") {
        config.map_size = size;
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(seed);
    }
    if matches.get_flag("strict-keys") {
        config.strict_keys = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
