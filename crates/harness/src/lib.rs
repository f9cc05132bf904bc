//! Write-serialization stress harness
//!
//! Drives batches of random-key inserts through the single-writer
//! [`CommandDispatcher`](stress_engine::CommandDispatcher), then reads every
//! generated key back and compares it with the value its loop position
//! dictates.
//!
//! [`run_harness`] wires the whole run together from a [`HarnessConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
pub mod keys;
pub mod verifier;

pub use driver::{CollisionPolicy, DriverOptions, LoopDriver};
pub use keys::{KeySource, RandomKeys, ScriptedKeys, SequentialKeys};
pub use verifier::{verify, Mismatch, VerificationReport};

use serde::Serialize;
use std::sync::Arc;
use stress_core::{HarnessConfig, Result};
use stress_engine::{CommandDispatcher, EnvironmentOptions};
use tracing::info;

/// Summary of one complete harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    /// Batches committed.
    pub loop_count: usize,
    /// Records per batch.
    pub batch_count: usize,
    /// Records written (`loop_count * batch_count`).
    pub written: usize,
    /// Distinct keys in the verification index.
    pub unique_keys: usize,
    /// Generated keys that replaced an earlier index entry.
    pub collisions: usize,
    /// Reader slots reclaimed at startup.
    pub stale_readers: usize,
    /// Whether the rewind journal was on.
    pub rewind_enabled: bool,
    /// Records present in the database after the run.
    pub records_stored: u64,
    /// Read-back results.
    pub verification: VerificationReport,
}

impl HarnessReport {
    /// The read-back found no mismatches.
    pub fn is_clean(&self) -> bool {
        self.verification.is_clean()
    }
}

/// Run the harness end to end with random keys.
///
/// Opens the environment, reclaims stale readers, writes every batch
/// through a fresh dispatcher, shuts the writer down and verifies.
pub fn run_harness(config: &HarnessConfig) -> Result<HarnessReport> {
    config.validate()?;
    run_with_keys(config, RandomKeys::new(config.seed))
}

/// Like [`run_harness`] with a caller-supplied key source.
pub fn run_with_keys<K: KeySource>(config: &HarnessConfig, keys: K) -> Result<HarnessReport> {
    let env = Arc::new(EnvironmentOptions::from(config).open()?);
    let stale_readers = env.reclaim_stale_readers()?;
    let db = env.open_root_database()?;

    let dispatcher = CommandDispatcher::start(Arc::clone(&env))?;
    let index = LoopDriver::new(&dispatcher, db, keys, DriverOptions::from(config)).run();
    dispatcher.shutdown();
    let index = index?;

    let verification = verify(&env, db, &index)?;
    let records_stored = env.record_count(db)?;
    info!(
        records_stored,
        mismatches = verification.mismatches.len(),
        "harness run complete"
    );

    Ok(HarnessReport {
        loop_count: config.loop_count,
        batch_count: config.batch_count,
        written: config.total_records(),
        unique_keys: index.len(),
        collisions: index.collisions(),
        stale_readers,
        rewind_enabled: env.options().rewind_enabled(),
        records_stored,
        verification,
    })
}
