//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use lmdb_stress::{
    encode_key, CommandDispatcher, DatabaseHandle, Environment, EnvironmentOptions,
    HarnessConfig, KeySource, Origin, VerificationIndex,
};
use tempfile::TempDir;

/// Capacity used by every test environment.
pub const TEST_MAP_SIZE: usize = 64 << 20;

/// Options for an environment under `dir`.
pub fn options(dir: &Path) -> EnvironmentOptions {
    EnvironmentOptions::new(dir).map_size(TEST_MAP_SIZE)
}

/// Harness config writing into `dir/env` with a fixed seed.
pub fn config_in(dir: &TempDir, loop_count: usize, batch_count: usize) -> HarnessConfig {
    HarnessConfig {
        loop_count,
        batch_count,
        path: env_path(dir),
        map_size: TEST_MAP_SIZE,
        seed: Some(0x5eed),
        ..HarnessConfig::default()
    }
}

/// Environment directory inside a temp dir.
pub fn env_path(dir: &TempDir) -> PathBuf {
    dir.path().join("env")
}

// ============================================================================
// TestEnv - open environment with a running dispatcher
// ============================================================================

/// Environment, root database and dispatcher backed by a temp dir.
pub struct TestEnv {
    pub env: Arc<Environment>,
    pub db: DatabaseHandle,
    pub dispatcher: CommandDispatcher,
    pub dir: TempDir,
}

impl TestEnv {
    /// Plain environment.
    pub fn new() -> Self {
        Self::with_rewind(false)
    }

    /// Environment with or without the rewind log.
    pub fn with_rewind(enable: bool) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let env = Arc::new(
            options(&env_path(&dir))
                .enable_rewind(enable)
                .open()
                .expect("Failed to open environment"),
        );
        let db = env.open_root_database().expect("Failed to open root database");
        let dispatcher =
            CommandDispatcher::start(Arc::clone(&env)).expect("Failed to start dispatcher");
        TestEnv {
            env,
            db,
            dispatcher,
            dir,
        }
    }

    /// Store `value` under `key` through the dispatcher.
    pub fn put(&self, key: &str, value: &[u8]) {
        let db = self.db;
        let key = key.to_owned();
        let value = value.to_vec();
        self.dispatcher
            .submit(move |txn| txn.put(db, &key, &value))
            .expect("put failed");
    }

    /// Read `key` in a fresh read transaction.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let db = self.db;
        self.env
            .view(|txn| Ok(db.get(txn, key)?.map(|v| v.to_vec())))
            .expect("read failed")
    }
}

/// Key source that yields an empty key at one position, which the engine
/// rejects on put.
pub struct FailAt<K> {
    inner: K,
    position: usize,
    produced: usize,
}

impl<K: KeySource> FailAt<K> {
    pub fn new(inner: K, position: usize) -> Self {
        FailAt {
            inner,
            position,
            produced: 0,
        }
    }
}

impl<K: KeySource> KeySource for FailAt<K> {
    fn next_key(&mut self) -> String {
        let n = self.produced;
        self.produced += 1;
        if n == self.position {
            String::new()
        } else {
            self.inner.next_key()
        }
    }
}
