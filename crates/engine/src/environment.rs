//! Environment manager
//!
//! Opens and configures one LMDB environment, reclaims reader slots left
//! behind by dead processes, and hands out the root database handle.
//!
//! Capacity and database-count limits live on [`EnvironmentOptions`] and are
//! consumed by [`Environment::open`]; an open [`Environment`] exposes no way
//! to change them.
//!
//! Write transactions can only be started from inside the crate. The
//! [`CommandDispatcher`](crate::CommandDispatcher) is the one caller, which
//! keeps every mutation on its writer thread.

use crate::rewind::{RewindLog, REWIND_DIR};
use crate::txn::WriteTxn;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use std::fmt;
use std::path::{Path, PathBuf};
use stress_core::{validate_limits, HarnessConfig, Result, DEFAULT_MAP_SIZE, DEFAULT_PATH};
use tracing::{debug, info, instrument};

/// Configuration applied before the environment is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOptions {
    path: PathBuf,
    map_size: usize,
    max_dbs: u32,
    mode: u32,
    enable_rewind: bool,
}

impl EnvironmentOptions {
    /// Options for an environment in `path` with default limits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map_size: DEFAULT_MAP_SIZE,
            max_dbs: 1,
            mode: 0o644,
            enable_rewind: false,
        }
    }

    /// Set the storage capacity bound in bytes.
    pub fn map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    /// Set the maximum number of named databases.
    pub fn max_dbs(mut self, max_dbs: u32) -> Self {
        self.max_dbs = max_dbs;
        self
    }

    /// Set the permission bits applied to the data files.
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Journal writes to a rewind log next to the environment.
    pub fn enable_rewind(mut self, enable: bool) -> Self {
        self.enable_rewind = enable;
        self
    }

    /// Environment directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the rewind log is enabled.
    pub fn rewind_enabled(&self) -> bool {
        self.enable_rewind
    }

    /// Reject limits the engine would refuse or mis-handle.
    pub fn validate(&self) -> Result<()> {
        validate_limits(self.map_size, self.max_dbs, self.mode)
    }

    /// Open the environment with these options.
    pub fn open(self) -> Result<Environment> {
        Environment::open(self)
    }
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

impl From<&HarnessConfig> for EnvironmentOptions {
    fn from(config: &HarnessConfig) -> Self {
        EnvironmentOptions::new(config.path.clone())
            .map_size(config.map_size)
            .max_dbs(config.max_dbs)
            .mode(config.mode)
            .enable_rewind(config.enable_rewind)
    }
}

/// Handle to the root (unnamed) database of an environment.
///
/// Obtained once from [`Environment::open_root_database`] and reused for the
/// lifetime of the process.
#[derive(Clone, Copy)]
pub struct DatabaseHandle {
    db: Database<Str, Bytes>,
}

impl DatabaseHandle {
    /// Look up `key`; `None` if it is not stored.
    pub fn get<'t>(&self, txn: &'t RoTxn<'_>, key: &str) -> Result<Option<&'t [u8]>> {
        Ok(self.db.get(txn, key)?)
    }

    /// Number of records stored.
    pub fn len(&self, txn: &RoTxn<'_>) -> Result<u64> {
        Ok(self.db.len(txn)?)
    }

    /// True if no record is stored.
    pub fn is_empty(&self, txn: &RoTxn<'_>) -> Result<bool> {
        Ok(self.db.is_empty(txn)?)
    }

    pub(crate) fn raw(&self) -> Database<Str, Bytes> {
        self.db
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle").finish_non_exhaustive()
    }
}

/// One open storage environment.
///
/// Released when dropped. The last clone of the underlying engine handle
/// closes the files, so the dispatcher must be shut down first.
pub struct Environment {
    env: Env,
    options: EnvironmentOptions,
    rewind: Option<RewindLog>,
    /// Log left by an earlier journaled session while journaling is off.
    /// Only read for replay.
    recovery: Option<RewindLog>,
}

impl Environment {
    /// Open (creating if needed) the environment described by `options`.
    #[instrument(skip(options), fields(
        path = %options.path.display(),
        map_size = options.map_size,
        max_dbs = options.max_dbs,
        rewind = options.enable_rewind
    ))]
    pub fn open(options: EnvironmentOptions) -> Result<Self> {
        options.validate()?;
        info!("Opening environment");
        std::fs::create_dir_all(&options.path)?;

        // SAFETY: the directory is owned by this harness; nothing else in the
        // process maps these files with different options.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_dbs(options.max_dbs)
                .open(&options.path)?
        };
        apply_mode(&options.path, options.mode)?;

        let rewind_path = options.path.join(REWIND_DIR);
        let (rewind, recovery) = if options.enable_rewind {
            (Some(RewindLog::open(&rewind_path, options.map_size)?), None)
        } else if rewind_path.is_dir() {
            debug!("found rewind log from an earlier session");
            (None, Some(RewindLog::open(&rewind_path, options.map_size)?))
        } else {
            (None, None)
        };
        if rewind.is_some() || recovery.is_some() {
            apply_mode(&rewind_path, options.mode)?;
        }

        Ok(Self {
            env,
            options,
            rewind,
            recovery,
        })
    }

    /// Release reader slots held by processes that have exited.
    ///
    /// Returns the number of slots reclaimed; zero is the normal case.
    pub fn reclaim_stale_readers(&self) -> Result<usize> {
        let reclaimed = self.env.clear_stale_readers()?;
        if reclaimed > 0 {
            info!(
                stale_readers = reclaimed,
                "cleared {} reader slots from dead processes", reclaimed
            );
        }
        Ok(reclaimed)
    }

    /// Open the root database, creating it if it does not exist yet.
    ///
    /// Runs in an update transaction because creation is a mutation.
    /// Journaled writes past the durable marker are replayed in the same
    /// transaction whenever a rewind log exists, even with journaling off for
    /// this session, so a later journaled session never replays them over
    /// newer data.
    pub fn open_root_database(&self) -> Result<DatabaseHandle> {
        let mut wtxn = self.env.write_txn()?;
        let db: Database<Str, Bytes> = self.env.create_database(&mut wtxn, None)?;

        let Some(log) = self.rewind.as_ref().or(self.recovery.as_ref()) else {
            wtxn.commit()?;
            return Ok(DatabaseHandle { db });
        };

        let pending = log.pending()?;
        let Some(&(last, _)) = pending.last() else {
            wtxn.commit()?;
            return Ok(DatabaseHandle { db });
        };
        for (_, entry) in &pending {
            db.put(&mut wtxn, &entry.key, &entry.value)?;
        }
        wtxn.commit()?;
        log.mark_durable(last)?;
        info!(
            replayed = pending.len(),
            durable_sequence = last,
            "replayed rewind log"
        );
        Ok(DatabaseHandle { db })
    }

    /// Run `f` inside a read-only transaction.
    ///
    /// Read transactions are not tied to the writer thread.
    pub fn view<T>(&self, f: impl FnOnce(&RoTxn<'_>) -> Result<T>) -> Result<T> {
        let rtxn = self.env.read_txn()?;
        f(&rtxn)
    }

    /// Number of records stored in `db`.
    pub fn record_count(&self, db: DatabaseHandle) -> Result<u64> {
        self.view(|txn| db.len(txn))
    }

    /// Options the environment was opened with.
    pub fn options(&self) -> &EnvironmentOptions {
        &self.options
    }

    /// The rewind log, when enabled.
    pub fn rewind_log(&self) -> Option<&RewindLog> {
        self.rewind.as_ref()
    }

    pub(crate) fn begin_write(&self) -> Result<WriteTxn<'_>> {
        Ok(WriteTxn::new(self.env.write_txn()?, self.rewind.as_ref()))
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        debug!(path = %self.options.path.display(), "releasing environment");
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for name in ["data.mdb", "lock.mdb"] {
        let file = path.join(name);
        if file.exists() {
            std::fs::set_permissions(&file, std::fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
