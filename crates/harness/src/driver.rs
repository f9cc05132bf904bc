//! Batch generator and loop driver.
//!
//! Each iteration generates one batch on the calling thread, records every
//! key in the [`VerificationIndex`], then submits the batch as a single
//! command. The first failing batch ends the run; nothing is retried.

use crate::keys::KeySource;
use stress_core::{Error, HarnessConfig, Origin, Record, Result, VerificationIndex};
use stress_engine::{CommandDispatcher, DatabaseHandle};
use tracing::{debug, info, warn};

/// What to do when a generated key was already generated earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Later record replaces the earlier index entry (counted, not reported).
    #[default]
    Overwrite,
    /// Fail the run before the colliding batch is submitted.
    Reject,
}

/// Loop driver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Number of batches (transactions).
    pub loop_count: usize,
    /// Records per batch.
    pub batch_count: usize,
    /// Duplicate key handling.
    pub collision_policy: CollisionPolicy,
}

impl DriverOptions {
    /// `loop_count` batches of `batch_count` records, overwriting collisions.
    pub fn new(loop_count: usize, batch_count: usize) -> Self {
        Self {
            loop_count,
            batch_count,
            collision_policy: CollisionPolicy::Overwrite,
        }
    }

    /// Set the collision policy.
    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl From<&HarnessConfig> for DriverOptions {
    fn from(config: &HarnessConfig) -> Self {
        let policy = if config.strict_keys {
            CollisionPolicy::Reject
        } else {
            CollisionPolicy::Overwrite
        };
        DriverOptions::new(config.loop_count, config.batch_count).collision_policy(policy)
    }
}

/// Generates batches and pushes them through the dispatcher.
pub struct LoopDriver<'d, K> {
    dispatcher: &'d CommandDispatcher,
    db: DatabaseHandle,
    keys: K,
    options: DriverOptions,
}

impl<'d, K: KeySource> LoopDriver<'d, K> {
    /// Driver writing into `db` through `dispatcher`.
    pub fn new(
        dispatcher: &'d CommandDispatcher,
        db: DatabaseHandle,
        keys: K,
        options: DriverOptions,
    ) -> Self {
        Self {
            dispatcher,
            db,
            keys,
            options,
        }
    }

    /// Run every iteration and return the completed index.
    ///
    /// # Errors
    ///
    /// The first transaction error (or key collision under
    /// [`CollisionPolicy::Reject`]) aborts the run. Batches before it stay
    /// committed; the failing batch is rolled back by the engine.
    pub fn run(mut self) -> Result<VerificationIndex> {
        let DriverOptions {
            loop_count,
            batch_count,
            ..
        } = self.options;
        info!(loop_count, batch_count, "starting write loop");

        let mut index = VerificationIndex::new();
        for outer in 0..loop_count {
            let batch = self.generate_batch(outer, &mut index)?;
            let db = self.db;
            self.dispatcher.submit(move |txn| {
                for record in &batch {
                    txn.put(db, &record.key, record.value.as_bytes())?;
                }
                Ok(())
            })?;
            debug!(batch = outer, records = batch_count, "batch committed");
        }

        if index.collisions() > 0 {
            warn!(
                collisions = index.collisions(),
                "duplicate keys overwrote earlier records"
            );
        }
        info!("Updated {} entries", loop_count * batch_count);
        Ok(index)
    }

    fn generate_batch(&mut self, outer: usize, index: &mut VerificationIndex) -> Result<Vec<Record>> {
        let mut batch = Vec::with_capacity(self.options.batch_count);
        for inner in 0..self.options.batch_count {
            let key = self.keys.next_key();
            let origin = Origin::new(outer, inner);

            if self.options.collision_policy == CollisionPolicy::Reject {
                if let Some(first) = index.get(&key) {
                    return Err(Error::KeyCollision {
                        key,
                        first,
                        second: origin,
                    });
                }
            }
            if let Some(replaced) = index.record(key.clone(), origin) {
                debug!(%key, %replaced, %origin, "key collision overwrote index entry");
            }
            batch.push(Record::new(key, origin));
        }
        Ok(batch)
    }
}
