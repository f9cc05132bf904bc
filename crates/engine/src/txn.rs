//! Write transaction handed to dispatcher operations.

use crate::environment::DatabaseHandle;
use crate::rewind::{LogEntry, LogSpan, RewindLog};
use heed::RwTxn;
use stress_core::Result;
use tracing::error;

/// An update transaction running on the writer thread.
///
/// Operations only see `&mut WriteTxn`; commit and abort are decided by the
/// dispatcher from the operation's result. With the rewind log enabled every
/// put is also buffered for the write-ahead journal.
pub struct WriteTxn<'e> {
    txn: RwTxn<'e>,
    rewind: Option<&'e RewindLog>,
    journal: Vec<LogEntry>,
}

impl<'e> WriteTxn<'e> {
    pub(crate) fn new(txn: RwTxn<'e>, rewind: Option<&'e RewindLog>) -> Self {
        Self {
            txn,
            rewind,
            journal: Vec::new(),
        }
    }

    /// Store `value` under `key`, replacing any existing value.
    pub fn put(&mut self, db: DatabaseHandle, key: &str, value: &[u8]) -> Result<()> {
        db.raw().put(&mut self.txn, key, value)?;
        if self.rewind.is_some() {
            self.journal.push(LogEntry::new(key, value));
        }
        Ok(())
    }

    /// Read `key` as seen by this transaction, including its own puts.
    pub fn get(&self, db: DatabaseHandle, key: &str) -> Result<Option<&[u8]>> {
        Ok(db.raw().get(&self.txn, key)?)
    }

    /// Number of puts buffered for the rewind log.
    pub fn journaled(&self) -> usize {
        self.journal.len()
    }

    /// Commit, journaling buffered puts first when rewind is enabled.
    pub(crate) fn commit(self) -> Result<()> {
        let WriteTxn {
            txn,
            rewind,
            journal,
        } = self;

        match rewind {
            Some(log) if !journal.is_empty() => commit_journaled(log, &journal, || txn.commit()),
            _ => Ok(txn.commit()?),
        }
    }

    /// Abort, discarding every put.
    pub(crate) fn abort(self) {
        self.txn.abort();
    }
}

/// Journal steps around a main-environment commit.
pub(crate) trait Journal {
    fn append(&self, entries: &[LogEntry]) -> Result<LogSpan>;
    fn discard(&self, span: LogSpan) -> Result<()>;
    fn mark_durable(&self, sequence: u64) -> Result<()>;
}

impl Journal for RewindLog {
    fn append(&self, entries: &[LogEntry]) -> Result<LogSpan> {
        RewindLog::append(self, entries)
    }

    fn discard(&self, span: LogSpan) -> Result<()> {
        RewindLog::discard(self, span)
    }

    fn mark_durable(&self, sequence: u64) -> Result<()> {
        RewindLog::mark_durable(self, sequence)
    }
}

/// Append, commit the main transaction, then advance the durable marker.
///
/// The result reflects the main commit only. Once it succeeds the batch is
/// committed; a marker that fails to advance leaves the span to be replayed,
/// idempotently, on the next open.
fn commit_journaled<J: Journal + ?Sized>(
    log: &J,
    entries: &[LogEntry],
    commit_main: impl FnOnce() -> heed::Result<()>,
) -> Result<()> {
    let span = log.append(entries)?;
    if let Err(e) = commit_main() {
        if let Err(discard_err) = log.discard(span) {
            error!(
                first = span.first,
                last = span.last,
                "failed to discard rewind span after aborted commit: {}", discard_err
            );
        }
        return Err(e.into());
    }
    if let Err(mark_err) = log.mark_durable(span.last) {
        error!(
            first = span.first,
            last = span.last,
            "committed span left past the durable marker: {}", mark_err
        );
    }
    Ok(())
}
