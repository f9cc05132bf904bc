//! Rewind log
//!
//! A second LMDB environment, stored in `<path>/rewind/`, that journals every
//! put issued through the dispatcher. Puts are appended and committed to the
//! log before the main transaction commits; once the main commit succeeds the
//! durable marker advances past them and they are truncated. Entries beyond
//! the marker belong to a transaction whose main commit never completed and
//! are replayed when the root database is next opened, whether or not
//! journaling is enabled for that session.
//!
//! # Entry Layout
//!
//! ```text
//! ┌───────────┬──────────────┬───────┬────────────────┬─────────┬──────────┐
//! │ Ver (1)   │ Key len (8)  │ Key   │ Value len (8)  │ Value   │ CRC32 (4)│
//! └───────────┴──────────────┴───────┴────────────────┴─────────┴──────────┘
//! ```
//!
//! Integers are little-endian; the CRC covers every preceding byte. Log keys
//! are big-endian sequence numbers so the table iterates in append order.

use heed::byteorder::BigEndian;
use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use stress_core::{Error, Result};
use tracing::{debug, warn};

/// Directory of the rewind log, relative to the environment path.
pub const REWIND_DIR: &str = "rewind";

/// Current log entry format version
pub const ENTRY_FORMAT_VERSION: u8 = 1;

const LOG_DB: &str = "log";
const META_DB: &str = "meta";
const LAST_DURABLE_KEY: &str = "last_durable_sequence";

/// Version byte, two length fields, CRC.
const ENTRY_OVERHEAD: usize = 1 + 8 + 8 + 4;

type SequenceCodec = U64<BigEndian>;

/// One journaled put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Record key
    pub key: String,
    /// Record value
    pub value: Vec<u8>,
}

impl LogEntry {
    /// Journal entry for a put of `value` under `key`.
    pub fn new(key: &str, value: &[u8]) -> Self {
        LogEntry {
            key: key.to_owned(),
            value: value.to_vec(),
        }
    }

    /// Serialize the entry with its checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENTRY_OVERHEAD + self.key.len() + self.value.len());
        buf.push(ENTRY_FORMAT_VERSION);
        buf.extend_from_slice(&(self.key.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&(self.value.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.value);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Parse an entry stored at `sequence`, validating version and checksum.
    pub fn decode(sequence: u64, bytes: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| {
            Error::Corruption(format!("rewind log entry {}: {}", sequence, reason))
        };

        if bytes.len() < ENTRY_OVERHEAD {
            return Err(corrupt("truncated"));
        }
        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes(
            crc_bytes.try_into().map_err(|_| corrupt("truncated"))?,
        );
        if crc32fast::hash(body) != stored_crc {
            return Err(corrupt("checksum mismatch"));
        }
        if body[0] != ENTRY_FORMAT_VERSION {
            return Err(corrupt(&format!("unknown format version {}", body[0])));
        }

        let mut cursor = &body[1..];
        let key = take_field(&mut cursor).ok_or_else(|| corrupt("bad key length"))?;
        let value = take_field(&mut cursor).ok_or_else(|| corrupt("bad value length"))?;
        if !cursor.is_empty() {
            return Err(corrupt("trailing bytes"));
        }
        let key = std::str::from_utf8(key).map_err(|_| corrupt("key is not UTF-8"))?;

        Ok(LogEntry::new(key, value))
    }
}

/// Split a length-prefixed field off the front of `cursor`.
fn take_field<'a>(cursor: &mut &'a [u8]) -> Option<&'a [u8]> {
    if cursor.len() < 8 {
        return None;
    }
    let (len_bytes, rest) = cursor.split_at(8);
    let len = usize::try_from(u64::from_le_bytes(len_bytes.try_into().ok()?)).ok()?;
    if rest.len() < len {
        return None;
    }
    let (field, rest) = rest.split_at(len);
    *cursor = rest;
    Some(field)
}

/// Inclusive range of sequences written by one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSpan {
    /// First sequence appended
    pub first: u64,
    /// Last sequence appended
    pub last: u64,
}

/// Write-ahead journal paired with the main environment.
///
/// Appends happen only on the dispatcher's writer thread; the sequence
/// counter is atomic so readers on other threads can observe it.
pub struct RewindLog {
    env: Env,
    log: Database<SequenceCodec, Bytes>,
    meta: Database<Str, SequenceCodec>,
    current_sequence: AtomicU64,
}

impl RewindLog {
    /// Open (creating if needed) the rewind log in `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the log directory is private to one environment.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let log: Database<SequenceCodec, Bytes> = env.create_database(&mut wtxn, Some(LOG_DB))?;
        let meta: Database<Str, SequenceCodec> =
            env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let (last_appended, durable) = {
            let rtxn = env.read_txn()?;
            let last_appended = log.last(&rtxn)?.map(|(sequence, _)| sequence).unwrap_or(0);
            let durable = meta.get(&rtxn, LAST_DURABLE_KEY)?.unwrap_or(0);
            (last_appended, durable)
        };
        debug!(
            path = %path.display(),
            last_appended,
            durable,
            "opened rewind log"
        );

        Ok(Self {
            env,
            log,
            meta,
            current_sequence: AtomicU64::new(last_appended.max(durable)),
        })
    }

    /// Highest sequence appended so far.
    pub fn current_sequence(&self) -> u64 {
        self.current_sequence.load(Ordering::Acquire)
    }

    /// Highest sequence known to be committed in the main environment.
    pub fn last_durable_sequence(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.meta.get(&rtxn, LAST_DURABLE_KEY)?.unwrap_or(0))
    }

    /// Append `entries` in one log transaction.
    ///
    /// `entries` must not be empty.
    pub fn append(&self, entries: &[LogEntry]) -> Result<LogSpan> {
        let first = self.current_sequence() + 1;
        let mut sequence = first;
        let mut wtxn = self.env.write_txn()?;
        for entry in entries {
            self.log.put(&mut wtxn, &sequence, entry.encode().as_slice())?;
            sequence += 1;
        }
        wtxn.commit()?;

        let last = sequence - 1;
        self.current_sequence.store(last, Ordering::Release);
        Ok(LogSpan { first, last })
    }

    /// Record that everything up to `sequence` is committed in the main
    /// environment and drop those entries from the log.
    ///
    /// Marker and truncation commit together, so the log only ever holds
    /// entries past the marker.
    pub fn mark_durable(&self, sequence: u64) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.meta.put(&mut wtxn, LAST_DURABLE_KEY, &sequence)?;
        let truncated = self.log.delete_range(&mut wtxn, &(..=sequence))?;
        wtxn.commit()?;
        debug!(durable_sequence = sequence, truncated, "advanced durable marker");
        Ok(())
    }

    /// Remove a span whose main transaction failed to commit.
    pub fn discard(&self, span: LogSpan) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.log.delete_range(&mut wtxn, &(span.first..=span.last))?;
        wtxn.commit()?;
        self.current_sequence.store(span.first - 1, Ordering::Release);
        warn!(
            first = span.first,
            last = span.last,
            removed,
            "discarded rewind log span"
        );
        Ok(())
    }

    /// Entries appended after the durable marker, in sequence order.
    pub fn pending(&self) -> Result<Vec<(u64, LogEntry)>> {
        let durable = self.last_durable_sequence()?;
        let rtxn = self.env.read_txn()?;
        let mut pending = Vec::new();
        for item in self.log.range(&rtxn, &((durable + 1)..))? {
            let (sequence, bytes) = item?;
            pending.push((sequence, LogEntry::decode(sequence, bytes)?));
        }
        Ok(pending)
    }

    /// Number of entries in the log, all of them past the durable marker.
    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.log.len(&rtxn)?)
    }

    /// True if no entry is waiting on the main environment.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
