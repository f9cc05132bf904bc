//! lmdb-stress - write-serialization stress harness for LMDB
//!
//! LMDB binds every write transaction to the thread that began it. This
//! harness routes all update transactions through one dedicated writer
//! thread, drives batches of random-key puts through it, and then reads
//! every generated key back to confirm nothing was lost or reordered.
//!
//! # Quick Start
//!
//! ```ignore
//! use lmdb_stress::{run_harness, HarnessConfig};
//!
//! let config = HarnessConfig {
//!     loop_count: 2,
//!     batch_count: 3,
//!     path: "/tmp/lmdb-stress-demo".into(),
//!     ..HarnessConfig::default()
//! };
//! let report = run_harness(&config)?;
//! assert!(report.is_clean());
//! ```
//!
//! # Architecture
//!
//! - `stress-core`: errors, record encodings, verification index, config
//! - `stress-engine`: environment, write transactions, dispatcher, rewind log
//! - `stress-harness`: key sources, loop driver, verifier

pub use stress_core::{
    decode_value, encode_key, encode_value, Error, HarnessConfig, Origin, Record, Result,
    VerificationIndex, CONFIG_FILE_NAME, DEFAULT_MAP_SIZE, DEFAULT_PATH, VALUE_LEN,
};
pub use stress_engine::{
    CommandDispatcher, DatabaseHandle, DispatcherStats, Environment, EnvironmentOptions, LogEntry,
    LogSpan, RewindLog, TxnOp, WriteTxn, REWIND_DIR, WRITER_THREAD_NAME,
};
pub use stress_harness::{
    run_harness, run_with_keys, verify, CollisionPolicy, DriverOptions, HarnessReport, KeySource,
    LoopDriver, Mismatch, RandomKeys, ScriptedKeys, SequentialKeys, VerificationReport,
};
