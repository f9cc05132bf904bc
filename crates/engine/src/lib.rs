//! Storage engine layer for lmdb-stress
//!
//! This crate wraps the LMDB environment and owns every write path:
//! - Environment: open/configure, stale reader reclamation, root database
//! - WriteTxn: update transaction handed to dispatcher operations
//! - CommandDispatcher: single writer thread, FIFO command queue
//! - RewindLog: write-ahead journal replayed after a crash
//!
//! The only way to obtain a [`WriteTxn`] is through
//! [`CommandDispatcher::submit`], so every mutation runs on the writer
//! thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod environment;
pub mod rewind;
pub mod txn;

pub use dispatcher::{CommandDispatcher, DispatcherStats, TxnOp, WRITER_THREAD_NAME};
pub use environment::{DatabaseHandle, Environment, EnvironmentOptions};
pub use rewind::{LogEntry, LogSpan, RewindLog, REWIND_DIR};
pub use txn::WriteTxn;
