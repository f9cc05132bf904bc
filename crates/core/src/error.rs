//! Error types for the stress harness
//!
//! Every component returns [`Result`]. We use `thiserror` for the `Display`
//! and `Error` implementations; storage engine and filesystem errors convert
//! losslessly through `#[from]`.

use crate::record::Origin;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the stress harness
#[derive(Debug, Error)]
pub enum Error {
    /// Failure reported by the storage engine (open, put, get, commit, ...)
    #[error("Storage engine error: {0}")]
    Engine(#[from] heed::Error),

    /// I/O error (directory creation, permissions, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Rejected environment options or configuration file
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A command was submitted after the dispatcher shut down
    #[error("Command dispatcher is closed")]
    DispatcherClosed,

    /// The submitted operation panicked on the writer thread
    #[error("Operation panicked on the writer thread: {0}")]
    OperationPanicked(String),

    /// A bounded submit did not observe its completion in time
    #[error("Commit not observed within {0:?}")]
    DeadlineExceeded(Duration),

    /// The same key was generated twice under the strict key policy
    #[error("Key collision on {key:?}: generated at {first} and again at {second}")]
    KeyCollision {
        /// The duplicated key
        key: String,
        /// Where the key was first generated
        first: Origin,
        /// Where the key was generated again
        second: Origin,
    },

    /// A rewind log entry failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),
}

impl Error {
    /// Returns true if the error originated in the storage engine.
    pub fn is_engine(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}
