//! Core types for lmdb-stress
//!
//! This crate defines the foundational types shared by the engine and the
//! harness:
//! - Error: the single error type and `Result` alias
//! - Record encoding: key tokens, fixed-width values, `Origin`
//! - VerificationIndex: generated key → origin, built by the loop driver
//! - HarnessConfig: TOML-backed run configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod index;
pub mod record;

pub use config::{
    validate_limits, HarnessConfig, CONFIG_FILE_NAME, DEFAULT_MAP_SIZE, DEFAULT_PATH,
    MAP_SIZE_ALIGNMENT,
};
pub use error::{Error, Result};
pub use index::VerificationIndex;
pub use record::{decode_value, encode_key, encode_value, Origin, Record, VALUE_LEN};
