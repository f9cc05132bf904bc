//! Read-back verification.

use serde::Serialize;
use std::fmt;
use stress_core::{decode_value, Origin, Result, VerificationIndex};
use stress_engine::{DatabaseHandle, Environment};
use tracing::{info, warn};

/// A record whose stored value does not match what was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// Key not present in the database.
    Missing {
        /// Generated key
        key: String,
        /// Where it was generated
        origin: Origin,
    },
    /// Key present with the wrong value.
    ValueDiffers {
        /// Generated key
        key: String,
        /// Where it was generated
        origin: Origin,
        /// Length of the stored value
        actual_len: usize,
        /// Origin the stored value decodes to, if it is well formed
        actual: Option<Origin>,
    },
}

impl Mismatch {
    /// The key this mismatch is about.
    pub fn key(&self) -> &str {
        match self {
            Mismatch::Missing { key, .. } | Mismatch::ValueDiffers { key, .. } => key,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Missing { key, origin } => {
                write!(f, "{} {}: missing", key, origin)
            }
            Mismatch::ValueDiffers {
                key,
                origin,
                actual_len,
                actual: Some(actual),
            } => write!(
                f,
                "{} {}: holds value for {} ({} bytes)",
                key, origin, actual, actual_len
            ),
            Mismatch::ValueDiffers {
                key,
                origin,
                actual_len,
                actual: None,
            } => write!(f, "{} {}: malformed value ({} bytes)", key, origin, actual_len),
        }
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Index entries looked up.
    pub checked: usize,
    /// Discrepancies, in key order.
    pub mismatches: Vec<Mismatch>,
}

impl VerificationReport {
    /// No mismatches were found.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Look up every indexed key inside one read transaction.
///
/// Mismatches are collected, not fatal. Only engine failures end the pass
/// early.
pub fn verify(
    env: &Environment,
    db: DatabaseHandle,
    index: &VerificationIndex,
) -> Result<VerificationReport> {
    let report = env.view(|txn| {
        let mut report = VerificationReport::default();
        for (key, origin) in index {
            report.checked += 1;
            let expected = origin.expected_value();
            let mismatch = match db.get(txn, key)? {
                None => Mismatch::Missing {
                    key: key.to_owned(),
                    origin,
                },
                Some(actual) if actual == expected.as_bytes() => continue,
                Some(actual) => Mismatch::ValueDiffers {
                    key: key.to_owned(),
                    origin,
                    actual_len: actual.len(),
                    actual: decode_value(actual),
                },
            };
            warn!("verification mismatch: {}", mismatch);
            report.mismatches.push(mismatch);
        }
        Ok(report)
    })?;

    info!("Checked {} entries", report.checked);
    if !report.is_clean() {
        warn!(mismatches = report.mismatches.len(), "verification failed");
    }
    Ok(report)
}
