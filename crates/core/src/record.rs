//! Record encoding
//!
//! Keys are two 32-bit values rendered as right-aligned decimal fields:
//!
//! ```text
//! hello-  12345678-4294967295
//! ```
//!
//! Values are the outer and inner loop indices, each zero-padded to
//! [`VALUE_FIELD_WIDTH`] digits and concatenated, so every value is exactly
//! [`VALUE_LEN`] bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every generated key.
pub const KEY_PREFIX: &str = "hello";

/// Width of each numeric field in a key.
pub const KEY_FIELD_WIDTH: usize = 10;

/// Length of a generated key in bytes.
pub const KEY_LEN: usize = KEY_PREFIX.len() + 2 * (1 + KEY_FIELD_WIDTH);

/// Width of each zero-padded index in a value.
pub const VALUE_FIELD_WIDTH: usize = 500;

/// Length of an encoded value in bytes.
pub const VALUE_LEN: usize = 2 * VALUE_FIELD_WIDTH;

/// The (outer, inner) loop position a record was generated at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Origin {
    /// Batch (transaction) index
    pub outer: usize,
    /// Record index within the batch
    pub inner: usize,
}

impl Origin {
    /// Create an origin from loop indices.
    pub fn new(outer: usize, inner: usize) -> Self {
        Origin { outer, inner }
    }

    /// The value a record generated at this origin must hold.
    pub fn expected_value(&self) -> String {
        encode_value(*self)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.outer, self.inner)
    }
}

/// One generated key/value pair together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Generated key
    pub key: String,
    /// Encoded value
    pub value: String,
    /// Loop position
    pub origin: Origin,
}

impl Record {
    /// Build the record for `key` generated at `origin`.
    pub fn new(key: String, origin: Origin) -> Self {
        Record {
            key,
            value: encode_value(origin),
            origin,
        }
    }
}

/// Encode two random draws into a key token.
pub fn encode_key(a: u32, b: u32) -> String {
    format!(
        "{KEY_PREFIX}-{a:>width$}-{b:>width$}",
        width = KEY_FIELD_WIDTH
    )
}

/// Encode an origin into its fixed-width value.
pub fn encode_value(origin: Origin) -> String {
    format!(
        "{:0width$}{:0width$}",
        origin.outer,
        origin.inner,
        width = VALUE_FIELD_WIDTH
    )
}

/// Decode a stored value back into the origin it encodes.
///
/// Returns `None` if the bytes are not a well-formed value. Used to
/// describe what a mismatching record actually holds.
pub fn decode_value(bytes: &[u8]) -> Option<Origin> {
    if bytes.len() != VALUE_LEN || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?;
    let (outer, inner) = text.split_at(VALUE_FIELD_WIDTH);
    Some(Origin {
        outer: parse_padded(outer)?,
        inner: parse_padded(inner)?,
    })
}

fn parse_padded(field: &str) -> Option<usize> {
    let digits = field.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}
