//! Verification index
//!
//! Maps every generated key to the loop position it was generated at. The
//! loop driver owns the index exclusively while batches are generated and
//! hands it over by value once the last batch has committed, so no lock is
//! involved at any point.

use crate::record::Origin;
use std::collections::btree_map::{self, BTreeMap};

/// Generated key → origin, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationIndex {
    entries: BTreeMap<String, Origin>,
    collisions: usize,
}

impl VerificationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` was generated at `origin`.
    ///
    /// A key that is already present is replaced and counted as a
    /// collision; the replaced origin is returned.
    pub fn record(&mut self, key: String, origin: Origin) -> Option<Origin> {
        let previous = self.entries.insert(key, origin);
        if previous.is_some() {
            self.collisions += 1;
        }
        previous
    }

    /// Origin recorded for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Origin> {
        self.entries.get(key).copied()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no key was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records whose key replaced an earlier entry.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }
}

/// Iterator over `(key, origin)` pairs of a [`VerificationIndex`].
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, String, Origin>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Origin);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, origin)| (key.as_str(), *origin))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a VerificationIndex {
    type Item = (&'a str, Origin);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
