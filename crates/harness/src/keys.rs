//! Key sources for the loop driver.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stress_core::encode_key;

/// Produces the key token for each generated record.
pub trait KeySource {
    /// Next key token.
    fn next_key(&mut self) -> String;
}

impl<K: KeySource + ?Sized> KeySource for &mut K {
    fn next_key(&mut self) -> String {
        (**self).next_key()
    }
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn next_key(&mut self) -> String {
        (**self).next_key()
    }
}

/// Two independent pseudo-random `u32` draws per key.
///
/// No uniqueness check is made; a repeated pair yields a repeated key.
#[derive(Debug, Clone)]
pub struct RandomKeys {
    rng: StdRng,
}

impl RandomKeys {
    /// Reproducible keys from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Keys seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl KeySource for RandomKeys {
    fn next_key(&mut self) -> String {
        let a: u32 = self.rng.gen();
        let b: u32 = self.rng.gen();
        encode_key(a, b)
    }
}

/// Keys from a running counter: never repeats.
#[derive(Debug, Clone, Default)]
pub struct SequentialKeys {
    next: u64,
}

impl SequentialKeys {
    /// Start counting at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySource for SequentialKeys {
    fn next_key(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        encode_key((n >> 32) as u32, n as u32)
    }
}

/// Replays a fixed list of keys, then falls back to another source.
#[derive(Debug, Clone)]
pub struct ScriptedKeys<K> {
    script: std::collections::VecDeque<String>,
    fallback: K,
}

impl<K: KeySource> ScriptedKeys<K> {
    /// Yield `script` in order, then keys from `fallback`.
    pub fn new(script: impl IntoIterator<Item = String>, fallback: K) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
        }
    }
}

impl<K: KeySource> KeySource for ScriptedKeys<K> {
    fn next_key(&mut self) -> String {
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.next_key())
    }
}
