//! Mapping of benchmark samples onto storage keys.
//!
//! Benchmarks reuse a small, pre-seeded pool of objects instead of uploading one
//! object per sample. A [`KeyScheme`] decides which key a given [`Sample`] fetches; the
//! default [`Keyspace`] cycles through `prefix-0 .. prefix-(size - 1)`.

use std::fmt;

/// Number of distinct objects in the default keyspace.
pub const DEFAULT_KEYSPACE_SIZE: u64 = 40;

/// One iteration of a benchmark, numbered from `1` to the sample count.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Sample(u64);

impl Sample {
    /// Creates a sample with the given index.
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// The index of this sample.
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives the storage key fetched for a sample.
///
/// Implementations must be pure: the same sample always maps to the same key, no matter
/// which worker handles it or when. Any `Fn(Sample) -> String` is a key scheme.
pub trait KeyScheme: Send + Sync + 'static {
    /// Returns the key to fetch for `sample`.
    fn key_for(&self, sample: Sample) -> String;
}

impl<F> KeyScheme for F
where
    F: Fn(Sample) -> String + Send + Sync + 'static,
{
    fn key_for(&self, sample: Sample) -> String {
        self(sample)
    }
}

/// A bounded pool of keys named `<prefix>-<n>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keyspace {
    prefix: String,
    size: u64,
}

impl Keyspace {
    /// Creates a keyspace of `size` keys sharing `prefix`.
    ///
    /// A `size` of zero is treated as one.
    pub fn new(prefix: impl Into<String>, size: u64) -> Self {
        Self {
            prefix: prefix.into(),
            size: size.max(1),
        }
    }

    /// The number of distinct keys.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the key at position `n`, wrapping around the keyspace.
    pub fn key(&self, n: u64) -> String {
        format!("{}-{}", self.prefix, n % self.size)
    }

    /// Iterates all keys of the keyspace with their positions.
    pub fn keys(&self) -> impl Iterator<Item = (u64, String)> + '_ {
        (0..self.size).map(|n| (n, self.key(n)))
    }
}

impl KeyScheme for Keyspace {
    fn key_for(&self, sample: Sample) -> String {
        self.key(sample.index())
    }
}
