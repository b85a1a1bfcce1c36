//! Deterministic naming of the seeded objects.

use std::fmt;

/// Bucket that holds the seeded corpus.
pub const DEFAULT_BUCKET: &str = "s3lab-bucket";

/// Prefix of every seeded object name.
pub const DEFAULT_PREFIX: &str = "s3lab-file";

/// The name of one seeded object, derived from a prefix and a worker index.
///
/// Each worker fetches exactly one object for its entire lifetime.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectName(String);

impl ObjectName {
    /// Returns the name for the object with the given index.
    pub fn new(prefix: &str, index: usize) -> Self {
        Self(format!("{prefix}{index}"))
    }

    /// Returns the object key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the names of a corpus with `count` objects, in index order.
pub fn corpus(prefix: &str, count: usize) -> impl Iterator<Item = ObjectName> + use<'_> {
    (0..count).map(move |index| ObjectName::new(prefix, index))
}
