use std::time::Duration;

use crate::corpus::{DEFAULT_BUCKET, DEFAULT_PREFIX};

/// Settings of one pooling test run.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Bucket holding the corpus.
    pub bucket: String,
    /// Prefix of the object names.
    pub prefix: String,
    /// Number of workers, and therefore of seeded objects.
    pub concurrency: usize,
    /// How long a worker holds a fetched object before draining it.
    pub busy_duration: Duration,
    /// Delay between the end of one fetch and the start of a worker's next fetch.
    pub idle_duration: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_owned(),
            prefix: DEFAULT_PREFIX.to_owned(),
            concurrency: 1000,
            busy_duration: Duration::from_millis(10),
            idle_duration: Duration::from_millis(100),
        }
    }
}
