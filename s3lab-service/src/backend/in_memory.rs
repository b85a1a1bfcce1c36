//! In-memory transport for tests.
//!
//! This provides a [`Transport`] backed by a `HashMap`, removing the need for a
//! running storage service in tests. The transport is [`Clone`] so tests can
//! hold a handle for inspection and fault injection while the store owns a
//! copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;

use super::common::{ObjectStream, Transport};
use crate::error::{Error, Result};

type Buckets = HashMap<String, HashMap<String, Bytes>>;

/// A [`Transport`] that keeps all buckets in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTransport {
    inner: Arc<InMemoryInner>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    buckets: Mutex<Buckets>,
    latency: Duration,
    fail_next_fetch: AtomicBool,
    fetches: AtomicU64,
    fetches_by_key: Mutex<HashMap<String, u64>>,
    puts: AtomicU64,
}

impl InMemoryTransport {
    /// Creates an empty transport with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty transport that delays every fetch by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(InMemoryInner {
                latency,
                ..Default::default()
            }),
        }
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets> {
        self.inner
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores an object directly, creating the bucket if needed.
    ///
    /// This bypasses the [`Transport`] trait and is not counted as a put.
    pub fn insert(&self, bucket: &str, key: &str, payload: impl Into<Bytes>) {
        self.buckets()
            .entry(bucket.to_owned())
            .or_default()
            .insert(key.to_owned(), payload.into());
    }

    /// Returns a clone of the stored contents, if present.
    pub fn get_stored(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets().get(bucket)?.get(key).cloned()
    }

    /// Returns the number of objects stored in the bucket.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets().get(bucket).map_or(0, HashMap::len)
    }

    /// Makes the next fetch fail with a non-cancellation error.
    pub fn fail_next_fetch(&self) {
        self.inner.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Returns the number of fetches that completed successfully.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Returns the number of successful fetches of the given key, in any bucket.
    pub fn fetch_count_of(&self, key: &str) -> u64 {
        let fetches = self
            .inner
            .fetches_by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        fetches.get(key).copied().unwrap_or(0)
    }

    /// Returns the number of objects uploaded through the transport.
    pub fn put_count(&self) -> u64 {
        self.inner.puts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.buckets().entry(bucket.to_owned()).or_default();
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.get_stored(bucket, key).is_some())
    }

    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()> {
        let mut buckets = self.buckets();
        let Some(objects) = buckets.get_mut(bucket) else {
            return Err(Error::Status {
                status: 404,
                context: format!("bucket `{bucket}` does not exist"),
            });
        };

        objects.insert(key.to_owned(), payload);
        self.inner.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }

        if self.inner.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(Error::generic(format!("injected failure fetching `{key}`")));
        }

        let Some(bytes) = self.get_stored(bucket, key) else {
            return Err(Error::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        };

        *self
            .inner
            .fetches_by_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_owned())
            .or_default() += 1;
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(futures_util::stream::once(async move { Ok(bytes) }).boxed())
    }
}
