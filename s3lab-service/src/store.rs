//! The object-store client consumed by the load harness.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;

use crate::backend::{ObjectStream, Transport};
use crate::error::{Error, Result};
use crate::metrics::{RequestKind, RequestMetrics, RequestMetricsListener};
use crate::pool::{ConnectionPool, Lease, PoolConfig, PoolStats};

/// A type-erased, shareable [`ObjectStore`].
pub type SharedStore = Arc<dyn ObjectStore>;

/// Client for bucket and object operations against a storage service.
#[async_trait::async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns `true` if the bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Creates the bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Returns `true` if an object with the given key exists in the bucket.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Stores `payload` under the given key.
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()>;

    /// Fetches an object.
    ///
    /// The returned [`FetchedObject`] may hold on to a pooled connection until it
    /// is consumed or dropped.
    async fn fetch_object(&self, bucket: &str, key: &str) -> Result<FetchedObject>;
}

/// The contents of a fetched object.
pub struct FetchedObject {
    stream: ObjectStream,
    lease: Option<Lease>,
}

impl FetchedObject {
    /// Creates an object from a content stream that holds no pooled connection.
    pub fn new(stream: ObjectStream) -> Self {
        Self {
            stream,
            lease: None,
        }
    }

    /// Attaches a pooled connection that is released once the object is consumed.
    pub fn with_lease(mut self, lease: Lease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Returns `true` if the object still holds a pooled connection.
    pub fn holds_connection(&self) -> bool {
        self.lease.is_some()
    }

    /// Drains the contents and releases the connection.
    ///
    /// Returns the number of bytes read.
    pub async fn consume(mut self) -> Result<u64> {
        let mut total = 0;
        while let Some(chunk) = self.stream.next().await {
            total += chunk?.len() as u64;
        }
        Ok(total)
    }
}

impl fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedObject")
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// An [`ObjectStore`] that routes every request through a bounded [`ConnectionPool`].
///
/// Each request first snapshots the pool occupancy, then leases a connection
/// and hands the request to its [`Transport`]. Once the transport answers, the
/// registered [`RequestMetricsListener`] is notified with the snapshot. Fetched
/// objects keep their lease until their contents are consumed.
pub struct PooledStore<T> {
    transport: T,
    pool: ConnectionPool,
    listener: Option<Arc<dyn RequestMetricsListener>>,
}

impl<T: Transport> PooledStore<T> {
    /// Creates a new store with a fresh pool.
    pub fn new(transport: T, config: &PoolConfig) -> Self {
        Self {
            transport,
            pool: ConnectionPool::new(config),
            listener: None,
        }
    }

    /// Registers the listener that receives per-request metrics.
    ///
    /// There is exactly one listener; registering another replaces it.
    pub fn with_listener(mut self, listener: Arc<dyn RequestMetricsListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Returns the connection pool of this store.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn execute<R, F>(&self, kind: RequestKind, request: F) -> Result<(R, Lease)>
    where
        F: Future<Output = Result<R>>,
    {
        let lease = self.pool.acquire().await?;
        let result = request.await;

        if !matches!(result, Err(Error::Cancelled)) {
            self.notify(kind, lease.requested_stats());
        }

        result.map(|response| (response, lease))
    }

    fn notify(&self, kind: RequestKind, pool: PoolStats) {
        if let Some(listener) = &self.listener {
            listener.on_request(&RequestMetrics { kind, pool });
        }
    }
}

impl<T: Transport> fmt::Debug for PooledStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledStore")
            .field("transport", &self.transport)
            .field("pool", &self.pool.stats())
            .field("capacity", &self.pool.capacity())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<T: Transport> ObjectStore for PooledStore<T> {
    fn name(&self) -> &'static str {
        self.transport.name()
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let request = self.transport.bucket_exists(bucket);
        let (exists, _lease) = self.execute(RequestKind::BucketExists, request).await?;
        Ok(exists)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let request = self.transport.create_bucket(bucket);
        self.execute(RequestKind::CreateBucket, request).await?;
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let request = self.transport.object_exists(bucket, key);
        let (exists, _lease) = self.execute(RequestKind::ObjectExists, request).await?;
        Ok(exists)
    }

    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()> {
        let request = self.transport.put_object(bucket, key, payload);
        self.execute(RequestKind::PutObject, request).await?;
        Ok(())
    }

    async fn fetch_object(&self, bucket: &str, key: &str) -> Result<FetchedObject> {
        let request = self.transport.get_object(bucket, key);
        let (stream, lease) = self.execute(RequestKind::GetObject, request).await?;
        Ok(FetchedObject::new(stream).with_lease(lease))
    }
}
