//! The transport abstraction shared by all storage backends.

use std::fmt::Debug;

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::Result;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("s3lab/", env!("CARGO_PKG_VERSION"));

/// The streamed contents of a fetched object.
pub type ObjectStream = BoxStream<'static, Result<Bytes>>;

/// The raw request layer underneath a [`PooledStore`](crate::PooledStore).
///
/// Transports perform a single request per call. Connection admission and
/// metrics are handled by the store wrapping them.
#[async_trait::async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// The transport name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns `true` if the bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Creates the bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Returns `true` if an object with the given key exists in the bucket.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Stores `payload` under the given key, overwriting existing contents.
    async fn put_object(&self, bucket: &str, key: &str, payload: Bytes) -> Result<()>;

    /// Starts fetching an object and returns a stream of its contents.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the object does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream>;
}
