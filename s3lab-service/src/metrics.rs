//! Per-request instrumentation hook.
//!
//! A [`PooledStore`](crate::PooledStore) reports every completed request to a
//! single registered [`RequestMetricsListener`], regardless of which task
//! issued the request.

use std::fmt::Debug;

use crate::pool::PoolStats;

/// The type of request that completed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RequestKind {
    /// Checking whether a bucket exists.
    BucketExists,
    /// Creating a bucket.
    CreateBucket,
    /// Checking whether an object exists.
    ObjectExists,
    /// Uploading an object.
    PutObject,
    /// Fetching an object's contents.
    GetObject,
}

/// Metrics collected for a single completed request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestMetrics {
    /// The type of request.
    pub kind: RequestKind,
    /// Occupancy of the connection pool at the time the request asked for a connection.
    pub pool: PoolStats,
}

/// Receives [`RequestMetrics`] once per completed request.
///
/// Implementations are called concurrently from every task using the store
/// and must not block.
pub trait RequestMetricsListener: Debug + Send + Sync + 'static {
    /// Called after a request has completed.
    fn on_request(&self, metrics: &RequestMetrics);
}
