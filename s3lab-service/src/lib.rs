//! The service layer provides the object-store client used by the load harness.
//!
//! Requests go through a [`PooledStore`], which combines three pieces:
//!
//! - a [`Transport`](backend::Transport) that performs the actual request, for
//!   example against an S3-compatible service,
//! - a bounded [`ConnectionPool`] that admits at most `max_connections`
//!   concurrent requests and makes the rest wait up to a timeout,
//! - a single [`RequestMetricsListener`] that is told about the pool occupancy
//!   after every completed request.
//!
//! The pool's own admission control is the only serialization between callers;
//! the store adds no locking of its own.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
mod error;
pub mod metrics;
pub mod pool;
mod store;

pub use error::{Error, Result};
pub use metrics::{RequestKind, RequestMetrics, RequestMetricsListener};
pub use pool::{ConnectionPool, Lease, PoolConfig, PoolStats};
pub use store::{FetchedObject, ObjectStore, PooledStore, SharedStore};
