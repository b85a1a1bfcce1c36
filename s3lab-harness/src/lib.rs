//! A load harness for the connection pool of an object-store client.
//!
//! The harness seeds one object per worker and then starts a population of
//! independent workers that fetch their object on a fixed-delay cadence, all
//! through one shared [`ObjectStore`](s3lab_service::ObjectStore). Every fetch
//! holds a pooled connection for a configurable *busy duration*, so a pool
//! smaller than the population is visibly contended.
//!
//! A monitor samples the [`PoolStatsRecorder`] once per second and logs the
//! request count and pool occupancy of the interval:
//!
//! ```text
//! 1423 requests handled, current pool={12 pending, 0 available, 150 leased}
//! ```
//!
//! Any unexpected fetch error ends the whole run. Workers that observe the
//! resulting shutdown stop silently.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod config;
pub mod corpus;
mod harness;
pub mod monitor;
pub mod schedule;
pub mod seed;
pub mod stats;
mod worker;

pub use crate::config::HarnessConfig;
pub use crate::corpus::ObjectName;
pub use crate::harness::{Completion, DEFAULT_MAX_WAIT, Harness, SHUTDOWN_GRACE_PERIOD};
pub use crate::seed::{SAMPLE_PAYLOAD, SeedError, SeedSummary, seed_corpus};
pub use crate::stats::PoolStatsRecorder;
pub use crate::worker::WORKER_STARTUP_DELAY;
