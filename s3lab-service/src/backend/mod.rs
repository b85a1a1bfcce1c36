//! Transports that carry requests to a storage service.

pub mod common;
pub mod in_memory;
pub mod s3_compatible;

pub use common::{ObjectStream, Transport};
pub use in_memory::InMemoryTransport;
pub use s3_compatible::{S3Config, S3Transport};
