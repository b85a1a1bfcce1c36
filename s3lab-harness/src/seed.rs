//! Seeding of the object corpus before a run.

use bytes::Bytes;
use s3lab_service::{Error, ObjectStore};
use thiserror::Error;

use crate::config::HarnessConfig;
use crate::corpus::corpus;

/// Sample contents uploaded for every seeded object.
pub const SAMPLE_PAYLOAD: &str = include_str!("../resources/sample.txt");

/// Errors that abort a run before any worker starts.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The bucket could not be looked up or created.
    #[error("failed to prepare bucket `{bucket}`")]
    Bucket {
        /// The bucket name.
        bucket: String,
        /// The underlying error.
        #[source]
        cause: Error,
    },

    /// An object could not be looked up or uploaded.
    #[error("failed to seed object `{key}`")]
    Object {
        /// The object name.
        key: String,
        /// The underlying error.
        #[source]
        cause: Error,
    },
}

/// Outcome of [`seed_corpus`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SeedSummary {
    /// Objects that were uploaded.
    pub created: usize,
    /// Objects that already existed and were left untouched.
    pub existing: usize,
}

/// Makes sure the bucket exists and contains one object per worker.
///
/// Objects that already exist are not overwritten, so seeding the same corpus
/// twice is a no-op.
pub async fn seed_corpus(
    store: &dyn ObjectStore,
    config: &HarnessConfig,
    payload: Bytes,
) -> Result<SeedSummary, SeedError> {
    let bucket = config.bucket.as_str();
    let bucket_error = |cause| SeedError::Bucket {
        bucket: bucket.to_owned(),
        cause,
    };

    if !store.bucket_exists(bucket).await.map_err(bucket_error)? {
        store.create_bucket(bucket).await.map_err(bucket_error)?;
        tracing::info!(bucket, "Created bucket");
    }

    let mut summary = SeedSummary::default();
    for name in corpus(&config.prefix, config.concurrency) {
        let key = name.as_str();
        let object_error = |cause| SeedError::Object {
            key: key.to_owned(),
            cause,
        };

        if store.object_exists(bucket, key).await.map_err(object_error)? {
            summary.existing += 1;
            continue;
        }

        store
            .put_object(bucket, key, payload.clone())
            .await
            .map_err(object_error)?;
        summary.created += 1;
    }

    tracing::info!(
        bucket,
        created = summary.created,
        existing = summary.existing,
        "Seeded objects"
    );
    Ok(summary)
}
