use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the object store.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation was interrupted because the client is shutting down.
    #[error("operation cancelled")]
    Cancelled,

    /// No pooled connection became available within the acquisition timeout.
    #[error("timed out after {timeout:?} waiting for a pooled connection")]
    PoolTimeout {
        /// The configured acquisition timeout.
        timeout: Duration,
    },

    /// The requested object does not exist.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound {
        /// The bucket that was queried.
        bucket: String,
        /// The key of the missing object.
        key: String,
    },

    /// The storage service answered with a non-success status code.
    #[error("{context}: unexpected status {status}")]
    Status {
        /// The HTTP status code returned by the service.
        status: u16,
        /// The operation that was attempted.
        context: String,
    },

    /// Errors stemming from the AWS SDK, including signing and bucket operations.
    #[error("s3 error: {context}")]
    S3 {
        /// The operation that was attempted.
        context: String,
        /// The underlying error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Errors from the reqwest client used to stream object contents.
    ///
    /// These are mostly network errors, such as refused connections or broken bodies.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// The operation that was attempted.
        context: String,
        /// The underlying error.
        #[source]
        cause: reqwest::Error,
    },

    /// IO errors related to payload streaming.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error, which might be specific to one transport.
    #[error("storage error: {context}")]
    Generic {
        /// A description of what failed.
        context: String,
        /// The underlying error.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a [`Error::Generic`] without an underlying cause.
    pub fn generic(context: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            cause: None,
        }
    }

    /// Returns `true` if `error` or any error in its source chain is [`Error::Cancelled`].
    pub fn is_cancellation(error: &(dyn std::error::Error + 'static)) -> bool {
        let mut current = Some(error);
        while let Some(error) = current {
            if let Some(Error::Cancelled) = error.downcast_ref::<Error>() {
                return true;
            }

            // `io::Error` skips its wrapped error when walking sources.
            if let Some(inner) = error
                .downcast_ref::<std::io::Error>()
                .and_then(|io| io.get_ref())
                && let Some(Error::Cancelled) = inner.downcast_ref::<Error>()
            {
                return true;
            }

            current = error.source();
        }

        false
    }
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
