//! Workers that repeatedly fetch their assigned object.

use std::ops::ControlFlow;
use std::time::Duration;

use s3lab_service::{Error, Result, SharedStore};
use tokio_util::sync::CancellationToken;

use crate::corpus::ObjectName;
use crate::schedule::schedule_repeating;

/// One-time delay before a worker's first fetch.
pub const WORKER_STARTUP_DELAY: Duration = Duration::from_millis(10);

/// A periodic task bound to a single object.
#[derive(Debug)]
pub(crate) struct Worker {
    pub object: ObjectName,
    pub bucket: String,
    pub busy_duration: Duration,
    pub idle_duration: Duration,
    pub store: SharedStore,
    pub shutdown: CancellationToken,
}

impl Worker {
    /// Runs fetch iterations until shutdown.
    pub async fn run(self) {
        let this = &self;
        schedule_repeating(
            move || this.iteration(),
            WORKER_STARTUP_DELAY,
            self.idle_duration,
            self.shutdown.clone(),
        )
        .await;
    }

    async fn iteration(&self) -> ControlFlow<()> {
        match self.fetch().await {
            Ok(bytes) => {
                tracing::debug!(object = %self.object, "Consumed {bytes} bytes");
                ControlFlow::Continue(())
            }
            // Already on the way down, so there is nothing to report.
            Err(error) if self.shutdown.is_cancelled() || Error::is_cancellation(&error) => {
                tracing::debug!(object = %self.object, %error, "Fetch interrupted by shutdown");
                ControlFlow::Break(())
            }
            Err(error) => {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    object = %self.object,
                    "S3 getObject failed"
                );
                self.shutdown.cancel();
                ControlFlow::Break(())
            }
        }
    }

    /// Fetches the object, holds it for the busy duration and drains it.
    async fn fetch(&self) -> Result<u64> {
        let object = self
            .store
            .fetch_object(&self.bucket, self.object.as_str())
            .await?;

        tokio::time::sleep(self.busy_duration).await;
        object.consume().await
    }
}
