//! Lifecycle of a pooling test run.

use std::sync::Arc;
use std::time::Duration;

use s3lab_service::SharedStore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::HarnessConfig;
use crate::corpus::{ObjectName, corpus};
use crate::monitor;
use crate::stats::PoolStatsRecorder;
use crate::worker::Worker;

/// Upper bound for in-flight tasks to wind down after shutdown.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default ceiling for [`Harness::await_completion`].
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Why [`Harness::await_completion`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    /// The shutdown signal fired, usually because a fetch failed.
    Shutdown,
    /// The maximum wait elapsed while all tasks were still running.
    TimedOut,
}

/// A running pooling test: one monitor task and one worker task per object.
///
/// All tasks share a single cancellation token. A worker that hits an
/// unexpected error cancels it, which stops every other worker and the
/// monitor at their next checkpoint.
#[derive(Debug)]
pub struct Harness {
    shutdown: CancellationToken,
    tracker: TaskTracker,
    objects: Vec<ObjectName>,
}

impl Harness {
    /// Starts the monitor and `config.concurrency` workers on the current tokio runtime.
    ///
    /// All workers fetch through the same `store`, whose metrics listener must be
    /// `recorder` for the monitor to report anything. Counts recorded before the
    /// start, for example while seeding, are discarded.
    pub fn start(
        config: &HarnessConfig,
        store: SharedStore,
        recorder: Arc<PoolStatsRecorder>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        recorder.reset();
        tracker.spawn(monitor::run(recorder, shutdown.clone()));

        let objects: Vec<_> = corpus(&config.prefix, config.concurrency).collect();
        for object in &objects {
            let worker = Worker {
                object: object.clone(),
                bucket: config.bucket.clone(),
                busy_duration: config.busy_duration,
                idle_duration: config.idle_duration,
                store: Arc::clone(&store),
                shutdown: shutdown.clone(),
            };
            tracker.spawn(worker.run());
        }
        tracker.close();

        tracing::info!(
            concurrency = config.concurrency,
            store = store.name(),
            "Started pooling test"
        );

        Self {
            shutdown,
            tracker,
            objects,
        }
    }

    /// Returns the number of workers.
    pub fn worker_count(&self) -> usize {
        self.objects.len()
    }

    /// Returns the object each worker is bound to, in worker order.
    pub fn objects(&self) -> &[ObjectName] {
        &self.objects
    }

    /// Stops all tasks. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Shutting down pooling test");
        }
        self.shutdown.cancel();
    }

    /// Returns `true` once the shutdown signal fired.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Waits until the shutdown signal fires or `max_wait` elapses.
    ///
    /// In both cases all tasks are stopped before returning. Tasks get up to
    /// [`SHUTDOWN_GRACE_PERIOD`] to finish their in-flight work.
    pub async fn await_completion(&self, max_wait: Duration) -> Completion {
        let completion = tokio::select! {
            () = self.shutdown.cancelled() => Completion::Shutdown,
            () = tokio::time::sleep(max_wait) => Completion::TimedOut,
        };

        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Tasks did not stop within the grace period"
            );
        }

        completion
    }
}
