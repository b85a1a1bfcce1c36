//! Periodic reporting of connection pool occupancy.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use s3lab_service::PoolStats;
use tokio_util::sync::CancellationToken;

use crate::schedule::schedule_repeating;
use crate::stats::PoolStatsRecorder;

/// Delay between two monitor samples.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// What the monitor observed during one interval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IntervalReport {
    /// Requests completed since the previous report.
    pub requests: u64,
    /// The most recent pool snapshot.
    pub pool: PoolStats,
}

impl fmt::Display for IntervalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let PoolStats {
            pending,
            available,
            leased,
        } = self.pool;

        write!(
            f,
            "{} requests handled, current pool={{{pending} pending, {available} available, {leased} leased}}",
            self.requests
        )
    }
}

/// Drains the recorder and logs one line for the interval.
///
/// If no request completed since the last sample, nothing is logged and the
/// request counter is left untouched.
pub fn sample(recorder: &PoolStatsRecorder) -> Option<IntervalReport> {
    let pool = recorder.take_snapshot()?;
    let report = IntervalReport {
        requests: recorder.take_requests(),
        pool,
    };

    tracing::info!("{report}");
    Some(report)
}

/// Samples the recorder immediately and then once per [`MONITOR_INTERVAL`] until shutdown.
pub(crate) async fn run(recorder: Arc<PoolStatsRecorder>, shutdown: CancellationToken) {
    schedule_repeating(
        || {
            sample(&recorder);
            std::future::ready(ControlFlow::Continue(()))
        },
        Duration::ZERO,
        MONITOR_INTERVAL,
        shutdown,
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_format() {
        let report = IntervalReport {
            requests: 42,
            pool: PoolStats {
                pending: 3,
                available: 0,
                leased: 150,
            },
        };

        assert_eq!(
            report.to_string(),
            "42 requests handled, current pool={3 pending, 0 available, 150 leased}"
        );
    }

    #[test]
    fn empty_interval_is_not_reported() {
        let (_guard, logs) = s3lab_test::logs::capture();
        let recorder = PoolStatsRecorder::new();

        assert_eq!(sample(&recorder), None);
        assert!(logs.events().is_empty());
    }

    #[test]
    fn snapshot_is_not_reused() {
        let (_guard, logs) = s3lab_test::logs::capture();
        let recorder = PoolStatsRecorder::new();
        recorder.record(PoolStats {
            pending: 0,
            available: 1,
            leased: 1,
        });
        recorder.record(PoolStats::default());

        let report = sample(&recorder).unwrap();
        assert_eq!(report.requests, 2);
        assert_eq!(report.pool, PoolStats::default());

        assert_eq!(sample(&recorder), None);
        assert_eq!(
            logs.messages_at(tracing::Level::INFO),
            ["2 requests handled, current pool={0 pending, 0 available, 0 leased}"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn samples_every_interval() {
        let (_guard, logs) = s3lab_test::logs::capture();
        let recorder = Arc::new(PoolStatsRecorder::new());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&recorder), shutdown.clone()));

        // The immediate first sample finds nothing.
        tokio::time::sleep(MONITOR_INTERVAL / 2).await;
        recorder.record(PoolStats::default());
        recorder.record(PoolStats::default());
        tokio::time::sleep(MONITOR_INTERVAL).await;
        // Nothing recorded during the following interval.
        tokio::time::sleep(MONITOR_INTERVAL).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(
            logs.messages_at(tracing::Level::INFO),
            ["2 requests handled, current pool={0 pending, 0 available, 0 leased}"]
        );
    }
}
