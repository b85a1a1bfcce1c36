//! The `testPooling` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use s3lab_harness::{Completion, Harness, PoolStatsRecorder, SAMPLE_PAYLOAD, seed_corpus};
use s3lab_service::backend::S3Transport;
use s3lab_service::{PooledStore, SharedStore};

use crate::config::Config;

/// Runs the pooling test against the configured S3 endpoint.
pub async fn run(config: Config) -> Result<()> {
    let recorder = Arc::new(PoolStatsRecorder::new());
    let transport = S3Transport::new(config.s3_config()).context("failed to create S3 client")?;
    let store = PooledStore::new(transport, &config.pool_config()).with_listener(recorder.clone());

    tracing::info!(endpoint = %config.storage.endpoint, "Connecting to S3");
    run_with_store(&config, Arc::new(store), recorder).await
}

/// Seeds the corpus and runs the harness on `store` until it stops.
///
/// `recorder` must be the metrics listener of `store`. A run that ends because a request failed
/// is reported as an error. Reaching the configured maximum wait or an interrupt ends it cleanly.
pub async fn run_with_store(
    config: &Config,
    store: SharedStore,
    recorder: Arc<PoolStatsRecorder>,
) -> Result<()> {
    let harness_config = config.harness_config();
    let payload = Bytes::from_static(SAMPLE_PAYLOAD.as_bytes());
    seed_corpus(store.as_ref(), &harness_config, payload)
        .await
        .context("failed to seed the object corpus")?;

    let harness = Harness::start(&harness_config, store, recorder);

    tokio::select! {
        completion = harness.await_completion(config.runtime.max_wait) => match completion {
            Completion::TimedOut => {
                tracing::info!("Pooling test reached its maximum duration");
                Ok(())
            }
            Completion::Shutdown => anyhow::bail!("pooling test aborted after a failed request"),
        },
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for the interrupt signal")?;
            harness.shutdown();
            harness.await_completion(config.runtime.max_wait).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use s3lab_harness::corpus::corpus;
    use s3lab_service::PoolConfig;
    use s3lab_service::backend::InMemoryTransport;

    use super::*;

    fn config(concurrency: usize, max_wait: Duration) -> Config {
        let mut config = Config::default();
        config.load.concurrency = concurrency;
        config.runtime.max_wait = max_wait;
        config
    }

    fn store(transport: &InMemoryTransport, recorder: &Arc<PoolStatsRecorder>) -> SharedStore {
        let store = PooledStore::new(transport.clone(), &PoolConfig::default())
            .with_listener(recorder.clone());
        Arc::new(store)
    }

    #[tokio::test(start_paused = true)]
    async fn seeds_and_runs_until_max_wait() {
        let (_guard, logs) = s3lab_test::logs::capture();
        let config = config(3, Duration::from_millis(1500));
        let transport = InMemoryTransport::new();
        let recorder = Arc::new(PoolStatsRecorder::new());

        run_with_store(&config, store(&transport, &recorder), recorder)
            .await
            .unwrap();

        assert_eq!(transport.object_count(&config.storage.bucket), 3);
        assert!(transport.fetch_count() > 0);
        assert!(logs.contains("requests handled"));
        assert!(logs.contains("Pooling test reached its maximum duration"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_is_an_error() {
        s3lab_test::tracing::init();
        let config = config(2, Duration::from_secs(60));
        let transport = InMemoryTransport::new();
        for name in corpus(&config.storage.prefix, 2) {
            transport.insert(&config.storage.bucket, name.as_str(), "x");
        }
        transport.fail_next_fetch();
        let recorder = Arc::new(PoolStatsRecorder::new());

        let result = run_with_store(&config, store(&transport, &recorder), recorder).await;
        assert!(result.is_err());
    }
}
