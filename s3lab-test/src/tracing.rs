//! Log output for tests.

use ::tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that sets the level for the s3lab crates.
const LEVEL_VAR: &str = "S3LAB_TEST_LOG";

const WORKSPACE_CRATES: &[&str] = &["s3lab", "s3lab_cli", "s3lab_harness", "s3lab_service"];

/// Passes events of the s3lab crates up to `level`, and only errors from dependencies.
fn workspace_targets(level: LevelFilter) -> Targets {
    WORKSPACE_CRATES
        .iter()
        .fold(Targets::new().with_default(LevelFilter::ERROR), |targets, name| {
            targets.with_target(*name, level)
        })
}

/// Installs a global subscriber that writes to the output captured by the test runner.
///
/// The s3lab crates log at `TRACE` unless `S3LAB_TEST_LOG` names another level. Dependencies
/// such as the AWS SDK only show errors. Calling this more than once keeps the first subscriber.
///
/// ```
/// s3lab_test::tracing::init();
/// ```
pub fn init() {
    let level = std::env::var(LEVEL_VAR)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::TRACE);

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .with_target(true)
        .compact()
        .finish()
        .with(workspace_targets(level))
        .try_init()
        .ok();
}
