//! Captures log events emitted during a test for later assertions.
//!
//! ```
//! let (_guard, logs) = s3lab_test::logs::capture();
//! tracing::info!("3 requests handled");
//! assert!(logs.contains("requests handled"));
//! ```
//!
//! The capturing subscriber is installed as the thread-local default, so it
//! sees events from tasks running on a current-thread runtime only.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::tracing::field::{Field, Visit};
use ::tracing::subscriber::DefaultGuard;
use ::tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// A single captured log event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapturedEvent {
    /// Severity of the event.
    pub level: Level,
    /// Target of the event, usually the module path.
    pub target: String,
    /// The rendered message.
    pub message: String,
}

/// A [`Layer`] that records every event it observes.
///
/// Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns all events captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Returns the messages of all events at exactly the given level.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|event| event.level == level)
            .map(|event| event.message.clone())
            .collect()
    }

    /// Returns `true` if any captured message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|event| event.message.contains(needle))
    }

    /// Returns the number of events captured at exactly the given level.
    pub fn count_at(&self, level: Level) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

/// Installs a capturing subscriber as the default for the current thread.
///
/// Events are captured until the returned guard is dropped.
pub fn capture() -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(logs.clone());
    let guard = ::tracing::subscriber::set_default(subscriber);
    (guard, logs)
}
