//! Forwards tracing events into the dashboard log queues

use std::fmt;
use std::sync::Arc;

use dashlink_broadcaster::{DashboardBroadcaster, LogLevel};
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Layer feeding every event's message to [`DashboardBroadcaster::append_log`].
///
/// Attach it with [`level_filter`] to bound what dashboards see.
pub struct DashboardLogLayer {
    broadcaster: Arc<DashboardBroadcaster>,
}

impl DashboardLogLayer {
    pub fn new(broadcaster: Arc<DashboardBroadcaster>) -> Self {
        Self { broadcaster }
    }
}

/// Per-layer filter matching a configured dashboard log level
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

impl<S> Layer<S> for DashboardLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // Structured events without a message are not shown
        if let Some(message) = visitor.message {
            let level = LogLevel::from(*event.metadata().level());
            self.broadcaster.append_log(level, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dashlink_broadcaster::{ConnectionRegistry, DashboardSettings};
    use dashlink_state::InMemoryStore;
    use tracing_subscriber::layer::SubscriberExt;

    fn broadcaster() -> Arc<DashboardBroadcaster> {
        Arc::new(DashboardBroadcaster::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(InMemoryStore::new()),
            DashboardSettings::default(),
            Duration::from_millis(250),
        ))
    }

    #[test]
    fn test_events_reach_both_queues() {
        let broadcaster = broadcaster();
        let subscriber = tracing_subscriber::registry()
            .with(DashboardLogLayer::new(broadcaster.clone()).with_filter(level_filter(LogLevel::Info)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Robot enabled");
            tracing::warn!(code = 7, "Battery at {}%", 12);
        });

        assert_eq!(broadcaster.pending_log_count(), 2);
        assert_eq!(broadcaster.pending_match_log_count(), 2);
    }

    #[test]
    fn test_level_filter_applies() {
        let broadcaster = broadcaster();
        let subscriber = tracing_subscriber::registry()
            .with(DashboardLogLayer::new(broadcaster.clone()).with_filter(level_filter(LogLevel::Warn)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("noise");
            tracing::info!("routine");
            tracing::error!("Motor stalled");
        });

        assert_eq!(broadcaster.pending_log_count(), 1);
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_filter(LogLevel::Error), LevelFilter::ERROR);
        assert_eq!(level_filter(LogLevel::Trace), LevelFilter::TRACE);
    }
}
