use std::sync::Arc;
use std::time::{Duration, Instant};

use dashlink_state::StateStore;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;

use crate::differ::{merged_values, MatchDiffer, ValuesDiffer, ValuesSnapshot};
use crate::log::{BoundedQueue, LogEvent, LogLevel, PeriodicGate, LOG_QUEUE_CAPACITY};
use crate::registry::ConnectionRegistry;
use crate::settings::{DashboardSettings, MatchValueType};
use crate::topic::Topic;
use crate::wire::{join_list, scrub_reserved, ResponseKind, WireMessage, LIST_SEPARATOR, MATCH_RECORD_SEPARATOR};

/// Store key holding the human-readable autonomous selection
pub const SELECTED_AUTO_KEY: &str = "ips_selected_auto";

const NO_AUTO: &str = "No Auto";

/// Diff-based broadcaster for dashboard clients.
///
/// Driven by an external fixed-rate tick. Each tick publishes the values
/// and match deltas; the log topic is flushed on its own slower period.
pub struct DashboardBroadcaster {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn StateStore>,
    settings: DashboardSettings,
    values: Mutex<ValuesDiffer>,
    match_values: Mutex<MatchDiffer>,
    // Log queues are fed from logging callbacks, so they use blocking locks
    // that are never held across an await or while logging.
    log_messages: SyncMutex<BoundedQueue<LogEvent>>,
    match_log_messages: SyncMutex<BoundedQueue<LogEvent>>,
    log_gate: SyncMutex<PeriodicGate>,
}

impl DashboardBroadcaster {
    /// Create a broadcaster over a shared registry and store.
    ///
    /// Seeds the selected-auto string with its placeholder.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn StateStore>,
        settings: DashboardSettings,
        log_flush_interval: Duration,
    ) -> Self {
        store.set_string(SELECTED_AUTO_KEY, NO_AUTO);

        Self {
            registry,
            store,
            settings,
            values: Mutex::new(ValuesDiffer::new()),
            match_values: Mutex::new(MatchDiffer::new()),
            log_messages: SyncMutex::new(BoundedQueue::new(LOG_QUEUE_CAPACITY)),
            match_log_messages: SyncMutex::new(BoundedQueue::new(LOG_QUEUE_CAPACITY)),
            log_gate: SyncMutex::new(PeriodicGate::new(log_flush_interval)),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Log sink entry point. Feeds both log queues.
    ///
    /// Reserved wire tokens are scrubbed since log text can carry client
    /// input. Must stay free of logging calls: it runs inside the logging
    /// pipeline.
    pub fn append_log(&self, level: LogLevel, message: impl Into<String>) {
        let event = LogEvent::new(level, scrub_reserved(&message.into()));
        self.match_log_messages.lock().push(event.clone());
        self.log_messages.lock().push(event);
    }

    /// Number of events waiting for the log topic
    pub fn pending_log_count(&self) -> usize {
        self.log_messages.lock().len()
    }

    /// Number of events waiting for the match topic's log fields
    pub fn pending_match_log_count(&self) -> usize {
        self.match_log_messages.lock().len()
    }

    /// One broadcast cycle, called by the external scheduler
    pub async fn tick(&self) {
        self.broadcast_values().await;
        self.broadcast_match_values().await;

        let gate_open = self.log_gate.lock().try_open(Instant::now());
        if gate_open {
            self.flush_log().await;
        }
    }

    /// Publish changed store entries to the values topic.
    ///
    /// Returns true if a message was sent.
    pub async fn broadcast_values(&self) -> bool {
        if self.registry.subscriber_count(Topic::Values).await == 0 {
            return false;
        }

        let snapshot = ValuesSnapshot::capture(self.store.as_ref());
        let records = self.values.lock().await.diff(snapshot);
        if records.is_empty() {
            return false;
        }

        let message = WireMessage::response(ResponseKind::Values)
            .with("values", records.join(LIST_SEPARATOR))
            .encode();
        self.registry.broadcast(Topic::Values, &message).await;
        true
    }

    /// Publish changed match values, in configured order.
    ///
    /// Returns true if a message was sent.
    pub async fn broadcast_match_values(&self) -> bool {
        if self.registry.subscriber_count(Topic::Match).await == 0 {
            return false;
        }

        let has_log_field = self
            .settings
            .match_values
            .iter()
            .any(|spec| spec.kind == MatchValueType::Log);
        let mut pending_logs = if has_log_field {
            self.match_log_messages.lock().drain()
        } else {
            Vec::new()
        };

        let values = merged_values(self.store.as_ref());
        let records = self
            .match_values
            .lock()
            .await
            .diff(&self.settings.match_values, &values, &mut pending_logs);
        if records.is_empty() {
            return false;
        }

        let message = WireMessage::response(ResponseKind::MatchValues)
            .with("values", records.join(MATCH_RECORD_SEPARATOR))
            .encode();
        self.registry.broadcast(Topic::Match, &message).await;
        true
    }

    /// Send every queued log event to the log topic, ignoring the gate.
    ///
    /// With no subscribers the queue is left alone so the backlog reaches
    /// the next one to join. Returns true if a message was sent.
    pub async fn flush_log(&self) -> bool {
        if self.registry.subscriber_count(Topic::Log).await == 0 {
            return false;
        }

        let events = self.log_messages.lock().drain();
        if events.is_empty() {
            return false;
        }

        let mut messages = String::new();
        for event in &events {
            event.render_into(&mut messages);
        }

        let message = WireMessage::response(ResponseKind::Log)
            .with("messages", messages)
            .encode();
        self.registry.broadcast(Topic::Log, &message).await;
        true
    }

    /// Topic-specific behaviour for a connection that just joined
    pub async fn on_open(&self, topic: Topic) {
        match topic {
            Topic::Dashboard => {
                self.send_auto_data().await;
                self.send_connected().await;
            }
            Topic::Values => self.clear_values_cache().await,
            Topic::Match => {
                self.send_auto_data().await;
                self.clear_match_cache().await;
            }
            // Next gated flush delivers the backlog
            Topic::Log => {}
        }
    }

    /// Force a full resend on the values topic
    pub async fn clear_values_cache(&self) {
        self.values.lock().await.clear();
    }

    /// Force a full resend on the match topic
    pub async fn clear_match_cache(&self) {
        self.match_values.lock().await.clear();
    }

    /// Send the autonomous option lists to the dashboard and match topics
    pub async fn send_auto_data(&self) {
        let options = &self.settings.auto_selector;
        let message = WireMessage::response(ResponseKind::AutoData)
            .with("auto_origin_list", join_list(&options.origins))
            .with("auto_destination_list", join_list(&options.destinations))
            .with("auto_action_list", join_list(&options.actions))
            .encode();

        self.registry.broadcast(Topic::Dashboard, &message).await;
        self.registry.broadcast(Topic::Match, &message).await;
    }

    /// Acknowledge the dashboard connection
    pub async fn send_connected(&self) {
        let message = WireMessage::response(ResponseKind::Connected)
            .with("connected", "true")
            .encode();
        self.registry.broadcast(Topic::Dashboard, &message).await;
    }
}
