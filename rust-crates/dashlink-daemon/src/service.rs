//! Fixed-rate broadcast scheduler

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashlink_broadcaster::DashboardBroadcaster;
use dashlink_state::StateStore;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Store key receiving the duration of the last tick, in milliseconds
pub const FRAME_TIME_KEY: &str = "ipn_frame_time_webdashboard_service";

/// Drives [`DashboardBroadcaster::tick`] at a fixed rate
pub struct TickService {
    broadcaster: Arc<DashboardBroadcaster>,
    store: Arc<dyn StateStore>,
    period: Duration,
    threshold: Duration,
}

impl TickService {
    pub fn new(
        broadcaster: Arc<DashboardBroadcaster>,
        store: Arc<dyn StateStore>,
        period: Duration,
        threshold: Duration,
    ) -> Self {
        Self {
            broadcaster,
            store,
            period,
            threshold,
        }
    }

    /// Run one broadcast cycle and record how long it took
    pub async fn tick_once(&self) -> Duration {
        let start = Instant::now();
        self.broadcaster.tick().await;
        let elapsed = start.elapsed();

        let millis = elapsed.as_secs_f64() * 1000.0;
        self.store.set_numeric(FRAME_TIME_KEY, millis);

        if elapsed > self.threshold {
            warn!(
                "Dashboard tick took {:.2} ms (budget {} ms)",
                millis,
                self.threshold.as_millis()
            );
        }

        elapsed
    }

    /// Tick forever. Slow ticks delay the next one instead of bunching up.
    pub async fn run(&self) {
        info!("Broadcast service running every {:?}", self.period);

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashlink_broadcaster::{ConnectionRegistry, DashboardSettings};
    use dashlink_state::InMemoryStore;

    #[tokio::test]
    async fn test_tick_records_frame_time() {
        let store = Arc::new(InMemoryStore::new());
        let broadcaster = Arc::new(DashboardBroadcaster::new(
            Arc::new(ConnectionRegistry::new()),
            store.clone(),
            DashboardSettings::default(),
            Duration::from_millis(250),
        ));
        let service = TickService::new(
            broadcaster,
            store.clone(),
            Duration::from_millis(16),
            Duration::from_millis(20),
        );

        assert_eq!(store.get_numeric(FRAME_TIME_KEY), None);
        let elapsed = service.tick_once().await;

        let recorded = store.get_numeric(FRAME_TIME_KEY).unwrap();
        assert!(recorded >= 0.0);
        assert!((recorded - elapsed.as_secs_f64() * 1000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_slow_tick_is_not_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let broadcaster = Arc::new(DashboardBroadcaster::new(
            Arc::new(ConnectionRegistry::new()),
            store.clone(),
            DashboardSettings::default(),
            Duration::from_millis(250),
        ));
        // Zero budget: every tick is over
        let service = TickService::new(broadcaster, store.clone(), Duration::from_millis(16), Duration::ZERO);

        service.tick_once().await;
        service.tick_once().await;
        assert!(store.get_numeric(FRAME_TIME_KEY).is_some());
    }
}
