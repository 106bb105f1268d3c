//! Simulated machine input
//!
//! Applies the mutation events dashboards publish straight to the
//! in-memory store so edits show up on the values topic.

use std::sync::Arc;

use dashlink_state::{InMemoryStore, StateEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

pub async fn apply_events(mut events: broadcast::Receiver<StateEvent>, store: Arc<InMemoryStore>) {
    loop {
        match events.recv().await {
            Ok(event) => store.apply(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Input lagged, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("Event bus closed, input task stopped");
}
