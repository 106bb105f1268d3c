//! Live telemetry broadcaster for web dashboards
//!
//! This crate provides a WebSocket server that publishes the machine's
//! state to dashboard clients as minimal deltas, and routes the small set
//! of commands dashboards send back.
//!
//! # Features
//!
//! - Four topics selected by connect path: `/dashboard` (alias
//!   `/webdashboard`), `/values`, `/match`, `/log`
//! - `&`/`=` delimited text protocol
//! - Per-topic diff caches, cleared on join or on request
//! - Bounded drop-oldest log queues with a periodic log flush
//! - Value overrides, autonomous route selection and mode changes
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dashlink_broadcaster::{
//!     ConnectionRegistry, DashboardBroadcaster, DashboardServer, DashboardSettings, RequestDispatcher,
//! };
//! use dashlink_state::{ChannelEventBus, InMemoryStore, SharedModeController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broadcaster = Arc::new(DashboardBroadcaster::new(
//!         Arc::new(ConnectionRegistry::new()),
//!         Arc::new(InMemoryStore::new()),
//!         DashboardSettings::default(),
//!         Duration::from_millis(250),
//!     ));
//!     let dispatcher = Arc::new(RequestDispatcher::new(
//!         broadcaster.clone(),
//!         Arc::new(ChannelEventBus::new()),
//!         Arc::new(SharedModeController::default()),
//!     ));
//!
//!     let server = DashboardServer::new("0.0.0.0:5801".parse()?, broadcaster.clone(), dispatcher);
//!     server.start().await?;
//!
//!     // Driven by the host's fixed-rate scheduler
//!     broadcaster.tick().await;
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod differ;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod registry;
pub mod server;
pub mod settings;
pub mod topic;
pub mod wire;

// Re-exports
pub use broadcaster::{DashboardBroadcaster, SELECTED_AUTO_KEY};
pub use dispatcher::{Request, RequestDispatcher, ValueChange};
pub use error::{BroadcasterError, ProtocolError, Result};
pub use log::{LogEvent, LogLevel, DEFAULT_LOG_FLUSH_INTERVAL, LOG_QUEUE_CAPACITY};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound};
pub use server::DashboardServer;
pub use settings::{AutonomousOptions, DashboardSettings, MatchValueSpec, MatchValueType};
pub use topic::Topic;
pub use wire::{ResponseKind, WireMessage};
