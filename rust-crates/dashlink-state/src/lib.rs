//! Machine state collaborators for dashlink
//!
//! The dashboard core never owns telemetry. It talks to three collaborators
//! defined here:
//!
//! - [`StateStore`] - read-all-by-kind snapshots plus single-key get/set
//! - [`EventBus`] - publish-only mutation events
//! - [`ModeController`] - operating-mode changes
//!
//! In-memory implementations are provided for the daemon and for tests.

pub mod bus;
pub mod error;
pub mod mode;
pub mod models;
pub mod store;

// Re-export main types
pub use bus::{ChannelEventBus, EventBus};
pub use error::{Result, StateError};
pub use mode::{ModeController, SharedModeController};
pub use models::{format_decimal, Mode, OutputValue, StateEvent, Vector};
pub use store::{InMemoryStore, StateStore};
