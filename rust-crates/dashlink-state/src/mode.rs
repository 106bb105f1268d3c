//! Operating-mode controller

use parking_lot::RwLock;
use tracing::info;

use crate::models::Mode;

pub trait ModeController: Send + Sync {
    fn set_mode(&self, mode: Mode);
}

/// Mode controller that only records the requested mode
#[derive(Debug)]
pub struct SharedModeController {
    mode: RwLock<Mode>,
}

impl SharedModeController {
    pub fn new(initial: Mode) -> Self {
        Self {
            mode: RwLock::new(initial),
        }
    }

    pub fn mode(&self) -> Mode {
        *self.mode.read()
    }
}

impl Default for SharedModeController {
    fn default() -> Self {
        Self::new(Mode::Disabled)
    }
}

impl ModeController for SharedModeController {
    fn set_mode(&self, mode: Mode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!("Mode changed: {} -> {}", previous, mode);
        }
    }
}
