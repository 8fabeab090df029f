//! # Display Mode Controller
//!
//! Owns the in-memory [`ClockMode`] and keeps the persisted `is_analog` flag in step with it.
//! Persistence is best-effort: a failed read starts in digital mode, a failed write is logged
//! and the in-memory value stays authoritative for the session.
//!
//! The controller does not touch widgets. Callers follow a toggle with a full rebuild.

use crate::prefs::{PreferenceStore, KEY_IS_ANALOG};
use crate::ClockMode;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ModeController {
    mode: ClockMode,
    store: Arc<dyn PreferenceStore>,
}

impl ModeController {
    /// Read the persisted mode, defaulting to digital when absent or unreadable.
    pub fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let mode = match store.get_bool(KEY_IS_ANALOG) {
            Ok(Some(is_analog)) => ClockMode::from_analog_flag(is_analog),
            Ok(None) => ClockMode::default(),
            Err(e) => {
                warn!(error = %e, "Could not read clock mode, using {}", ClockMode::default());
                ClockMode::default()
            }
        };
        Self { mode, store }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Flip the mode and persist it. Returns the new mode.
    pub fn toggle(&mut self) -> ClockMode {
        self.mode = self.mode.toggled();
        if let Err(e) = self.store.set_bool(KEY_IS_ANALOG, self.mode.is_analog()) {
            warn!(error = %e, "Could not persist clock mode; keeping it for this session");
        }
        info!("Toggling mode to: {}", self.mode);
        self.mode
    }
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
