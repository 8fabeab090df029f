//! # Clock Face Core Library
//!
//! This library drives a clock face (digital or analog) on a small embedded display and
//! keeps it correct as wall-clock time advances and as time-synchronization state changes.
//!
//! ## Design Philosophy
//!
//! ### One owned context
//! All mutable UI state (the widget tree, the live [`render::RenderState`], the last observed
//! sync value and the display mode) lives in a single [`app::ClockContext`] created when the
//! clock is shown and dropped when it is hidden. Nothing is process-wide.
//!
//! ### Rebuild vs. refresh
//! - **Full rebuild**: on first show, on a sync-state edge and on a mode toggle. The old widget
//!   subtree is destroyed before the new one is built.
//! - **Incremental refresh**: every second otherwise. Hands and labels of the already-built
//!   subtree are mutated in place.
//!
//! ### Locking
//! The widget tree is shared between the UI context and periodic timer tasks, so every
//! operation touching it runs under one reentrant [`lock::UiLock`] with a bounded wait.
//! A tick that cannot get the lock in time is skipped; the next one catches up.
//!
//! ## Data Flow
//! 1. **Sync poll** samples the time source and posts the result to a pending slot
//! 2. **Refresh tick** consumes it: edge → rebuild, unsynced → message, synced → hands/text
//! 3. **Mode toggle** flips and persists [`ClockMode`], then takes the rebuild path
//!
//! ## Core Types
//! - [`ClockMode`]: persisted analog/digital preference
//! - [`RenderKind`]: which of the three visual states is live

use std::fmt;

// Module declarations
pub mod app;
pub mod config;
pub mod geometry;
pub mod lock;
pub mod mode;
pub mod prefs;
pub mod render;
pub mod renderer;
pub mod scheduler;
pub mod sync;
pub mod widgets;

/// Analog or digital presentation of a synchronized clock.
///
/// Persisted as the boolean `is_analog` flag; [`ClockMode::Digital`] is the default when
/// nothing has been stored yet.
///
/// # Example
/// ```
/// use clock_face::ClockMode;
///
/// let mode = ClockMode::default();
/// assert_eq!(mode, ClockMode::Digital);
/// assert_eq!(mode.toggled(), ClockMode::Analog);
/// assert_eq!(mode.toggled().toggled(), mode);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// Clock face with hour, minute and second hands
    Analog,
    /// Text time and date
    #[default]
    Digital,
}

impl ClockMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            ClockMode::Analog => ClockMode::Digital,
            ClockMode::Digital => ClockMode::Analog,
        }
    }

    pub fn is_analog(self) -> bool {
        self == ClockMode::Analog
    }

    /// Build from the persisted `is_analog` flag.
    pub fn from_analog_flag(is_analog: bool) -> Self {
        if is_analog {
            ClockMode::Analog
        } else {
            ClockMode::Digital
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Analog => f.write_str("analog"),
            ClockMode::Digital => f.write_str("digital"),
        }
    }
}

/// The three mutually exclusive visual states of the clock container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    /// "Time not synced" prompt with a connect button
    Unsynced,
    /// Analog face
    Analog,
    /// Digital time and date labels
    Digital,
}

impl RenderKind {
    /// Target state for a rebuild given the current sync value and mode.
    ///
    /// Unsynced preempts both clock modes.
    pub fn target(synced: bool, mode: ClockMode) -> Self {
        match (synced, mode) {
            (false, _) => RenderKind::Unsynced,
            (true, ClockMode::Analog) => RenderKind::Analog,
            (true, ClockMode::Digital) => RenderKind::Digital,
        }
    }
}
