//! # Clock Context
//!
//! The single owned context behind a shown clock. It holds the widget tree, the live
//! [`RenderState`], the last observed sync value and the [`ModeController`], all behind one
//! reentrant [`UiLock`]. Host collaborators come in as typed capabilities ([`ClockDeps`]).
//!
//! ## Entry Points
//! Every entry point acquires the UI lock with a bounded wait:
//! - [`ClockContext::refresh_tick`]: routine 1 Hz tick (short budget, skipped on timeout)
//! - [`ClockContext::rebuild`]: full rebuild (long budget)
//! - [`ClockContext::toggle_mode`]: mode toggle followed by a rebuild
//! - [`ClockContext::click`]: input dispatch for the toolbar and prompt buttons
//!
//! Nested acquisition (a tick or toggle calling [`ClockContext::rebuild`]) re-enters the lock.
//! A nested call that would need the UI state while an outer call on the same thread still
//! holds it is refused with [`UiError::Reentered`] (a tick is skipped instead).
//!
//! ## Tick Ordering
//! 1. Consume the pending sync sample (or sample inline)
//! 2. Sync edge → full rebuild, nothing else this tick
//! 3. Unsynced → rewrite the prompt message only
//! 4. Otherwise → move hands / rewrite text in place

use crate::config::{Config, SyncCheck};
use crate::lock::{LockTimeout, UiLock};
use crate::mode::ModeController;
use crate::prefs::PreferenceStore;
use crate::render::{self, RenderState};
use crate::sync::{is_synchronized, TimeSource};
use crate::widgets::{WidgetError, WidgetId, WidgetKind, WidgetTree};
use crate::{ClockMode, RenderKind};
use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use std::cell::{Ref, RefCell, RefMut};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Height of the toolbar strip above the clock container
pub const TOOLBAR_HEIGHT: u32 = 40;
pub const MODE_BUTTON_LABEL: &str = "Mode";

/// The host's "use 24-hour format" setting, read-only from the clock's side.
pub trait TimeFormat: Send + Sync {
    fn use_24_hour(&self) -> bool;
}

/// A time-format setting the host can flip at runtime.
#[derive(Debug, Default)]
pub struct SharedTimeFormat(AtomicBool);

impl SharedTimeFormat {
    pub fn new(use_24_hour: bool) -> Self {
        Self(AtomicBool::new(use_24_hour))
    }

    pub fn set(&self, use_24_hour: bool) {
        self.0.store(use_24_hour, Ordering::Relaxed);
    }
}

impl TimeFormat for SharedTimeFormat {
    fn use_24_hour(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outbound "launch network configuration" action.
pub trait NetworkLauncher: Send + Sync {
    fn launch_network_config(&self);
}

/// Launcher for hosts without a network settings screen.
#[derive(Debug, Default)]
pub struct LogLauncher;

impl NetworkLauncher for LogLauncher {
    fn launch_network_config(&self) {
        info!("Network configuration requested");
    }
}

/// Host capabilities handed to the clock when it is shown.
#[derive(Clone)]
pub struct ClockDeps {
    pub time: Arc<dyn TimeSource>,
    pub time_format: Arc<dyn TimeFormat>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub launcher: Arc<dyn NetworkLauncher>,
}

/// Latest sync sample posted by the sync poll and not yet consumed by a tick.
///
/// Single writer (sync poll), single reader (refresh tick).
#[derive(Debug, Default)]
pub struct PendingSync(AtomicU8);

impl PendingSync {
    const EMPTY: u8 = 0;
    const UNSYNCED: u8 = 1;
    const SYNCED: u8 = 2;

    pub fn post(&self, synced: bool) {
        let value = if synced { Self::SYNCED } else { Self::UNSYNCED };
        self.0.store(value, Ordering::Release);
    }

    pub fn take(&self) -> Option<bool> {
        match self.0.swap(Self::EMPTY, Ordering::AcqRel) {
            Self::SYNCED => Some(true),
            Self::UNSYNCED => Some(false),
            _ => None,
        }
    }
}

/// What a refresh tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The lock was busy; nothing was touched
    Skipped,
    /// Sync state changed and the clock was rebuilt into this state
    Rebuilt(RenderKind),
    /// Unsynced: only the prompt message was rewritten
    Message,
    /// Hands or text updated in place
    Refreshed,
}

/// What a click was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    ModeToggled(ClockMode),
    NetworkConfigLaunched,
    Ignored,
}

/// Everything the UI lock protects.
struct UiState {
    tree: WidgetTree,
    toolbar: WidgetId,
    container: WidgetId,
    mode_button: WidgetId,
    render: Option<RenderState>,
    last_sync: bool,
    mode: ModeController,
}

/// Owned context of a shown clock.
pub struct ClockContext {
    ui: UiLock<RefCell<UiState>>,
    pending: PendingSync,
    sync_check: SyncCheck,
    tick_timeout: Duration,
    rebuild_timeout: Duration,
    deps: ClockDeps,
}

impl ClockContext {
    /// Create the surface, load the mode, sample sync and perform the first rebuild.
    pub fn show(deps: ClockDeps, config: &Config) -> Result<Self, WidgetError> {
        let size = Size::new(config.display.width, config.display.height);
        let mut tree = WidgetTree::new(Size::new(size.width, size.height + TOOLBAR_HEIGHT));
        let root = tree.root();

        let toolbar = tree.create(
            root,
            WidgetKind::Container,
            Rectangle::new(Point::zero(), Size::new(size.width, TOOLBAR_HEIGHT)),
        )?;
        let button_area = mode_button_area(size.width);
        let mode_button = tree.create(toolbar, WidgetKind::Button, button_area)?;
        tree.create(
            mode_button,
            WidgetKind::Label {
                text: MODE_BUTTON_LABEL.to_string(),
            },
            Rectangle::new(Point::zero(), button_area.size),
        )?;
        let container = tree.create(
            root,
            WidgetKind::Container,
            Rectangle::new(Point::new(0, TOOLBAR_HEIGHT as i32), size),
        )?;

        let mode = ModeController::load(deps.prefs.clone());
        let last_sync = is_synchronized(&deps.time.now());
        info!(mode = %mode.mode(), synced = last_sync, "Showing clock");

        let context = Self {
            ui: UiLock::new(RefCell::new(UiState {
                tree,
                toolbar,
                container,
                mode_button,
                render: None,
                last_sync,
                mode,
            })),
            pending: PendingSync::default(),
            sync_check: config.schedule.sync_check,
            tick_timeout: config.schedule.tick_lock_timeout(),
            rebuild_timeout: config.schedule.rebuild_lock_timeout(),
            deps,
        };

        // Nobody else can hold the lock yet
        if let Err(e) = context.rebuild() {
            warn!(error = %e, "Initial clock build failed");
        }
        Ok(context)
    }

    /// Sample the time source for the sync poll.
    pub fn sample_sync(&self) -> bool {
        is_synchronized(&self.deps.time.now())
    }

    /// Hand a sync sample from the poll task to the next refresh tick.
    pub fn post_sync(&self, synced: bool) {
        self.pending.post(synced);
    }

    /// One refresh-poll tick.
    pub fn refresh_tick(&self) -> TickOutcome {
        let guard = match self.ui.try_lock_for(self.tick_timeout) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "UI lock timeout in refresh tick - skipping update");
                return TickOutcome::Skipped;
            }
        };

        let mut ui = match write_state(&guard) {
            Ok(ui) => ui,
            Err(e) => {
                warn!(error = %e, "Refresh tick re-entered - skipping update");
                return TickOutcome::Skipped;
            }
        };
        let now = self.deps.time.now();
        let synced = match self.sync_check {
            SyncCheck::Inline => is_synchronized(&now),
            SyncCheck::Polled => self.pending.take().unwrap_or(ui.last_sync),
        };

        if synced != ui.last_sync {
            info!(synced, "Sync state changed");
            ui.last_sync = synced;
            drop(ui);
            // Re-enters the lock we already hold
            return match self.rebuild() {
                Ok(kind) => TickOutcome::Rebuilt(kind),
                Err(e) => {
                    warn!(error = %e, "Rebuild after sync change failed");
                    TickOutcome::Skipped
                }
            };
        }

        let UiState { tree, render, .. } = &mut *ui;
        let Some(render) = render.as_mut() else {
            return TickOutcome::Skipped;
        };
        render.refresh(tree, &now, self.deps.time_format.use_24_hour());
        trace!(kind = ?render.kind(), "Refreshed clock");

        if synced {
            TickOutcome::Refreshed
        } else {
            TickOutcome::Message
        }
    }

    /// Destroy the current subtree and build the state matching sync and mode.
    pub fn rebuild(&self) -> Result<RenderKind, UiError> {
        let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
        let mut ui = write_state(&guard)?;
        let ui = &mut *ui;
        let now = self.deps.time.now();

        let target = RenderKind::target(ui.last_sync, ui.mode.mode());
        ui.tree.set_hidden(ui.mode_button, !ui.last_sync);

        // The old subtree is gone whether or not the new one builds
        ui.render = None;
        let state = render::rebuild(
            &mut ui.tree,
            ui.container,
            target,
            &now,
            self.deps.time_format.use_24_hour(),
        )?;
        ui.render = Some(state);
        Ok(target)
    }

    /// Flip analog/digital, persist it and rebuild.
    pub fn toggle_mode(&self) -> Result<ClockMode, UiError> {
        let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
        let mode = write_state(&guard)?.mode.toggle();
        self.rebuild()?;
        drop(guard);
        Ok(mode)
    }

    /// Route a click on `widget` to its action.
    pub fn click(&self, widget: WidgetId) -> Result<ClickOutcome, UiError> {
        let (is_mode_button, is_connect_button) = {
            let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
            let ui = read_state(&guard)?;
            let visible = |id: WidgetId| ui.tree.is_valid(id) && !ui.tree.is_hidden(id);
            let connect = ui.render.as_ref().and_then(RenderState::connect_button);
            (
                widget == ui.mode_button && visible(widget),
                connect == Some(widget) && visible(widget),
            )
        };

        if is_mode_button {
            return self.toggle_mode().map(ClickOutcome::ModeToggled);
        }
        if is_connect_button {
            // Outside the lock: the host may switch screens synchronously
            self.deps.launcher.launch_network_config();
            return Ok(ClickOutcome::NetworkConfigLaunched);
        }
        debug!(?widget, "Click ignored");
        Ok(ClickOutcome::Ignored)
    }

    /// Change the host size. The toolbar is re-laid at once; the clock container's
    /// contents follow at the next rebuild.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), UiError> {
        let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
        let mut ui = write_state(&guard)?;
        let ui = &mut *ui;
        let root = ui.tree.root();
        ui.tree
            .set_size(root, Size::new(width, height + TOOLBAR_HEIGHT));
        ui.tree
            .set_size(ui.toolbar, Size::new(width, TOOLBAR_HEIGHT));
        ui.tree
            .set_position(ui.mode_button, mode_button_area(width).top_left);
        ui.tree.set_size(ui.container, Size::new(width, height));
        Ok(())
    }

    /// Run `f` against the widget tree under the UI lock (for drawing and inspection).
    ///
    /// `f` may call back into the context; calls that need to mutate the clock are refused
    /// with [`UiError::Reentered`] while the view is held.
    pub fn with_view<R>(&self, f: impl FnOnce(&ClockView<'_>) -> R) -> Result<R, UiError> {
        let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
        let ui = read_state(&guard)?;
        let view = ClockView {
            tree: &ui.tree,
            container: ui.container,
            mode_button: ui.mode_button,
            render: ui.render.as_ref(),
            mode: ui.mode.mode(),
            synced: ui.last_sync,
        };
        Ok(f(&view))
    }

    /// Clear the redraw marks, reporting whether a redraw is due.
    pub fn take_redraw(&self) -> Result<bool, UiError> {
        let guard = self.ui.try_lock_for(self.rebuild_timeout)?;
        let redraw = write_state(&guard)?.tree.take_dirty();
        Ok(redraw)
    }
}

/// Read-only snapshot handed to [`ClockContext::with_view`].
pub struct ClockView<'a> {
    pub tree: &'a WidgetTree,
    pub container: WidgetId,
    pub mode_button: WidgetId,
    pub render: Option<&'a RenderState>,
    pub mode: ClockMode,
    pub synced: bool,
}

impl ClockView<'_> {
    pub fn kind(&self) -> Option<RenderKind> {
        self.render.map(RenderState::kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error(transparent)]
    Lock(#[from] LockTimeout),
    #[error("UI state is already in use further up this thread's call stack")]
    Reentered,
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

fn read_state(cell: &RefCell<UiState>) -> Result<Ref<'_, UiState>, UiError> {
    cell.try_borrow().map_err(|_| UiError::Reentered)
}

fn write_state(cell: &RefCell<UiState>) -> Result<RefMut<'_, UiState>, UiError> {
    cell.try_borrow_mut().map_err(|_| UiError::Reentered)
}

/// Mode button area: right-aligned in the toolbar, vertically centred.
fn mode_button_area(width: u32) -> Rectangle {
    let size = Size::new(72, TOOLBAR_HEIGHT * 8 / 10);
    Rectangle::new(
        Point::new(
            width as i32 - size.width as i32 - 8,
            (TOOLBAR_HEIGHT - size.height) as i32 / 2,
        ),
        size,
    )
}

/// Capabilities for hosts without their own time-format setting or network screen.
pub fn default_deps(
    time: Arc<dyn TimeSource>,
    prefs: Arc<dyn PreferenceStore>,
    use_24_hour: bool,
) -> ClockDeps {
    ClockDeps {
        time,
        time_format: Arc::new(SharedTimeFormat::new(use_24_hour)),
        prefs,
        launcher: Arc::new(LogLauncher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{MemoryPreferences, KEY_IS_ANALOG};
    use crate::render::{MESSAGE_NOT_SYNCED, TITLE_NOT_SYNCED};
    use crate::sync::ManualClock;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct CountingLauncher(AtomicUsize);

    impl NetworkLauncher for CountingLauncher {
        fn launch_network_config(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        prefs: Arc<MemoryPreferences>,
        format: Arc<SharedTimeFormat>,
        launcher: Arc<CountingLauncher>,
        ctx: ClockContext,
    }

    fn synced_clock() -> ManualClock {
        ManualClock::at(2024, 3, 5, 14, 5, 9)
    }

    fn harness(clock: ManualClock, sync_check: SyncCheck) -> Harness {
        harness_with_prefs(clock, sync_check, Arc::new(MemoryPreferences::new()))
    }

    fn harness_with_prefs(
        clock: ManualClock,
        sync_check: SyncCheck,
        prefs: Arc<MemoryPreferences>,
    ) -> Harness {
        let clock = Arc::new(clock);
        let format = Arc::new(SharedTimeFormat::new(true));
        let launcher = Arc::new(CountingLauncher::default());
        let deps = ClockDeps {
            time: clock.clone(),
            time_format: format.clone(),
            prefs: prefs.clone(),
            launcher: launcher.clone(),
        };
        let mut config = Config::default();
        config.schedule.sync_check = sync_check;
        config.schedule.tick_lock_timeout_ms = 20;
        config.schedule.rebuild_lock_timeout_ms = 100;
        let ctx = ClockContext::show(deps, &config).unwrap();
        Harness {
            clock,
            prefs,
            format,
            launcher,
            ctx,
        }
    }

    fn kind(ctx: &ClockContext) -> Option<RenderKind> {
        ctx.with_view(|v| v.kind()).unwrap()
    }

    fn time_text(ctx: &ClockContext) -> Option<String> {
        ctx.with_view(|v| match v.render {
            Some(RenderState::Digital(view)) => v.tree.text(view.time_label).map(str::to_string),
            _ => None,
        })
        .unwrap()
    }

    fn status_text(ctx: &ClockContext) -> Option<String> {
        ctx.with_view(|v| match v.render {
            Some(RenderState::Unsynced(view)) => {
                v.tree.text(view.status_label).map(str::to_string)
            }
            _ => None,
        })
        .unwrap()
    }

    fn subtree_size(ctx: &ClockContext) -> usize {
        ctx.with_view(|v| v.tree.descendant_count(v.container))
            .unwrap()
    }

    fn sync_epoch(clock: &ManualClock) {
        clock.set(crate::sync::unix_epoch());
    }

    fn sync_now(clock: &ManualClock) {
        clock.set(
            NaiveDate::from_ymd_opt(2024, 3, 5)
                .and_then(|d| d.and_hms_opt(14, 5, 9))
                .unwrap(),
        );
    }

    #[test]
    fn test_show_synced_starts_digital() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Digital));
        assert_eq!(time_text(&h.ctx).as_deref(), Some("14:05:09"));
        let mode_hidden = h
            .ctx
            .with_view(|v| v.tree.is_hidden(v.mode_button))
            .unwrap();
        assert!(!mode_hidden);
    }

    #[test]
    fn test_show_respects_persisted_mode() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set_bool(KEY_IS_ANALOG, true).unwrap();
        let h = harness_with_prefs(synced_clock(), SyncCheck::Polled, prefs);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Analog));
    }

    #[test]
    fn test_show_unsynced_prompt_and_message_tick() {
        let h = harness(ManualClock::unsynced(), SyncCheck::Polled);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Unsynced));
        let mode_hidden = h
            .ctx
            .with_view(|v| v.tree.is_hidden(v.mode_button))
            .unwrap();
        assert!(mode_hidden);

        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Message);
        assert_eq!(status_text(&h.ctx).as_deref(), Some(MESSAGE_NOT_SYNCED));
        assert_ne!(MESSAGE_NOT_SYNCED, TITLE_NOT_SYNCED);
    }

    #[test]
    fn test_polled_transition_waits_for_posted_sample() {
        let h = harness(ManualClock::unsynced(), SyncCheck::Polled);
        sync_now(&h.clock);

        // The clock moved but nothing was posted: no transition yet
        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Message);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Unsynced));

        h.ctx.post_sync(h.ctx.sample_sync());
        assert_eq!(
            h.ctx.refresh_tick(),
            TickOutcome::Rebuilt(RenderKind::Digital)
        );
        assert_eq!(kind(&h.ctx), Some(RenderKind::Digital));
        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Refreshed);
    }

    #[test]
    fn test_inline_transition_both_ways() {
        let h = harness(synced_clock(), SyncCheck::Inline);
        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Refreshed);

        sync_epoch(&h.clock);
        assert_eq!(
            h.ctx.refresh_tick(),
            TickOutcome::Rebuilt(RenderKind::Unsynced)
        );
        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Message);

        sync_now(&h.clock);
        assert_eq!(
            h.ctx.refresh_tick(),
            TickOutcome::Rebuilt(RenderKind::Digital)
        );
    }

    #[test]
    fn test_repeated_transitions_do_not_grow_tree() {
        let h = harness(synced_clock(), SyncCheck::Inline);
        h.ctx.toggle_mode().unwrap();
        let analog = subtree_size(&h.ctx);

        sync_epoch(&h.clock);
        h.ctx.refresh_tick();
        let unsynced = subtree_size(&h.ctx);

        for _ in 0..5 {
            sync_now(&h.clock);
            assert_eq!(
                h.ctx.refresh_tick(),
                TickOutcome::Rebuilt(RenderKind::Analog)
            );
            assert_eq!(subtree_size(&h.ctx), analog);

            sync_epoch(&h.clock);
            assert_eq!(
                h.ctx.refresh_tick(),
                TickOutcome::Rebuilt(RenderKind::Unsynced)
            );
            assert_eq!(subtree_size(&h.ctx), unsynced);
        }
    }

    #[test]
    fn test_tick_follows_time_and_format() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        h.clock.advance(chrono::Duration::seconds(1));
        h.ctx.refresh_tick();
        assert_eq!(time_text(&h.ctx).as_deref(), Some("14:05:10"));

        h.format.set(false);
        h.ctx.refresh_tick();
        assert_eq!(time_text(&h.ctx).as_deref(), Some("02:05:10 PM"));
    }

    #[test]
    fn test_toggle_round_trip() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        assert_eq!(h.ctx.toggle_mode().unwrap(), ClockMode::Analog);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Analog));
        assert_eq!(h.prefs.get_bool(KEY_IS_ANALOG).unwrap(), Some(true));

        assert_eq!(h.ctx.toggle_mode().unwrap(), ClockMode::Digital);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Digital));
        assert_eq!(h.prefs.get_bool(KEY_IS_ANALOG).unwrap(), Some(false));
        assert_eq!(
            h.ctx.with_view(|v| v.mode).unwrap(),
            ClockMode::Digital
        );
    }

    #[test]
    fn test_toggle_while_unsynced_keeps_prompt() {
        let h = harness(ManualClock::unsynced(), SyncCheck::Polled);
        assert_eq!(h.ctx.toggle_mode().unwrap(), ClockMode::Analog);
        assert_eq!(kind(&h.ctx), Some(RenderKind::Unsynced));
    }

    #[test]
    fn test_click_routing() {
        let h = harness(ManualClock::unsynced(), SyncCheck::Inline);
        let (mode_button, connect) = h
            .ctx
            .with_view(|v| (v.mode_button, v.render.and_then(RenderState::connect_button)))
            .unwrap();
        let connect = connect.unwrap();

        // Hidden while unsynced
        assert_eq!(h.ctx.click(mode_button).unwrap(), ClickOutcome::Ignored);
        assert_eq!(
            h.ctx.click(connect).unwrap(),
            ClickOutcome::NetworkConfigLaunched
        );
        assert_eq!(h.launcher.0.load(Ordering::SeqCst), 1);

        sync_now(&h.clock);
        h.ctx.refresh_tick();
        // The prompt is gone, its button handle with it
        assert_eq!(h.ctx.click(connect).unwrap(), ClickOutcome::Ignored);
        assert_eq!(
            h.ctx.click(mode_button).unwrap(),
            ClickOutcome::ModeToggled(ClockMode::Analog)
        );
        assert_eq!(h.launcher.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lock_timeout_skips_tick_without_mutation() {
        let h = harness(synced_clock(), SyncCheck::Inline);
        let before = time_text(&h.ctx);
        h.clock.advance(chrono::Duration::seconds(30));

        let guard = h.ctx.ui.try_lock_for(Duration::from_millis(10)).unwrap();
        let outcome = thread::scope(|s| s.spawn(|| h.ctx.refresh_tick()).join().unwrap());
        assert_eq!(outcome, TickOutcome::Skipped);
        drop(guard);

        assert_eq!(time_text(&h.ctx), before);
        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Refreshed);
        assert_eq!(time_text(&h.ctx).as_deref(), Some("14:05:39"));
    }

    #[test]
    fn test_skipped_tick_keeps_pending_sample() {
        let h = harness(ManualClock::unsynced(), SyncCheck::Polled);
        sync_now(&h.clock);
        h.ctx.post_sync(true);

        let guard = h.ctx.ui.try_lock_for(Duration::from_millis(10)).unwrap();
        let outcome = thread::scope(|s| s.spawn(|| h.ctx.refresh_tick()).join().unwrap());
        assert_eq!(outcome, TickOutcome::Skipped);
        drop(guard);

        assert_eq!(
            h.ctx.refresh_tick(),
            TickOutcome::Rebuilt(RenderKind::Digital)
        );
    }

    #[test]
    fn test_same_timestamp_ticks_are_idempotent() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        h.ctx.toggle_mode().unwrap();
        let snapshot = |ctx: &ClockContext| {
            ctx.with_view(|v| match v.render {
                Some(RenderState::Analog(view)) => (
                    view.clone(),
                    v.tree.points(view.hour_hand),
                    v.tree.points(view.minute_hand),
                    v.tree.points(view.second_hand),
                ),
                other => panic!("expected analog, got {:?}", other.map(RenderState::kind)),
            })
            .unwrap()
        };

        h.ctx.refresh_tick();
        let first = snapshot(&h.ctx);
        h.ctx.refresh_tick();
        assert_eq!(snapshot(&h.ctx), first);
    }

    #[test]
    fn test_resize_applies_on_next_rebuild() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        h.ctx.toggle_mode().unwrap();
        h.ctx.resize(480, 400).unwrap();
        // Ticks keep the old layout
        h.ctx.refresh_tick();
        let face = |ctx: &ClockContext| {
            ctx.with_view(|v| match v.render {
                Some(RenderState::Analog(view)) => view.face_size,
                _ => 0,
            })
            .unwrap()
        };
        assert_eq!(face(&h.ctx), 200);

        h.ctx.rebuild().unwrap();
        assert_eq!(face(&h.ctx), 300);
    }

    #[test]
    fn test_resize_relays_toolbar() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        h.ctx.take_redraw().unwrap();
        h.ctx.resize(480, 400).unwrap();

        let (button_origin, toolbar_width) = h
            .ctx
            .with_view(|v| {
                let toolbar = v.tree.parent(v.mode_button).unwrap();
                (
                    v.tree.absolute_origin(v.mode_button),
                    v.tree.size(toolbar).map(|s| s.width),
                )
            })
            .unwrap();
        assert_eq!(button_origin, Some(Point::new(480 - 72 - 8, 4)));
        assert_eq!(toolbar_width, Some(480));
        assert!(h.ctx.take_redraw().unwrap());
    }

    #[test]
    fn test_nested_calls_inside_view_do_not_panic() {
        let h = harness(synced_clock(), SyncCheck::Inline);
        h.clock.advance(chrono::Duration::seconds(1));
        let before = time_text(&h.ctx);

        let (tick, toggle, nested_kind) = h
            .ctx
            .with_view(|_| {
                (
                    h.ctx.refresh_tick(),
                    h.ctx.toggle_mode(),
                    h.ctx.with_view(|v| v.kind()),
                )
            })
            .unwrap();
        assert_eq!(tick, TickOutcome::Skipped);
        assert!(matches!(toggle, Err(UiError::Reentered)));
        // Reading inside a read is fine
        assert_eq!(nested_kind.unwrap(), Some(RenderKind::Digital));

        // Nothing was half-applied
        assert_eq!(time_text(&h.ctx), before);
        assert_eq!(h.ctx.with_view(|v| v.mode).unwrap(), ClockMode::Digital);
        assert_eq!(h.prefs.get_bool(KEY_IS_ANALOG).unwrap(), None);

        assert_eq!(h.ctx.refresh_tick(), TickOutcome::Refreshed);
        assert_eq!(time_text(&h.ctx).as_deref(), Some("14:05:10"));
    }

    #[test]
    fn test_rebuild_reports_lock_timeout() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        let guard = h.ctx.ui.try_lock_for(Duration::from_millis(10)).unwrap();
        let result = thread::scope(|s| s.spawn(|| h.ctx.rebuild()).join().unwrap());
        assert!(matches!(result, Err(UiError::Lock(_))));
        drop(guard);

        assert_eq!(h.ctx.rebuild().unwrap(), RenderKind::Digital);
    }

    #[test]
    fn test_take_redraw() {
        let h = harness(synced_clock(), SyncCheck::Polled);
        assert!(h.ctx.take_redraw().unwrap());
        assert!(!h.ctx.take_redraw().unwrap());
        h.clock.advance(chrono::Duration::seconds(1));
        h.ctx.refresh_tick();
        assert!(h.ctx.take_redraw().unwrap());
    }

    #[test]
    fn test_pending_sync_slot() {
        let pending = PendingSync::default();
        assert_eq!(pending.take(), None);
        pending.post(false);
        pending.post(true);
        assert_eq!(pending.take(), Some(true));
        assert_eq!(pending.take(), None);
    }
}
