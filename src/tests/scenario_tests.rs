use chrono::{NaiveDate, NaiveDateTime};
use clock_face::app::{ClickOutcome, ClockContext, ClockDeps, SharedTimeFormat, TickOutcome};
use clock_face::config::{Config, SyncCheck};
use clock_face::prefs::{FilePreferences, PreferenceStore, KEY_IS_ANALOG};
use clock_face::render::{RenderState, BUTTON_CONNECT, MESSAGE_NOT_SYNCED};
use clock_face::renderer::{describe_tree, draw_tree, FrameBuffer};
use clock_face::sync::{is_synchronized, unix_epoch, ManualClock};
use clock_face::{ClockMode, RenderKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct Launcher(AtomicUsize);

impl clock_face::app::NetworkLauncher for Launcher {
    fn launch_network_config(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Device {
    _dir: TempDir,
    prefs_path: std::path::PathBuf,
    clock: Arc<ManualClock>,
    format: Arc<SharedTimeFormat>,
    launcher: Arc<Launcher>,
}

impl Device {
    fn new(clock: ManualClock) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            prefs_path: dir.path().join("prefs.toml"),
            _dir: dir,
            clock: Arc::new(clock),
            format: Arc::new(SharedTimeFormat::new(true)),
            launcher: Arc::new(Launcher::default()),
        }
    }

    /// Open the clock app the way a host would, with on-disk preferences.
    fn show(&self, sync_check: SyncCheck) -> ClockContext {
        let deps = ClockDeps {
            time: self.clock.clone(),
            time_format: self.format.clone(),
            prefs: Arc::new(FilePreferences::new(&self.prefs_path)),
            launcher: self.launcher.clone(),
        };
        let mut config = Config::default();
        config.schedule.sync_check = sync_check;
        ClockContext::show(deps, &config).unwrap()
    }
}

fn afternoon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(14, 5, 9))
        .unwrap()
}

fn digital_time(ctx: &ClockContext) -> Option<String> {
    ctx.with_view(|v| match v.render {
        Some(RenderState::Digital(view)) => v.tree.text(view.time_label).map(str::to_string),
        _ => None,
    })
    .unwrap()
}

#[test]
fn sync_detector_year_boundary() {
    let epoch = NaiveDate::from_ymd_opt(1970, 6, 1).unwrap();
    let modern = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert!(!is_synchronized(&epoch));
    assert!(is_synchronized(&modern));
}

#[test]
fn boot_without_network_then_sync_arrives() {
    let device = Device::new(ManualClock::unsynced());
    let ctx = device.show(SyncCheck::Polled);
    assert_eq!(ctx.with_view(|v| v.kind()).unwrap(), Some(RenderKind::Unsynced));

    // Unsynced ticks only rewrite the prompt
    assert_eq!(ctx.refresh_tick(), TickOutcome::Message);
    let status = ctx
        .with_view(|v| match v.render {
            Some(RenderState::Unsynced(view)) => v.tree.text(view.status_label).map(str::to_string),
            _ => None,
        })
        .unwrap();
    assert_eq!(status.as_deref(), Some(MESSAGE_NOT_SYNCED));

    device.clock.set(afternoon());
    ctx.post_sync(ctx.sample_sync());
    assert_eq!(ctx.refresh_tick(), TickOutcome::Rebuilt(RenderKind::Digital));
    assert_eq!(digital_time(&ctx).as_deref(), Some("14:05:09"));

    let mode_visible = ctx.with_view(|v| !v.tree.is_hidden(v.mode_button)).unwrap();
    assert!(mode_visible);
}

#[test]
fn time_format_setting_applies_on_next_tick() {
    let device = Device::new(ManualClock::new(afternoon()));
    let ctx = device.show(SyncCheck::Inline);
    assert_eq!(digital_time(&ctx).as_deref(), Some("14:05:09"));

    device.format.set(false);
    assert_eq!(ctx.refresh_tick(), TickOutcome::Refreshed);
    assert_eq!(digital_time(&ctx).as_deref(), Some("02:05:09 PM"));
}

#[test]
fn mode_survives_reopening_the_app() {
    let device = Device::new(ManualClock::new(afternoon()));

    let first = device.show(SyncCheck::Polled);
    let button = first.with_view(|v| v.mode_button).unwrap();
    assert_eq!(
        first.click(button).unwrap(),
        ClickOutcome::ModeToggled(ClockMode::Analog)
    );
    assert_eq!(first.with_view(|v| v.kind()).unwrap(), Some(RenderKind::Analog));
    drop(first);

    let stored = FilePreferences::new(&device.prefs_path)
        .get_bool(KEY_IS_ANALOG)
        .unwrap();
    assert_eq!(stored, Some(true));

    let second = device.show(SyncCheck::Polled);
    assert_eq!(second.with_view(|v| v.mode).unwrap(), ClockMode::Analog);
    assert_eq!(second.with_view(|v| v.kind()).unwrap(), Some(RenderKind::Analog));
}

#[test]
fn corrupt_preferences_fall_back_to_digital() {
    let device = Device::new(ManualClock::new(afternoon()));
    std::fs::write(&device.prefs_path, "not = [valid").unwrap();

    let ctx = device.show(SyncCheck::Polled);
    assert_eq!(ctx.with_view(|v| v.mode).unwrap(), ClockMode::Digital);
    assert_eq!(ctx.with_view(|v| v.kind()).unwrap(), Some(RenderKind::Digital));
}

#[test]
fn connect_button_launches_network_settings() {
    let device = Device::new(ManualClock::unsynced());
    let ctx = device.show(SyncCheck::Polled);

    let (connect, mode_button) = ctx
        .with_view(|v| {
            let connect = v.render.and_then(|r| r.connect_button());
            (connect, v.mode_button)
        })
        .unwrap();

    // Hidden while unsynced
    assert_eq!(ctx.click(mode_button).unwrap(), ClickOutcome::Ignored);
    assert_eq!(
        ctx.click(connect.unwrap()).unwrap(),
        ClickOutcome::NetworkConfigLaunched
    );
    assert_eq!(device.launcher.0.load(Ordering::SeqCst), 1);
}

#[test]
fn frames_follow_the_render_state() {
    let device = Device::new(ManualClock::unsynced());
    let ctx = device.show(SyncCheck::Inline);

    let outline = ctx
        .with_view(|v| describe_tree(v.tree, v.tree.root()))
        .unwrap();
    assert!(outline.contains(&format!("label {BUTTON_CONNECT:?}")));
    assert!(outline.contains("button [hidden]"));

    device.clock.set(afternoon());
    assert_eq!(ctx.refresh_tick(), TickOutcome::Rebuilt(RenderKind::Digital));
    assert!(ctx.take_redraw().unwrap());

    let lit = ctx
        .with_view(|v| {
            let size = v.tree.size(v.tree.root()).unwrap();
            let mut frame = FrameBuffer::new(size.width, size.height);
            draw_tree(v.tree, v.tree.root(), &mut frame).unwrap();
            frame.lit_pixels()
        })
        .unwrap();
    assert!(lit > 0);

    let outline = ctx
        .with_view(|v| describe_tree(v.tree, v.tree.root()))
        .unwrap();
    assert!(!outline.contains(BUTTON_CONNECT));
    assert!(outline.contains("label \"14:05:09\""));
}

#[test]
fn repeated_sync_flaps_do_not_leak_widgets() {
    let device = Device::new(ManualClock::new(afternoon()));
    let ctx = device.show(SyncCheck::Inline);
    let baseline = ctx.with_view(|v| v.tree.len()).unwrap();

    for _ in 0..10 {
        device.clock.set(unix_epoch());
        ctx.refresh_tick();
        device.clock.set(afternoon());
        ctx.refresh_tick();
    }
    assert_eq!(ctx.with_view(|v| v.tree.len()).unwrap(), baseline);
}
