//! # Clock Face Application Entry Point
//!
//! This binary wires configuration, logging, preference storage and the tokio runtime
//! around the clock library, showing the clock on a headless surface.
//! It supports a quiet headless mode (logs only) and development mode (ASCII frames on stdout).

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use chrono::Local;
use clock_face::app::default_deps;
use clock_face::config::{Config, CONFIG_FILE};
use clock_face::prefs::FilePreferences;
use clock_face::renderer::{describe_tree, draw_tree, FrameBuffer};
use clock_face::scheduler::ClockApp;
use clock_face::sync::{ManualClock, SystemClock, TimeSource};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Character cell used for the terminal preview, in pixels.
const ASCII_CELL: (u32, u32) = (4, 8);

/// Command line options.
#[derive(Debug, Default)]
struct Args {
    stdout: bool,
    config: Option<PathBuf>,
    seconds: Option<u64>,
    simulate_sync: Option<u64>,
    init_config: bool,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--stdout" => parsed.stdout = true,
                "--init-config" => parsed.init_config = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--seconds" => parsed.seconds = Some(number(&arg, args.next())?),
                "--simulate-sync" => parsed.simulate_sync = Some(number(&arg, args.next())?),
                other => anyhow::bail!("Unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }
}

fn number(flag: &str, value: Option<String>) -> anyhow::Result<u64> {
    let value = value.with_context(|| format!("{flag} needs a number"))?;
    value
        .parse()
        .with_context(|| format!("{flag}: '{value}' is not a whole number of seconds"))
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse(env::args().skip(1))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if args.init_config {
        Config::default()
            .save_to_path(&config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        return Ok(());
    }

    let config = Config::load_from_path(&config_path);
    let prefs = Arc::new(FilePreferences::new(&config.preferences.path));

    // Create Tokio runtime for the timer tasks
    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;

    let time: Arc<dyn TimeSource> = match args.simulate_sync {
        Some(delay) => {
            let clock = Arc::new(ManualClock::unsynced());
            rt.spawn(simulate_sync(Arc::clone(&clock), Duration::from_secs(delay)));
            clock
        }
        None => Arc::new(SystemClock),
    };

    let deps = default_deps(time, prefs, config.display.use_24_hour);
    let app = ClockApp::show(rt.handle(), deps, &config).context("building the clock face")?;

    rt.block_on(run(&app, &config, &args))?;

    app.hide();
    info!("Clock closed");
    Ok(())
}

/// Keep the clock on screen until Ctrl-C or the optional time limit.
async fn run(app: &ClockApp, config: &Config, args: &Args) -> anyhow::Result<()> {
    let deadline = args.seconds.map(Duration::from_secs);
    let started = tokio::time::Instant::now();
    let mut frame = FrameBuffer::new(
        config.display.width,
        config.display.height + clock_face::app::TOOLBAR_HEIGHT,
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("listening for Ctrl-C")?;
                info!("Interrupted");
                return Ok(());
            }
        }

        match app.context().take_redraw() {
            Ok(true) => present(app, &mut frame, args.stdout),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Display busy, skipping frame"),
        }

        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            return Ok(());
        }
    }
}

fn present(app: &ClockApp, frame: &mut FrameBuffer, to_stdout: bool) {
    let drawn = app.context().with_view(|view| {
        let root = view.tree.root();
        if to_stdout {
            frame.clear();
            let _ = draw_tree(view.tree, root, frame);
            println!("{}", frame.to_ascii(ASCII_CELL.0, ASCII_CELL.1));
        } else {
            debug!(outline = %describe_tree(view.tree, root), "Frame");
        }
    });
    if let Err(e) = drawn {
        warn!(error = %e, "Display busy, skipping frame");
    }
}

/// Hold the clock at 1970 for `delay`, then follow the real local time.
async fn simulate_sync(clock: Arc<ManualClock>, delay: Duration) {
    info!(delay_s = delay.as_secs(), "Simulating unsynchronized clock");
    tokio::time::sleep(delay).await;
    info!("Simulated time sync");
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        ticker.tick().await;
        clock.set(Local::now().naive_local());
    }
}
