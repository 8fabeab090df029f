//! # Update Scheduler
//!
//! Two periodic triggers drive a shown clock:
//! - **Refresh poll** (1 s): runs [`ClockContext::refresh_tick`] on the blocking pool, since a
//!   tick may wait on the UI lock for its (short) budget
//! - **Sync poll** (1-5 s, polled mode only): samples the time source and posts the result for
//!   the next refresh tick. It never touches the widget tree.
//!
//! Missed intervals are skipped rather than bunched up: a late tick is simply the next tick.

use crate::app::{ClockContext, ClockDeps};
use crate::config::{Config, ScheduleConfig, SyncCheck};
use crate::widgets::WidgetError;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Running timer tasks of one shown clock. Dropping it stops them.
#[derive(Debug)]
pub struct Scheduler {
    refresh: JoinHandle<()>,
    sync_poll: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the timer tasks on `runtime`.
    pub fn start(runtime: &Handle, ctx: Arc<ClockContext>, schedule: &ScheduleConfig) -> Self {
        let sync_poll = match schedule.sync_check {
            SyncCheck::Polled => Some(runtime.spawn(sync_poll_loop(
                Arc::clone(&ctx),
                schedule.sync_poll_interval(),
            ))),
            SyncCheck::Inline => None,
        };
        let refresh = runtime.spawn(refresh_loop(ctx, schedule.refresh_interval()));

        info!(
            refresh_ms = schedule.refresh_interval_ms,
            sync_check = ?schedule.sync_check,
            "Timer started"
        );
        Self { refresh, sync_poll }
    }

    /// Stop both timers. Ticks already running finish on their own.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.refresh.abort();
        if let Some(sync_poll) = &self.sync_poll {
            sync_poll.abort();
        }
        info!("Timer stopped");
    }
}

async fn refresh_loop(ctx: Arc<ClockContext>, period: Duration) {
    // The clock was just built; the first tick is one period away
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let ctx = Arc::clone(&ctx);
        match task::spawn_blocking(move || ctx.refresh_tick()).await {
            Ok(outcome) => trace!(?outcome, "Refresh tick"),
            Err(e) => warn!(error = %e, "Refresh tick did not complete"),
        }
    }
}

async fn sync_poll_loop(ctx: Arc<ClockContext>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let synced = ctx.sample_sync();
        debug!(synced, "Sync poll");
        ctx.post_sync(synced);
    }
}

/// A clock between show and hide: the owned context plus its timers.
pub struct ClockApp {
    ctx: Arc<ClockContext>,
    scheduler: Scheduler,
}

impl ClockApp {
    /// Build the clock and start its timers on `runtime`.
    pub fn show(runtime: &Handle, deps: ClockDeps, config: &Config) -> Result<Self, WidgetError> {
        let ctx = Arc::new(ClockContext::show(deps, config)?);
        let scheduler = Scheduler::start(runtime, Arc::clone(&ctx), &config.schedule);
        Ok(Self { ctx, scheduler })
    }

    pub fn context(&self) -> &Arc<ClockContext> {
        &self.ctx
    }

    /// Stop the timers before the context goes away.
    pub fn hide(self) {
        let Self { ctx, scheduler } = self;
        scheduler.stop();
        drop(ctx);
    }
}
