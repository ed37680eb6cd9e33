//! Periodic driver for the monitor
//!
//! The driver owns a repeating tokio timer that posts [`TimerFired`]
//! messages into a channel consumed by the server loop; the loop calls
//! [`TickDriver::on_timer_fired`] on the same task that owns the host, so
//! detector state is never shared across threads.
//!
//! Only one timer exists at a time. Restarting cancels the previous task
//! before spawning the next, and every firing carries the generation of the
//! timer that produced it so a message already in flight from a cancelled
//! timer is discarded.

use crate::config::MonitorConfig;
use crate::host::Host;
use crate::monitor::{Monitor, TickSummary};
use log::{debug, info};
use shared::MatchEvent;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Message posted by the repeating timer on each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

/// A spawned repeating timer. Dropping it cancels the task.
#[derive(Debug)]
pub struct RepeatingTimer {
    handle: JoinHandle<()>,
    generation: u64,
    period: Duration,
}

impl RepeatingTimer {
    /// Spawns the timer; the first message arrives after one full period.
    pub fn spawn(period: Duration, generation: u64, tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first tick since it fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if tx.send(TimerFired { generation }).is_err() {
                    break;
                }
            }
        });

        Self {
            handle,
            generation,
            period,
        }
    }

    /// Safe to call on a timer that already stopped.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct TickDriver {
    monitor: Monitor,
    timer: Option<RepeatingTimer>,
    next_generation: u64,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TickDriver {
    /// Creates a stopped driver and the receiver its timer firings arrive on.
    pub fn new(monitor: Monitor) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let driver = Self {
            monitor,
            timer: None,
            next_generation: 1,
            fired_tx,
        };
        (driver, fired_rx)
    }

    /// (Re)starts the timer with the configured period. Must run inside a
    /// tokio runtime. Tracking restarts from scratch; queued punishments
    /// and transfers still run on the next step.
    pub fn start(&mut self, config: &MonitorConfig) {
        self.cancel_timer();
        self.monitor.reset_tracking();

        let period = config.tick_period();
        let generation = self.next_generation;
        self.next_generation += 1;

        self.timer = Some(RepeatingTimer::spawn(
            period,
            generation,
            self.fired_tx.clone(),
        ));
        info!(
            "Monitor timer started: every {:.2}s (generation {})",
            period.as_secs_f32(),
            generation
        );
    }

    /// Cancels the timer, if any, and forgets all detector state and
    /// queued tasks.
    pub fn stop(&mut self) {
        self.cancel_timer();
        self.monitor.clear();
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
            debug!("Monitor timer {} stopped", timer.generation());
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.timer.as_ref().map(RepeatingTimer::generation)
    }

    pub fn period(&self) -> Option<Duration> {
        self.timer.as_ref().map(RepeatingTimer::period)
    }

    pub fn ensure_running(&mut self, config: &MonitorConfig) {
        if !self.is_running() {
            self.start(config);
        }
    }

    /// Applies a reloaded config. Returns true when the timer was restarted.
    pub fn on_config_changed(&mut self, previous: &MonitorConfig, current: &MonitorConfig) -> bool {
        if current.timer_changed(previous) {
            info!(
                "Timer period changed from {:.2}s to {:.2}s",
                previous.timer, current.timer
            );
            self.start(current);
            true
        } else {
            false
        }
    }

    /// Forwards a match event; round start re-arms a stopped timer and a map
    /// change stops it.
    pub fn handle_event(&mut self, event: &MatchEvent, config: &MonitorConfig) {
        match event {
            MatchEvent::RoundStarted => self.ensure_running(config),
            MatchEvent::MapChanged => {
                info!("Map changed, stopping monitor timer");
                self.stop();
            }
            _ => {}
        }
        self.monitor.handle_event(event);
    }

    /// Runs a detector pass for a firing of the current timer. Firings from
    /// a cancelled timer return `None`.
    pub fn on_timer_fired<H: Host>(
        &mut self,
        fired: TimerFired,
        host: &mut H,
        config: &MonitorConfig,
        now: Instant,
    ) -> Option<TickSummary> {
        if self.current_generation() != Some(fired.generation) {
            debug!("Ignoring stale timer firing (generation {})", fired.generation);
            return None;
        }
        Some(self.monitor.tick(host, config, now))
    }

    /// One simulation step: runs deferred work.
    pub fn step<H: Host>(&mut self, host: &mut H, config: &MonitorConfig) -> usize {
        self.monitor.run_deferred(host, config)
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut Monitor {
        &mut self.monitor
    }
}
