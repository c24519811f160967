//! Timer-driven refresh loop
//!
//! Owns the periodic timer and the currently published snapshot.
//!
//! State machine:
//! - `Stopped -> Running` on `start`
//! - `Running <-> Paused` on `pause` / `resume`
//! - any state `-> Stopped` on `stop` or drop
//!
//! Redundant commands (`pause` while paused, `resume` while running,
//! `start` while started) are no-ops. Everything runs on one task, so the
//! sampler is called synchronously and snapshots are published in index
//! order through a `watch` channel that keeps only the latest value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::ProbeMode;
use crate::error::{Error, Result};
use crate::sampler::Sampler;
use crate::types::Snapshot;

/// Published value: `None` until the first capture
pub type Published = Option<Arc<Snapshot>>;

// ─────────────────────────────────────────────────────────────────
// Loop State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of a refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Stopped => "stopped",
            LoopState::Running => "running",
            LoopState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Identity of the loop's timer, kept across pause/resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    id: u64,
    period: Duration,
    active: bool,
}

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer is currently firing
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Commands accepted by `RefreshLoop::run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    TogglePause,
    Pause,
    Resume,
    RefreshNow,
    Shutdown,
}

// ─────────────────────────────────────────────────────────────────
// Refresh Loop
// ─────────────────────────────────────────────────────────────────

/// Periodic sampler driver with pause/resume and refresh-now
pub struct RefreshLoop {
    sampler: Sampler,
    period: Duration,
    state: LoopState,
    interval: Option<Interval>,
    timer: Option<TimerHandle>,
    timers_created: u64,
    last_index: u64,
    published: watch::Sender<Published>,
}

impl RefreshLoop {
    /// Create a stopped loop
    pub fn new(sampler: Sampler, period: Duration) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            sampler,
            period,
            state: LoopState::Stopped,
            interval: None,
            timer: None,
            timers_created: 0,
            last_index: 0,
            published,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// The timer handle, present while running or paused
    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    /// Index of the most recent capture, 0 before the first
    pub fn current_index(&self) -> u64 {
        self.last_index
    }

    /// The currently published snapshot
    pub fn current(&self) -> Published {
        self.published.borrow().clone()
    }

    /// Receive every publication; only the latest value is retained
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.published.subscribe()
    }

    /// Begin firing every period; the first fire is one period from now
    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Stopped {
            debug!(state = %self.state, "Refresh loop already started");
            return Ok(());
        }

        if self.sampler.probe_mode() == ProbeMode::Eager {
            self.sampler.prime();
        }

        self.timers_created += 1;
        self.interval = Some(new_interval(self.period));
        self.timer = Some(TimerHandle {
            id: self.timers_created,
            period: self.period,
            active: true,
        });
        self.state = LoopState::Running;

        info!(
            timer_id = self.timers_created,
            period_ms = self.period.as_millis() as u64,
            "Refresh loop started"
        );
        Ok(())
    }

    /// Stop firing, keeping the timer handle
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            LoopState::Stopped => Err(Error::InvalidTransition {
                command: "pause",
                state: self.state,
            }),
            LoopState::Paused => {
                debug!("Refresh loop already paused");
                Ok(())
            }
            LoopState::Running => {
                self.state = LoopState::Paused;
                self.set_timer_active(false);
                info!(index = self.last_index, "Refresh loop paused");
                Ok(())
            }
        }
    }

    /// Restart firing; the next fire is one full period from now
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            LoopState::Stopped => Err(Error::InvalidTransition {
                command: "resume",
                state: self.state,
            }),
            LoopState::Running => {
                debug!("Refresh loop already running");
                Ok(())
            }
            LoopState::Paused => {
                if let Some(interval) = self.interval.as_mut() {
                    interval.reset();
                }
                self.state = LoopState::Running;
                self.set_timer_active(true);
                info!(index = self.last_index, "Refresh loop resumed");
                Ok(())
            }
        }
    }

    /// Pause if running, resume if paused
    pub fn toggle_pause(&mut self) -> Result<()> {
        match self.state {
            LoopState::Running => self.pause(),
            _ => self.resume(),
        }
    }

    /// Capture and publish immediately; the timer schedule is untouched
    pub fn refresh_now(&mut self) -> Arc<Snapshot> {
        self.publish()
    }

    /// Release the timer and return to `Stopped`
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.interval = None;
        self.timer = None;
        self.state = LoopState::Stopped;
        info!(index = self.last_index, "Refresh loop stopped");
    }

    /// Wait for the next timer fire, then capture and publish
    ///
    /// Never resolves while paused or stopped. Cancel-safe.
    pub async fn next_trigger(&mut self) -> Arc<Snapshot> {
        match (self.state, self.interval.as_mut()) {
            (LoopState::Running, Some(interval)) => {
                interval.tick().await;
            }
            _ => std::future::pending::<()>().await,
        }
        self.publish()
    }

    /// Apply one command; `Shutdown` stops the loop
    pub fn apply(&mut self, command: LoopCommand) -> Result<()> {
        trace!(?command, state = %self.state, "Applying loop command");
        match command {
            LoopCommand::TogglePause => self.toggle_pause(),
            LoopCommand::Pause => self.pause(),
            LoopCommand::Resume => self.resume(),
            LoopCommand::RefreshNow => {
                self.refresh_now();
                Ok(())
            }
            LoopCommand::Shutdown => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Drive the loop from a command channel until shutdown
    ///
    /// Starts the loop if needed. Rejected commands are logged and the loop
    /// keeps running.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<LoopCommand>) -> Result<()> {
        self.start()?;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(LoopCommand::Shutdown) | None => break,
                    Some(command) => {
                        if let Err(e) = self.apply(command) {
                            warn!(error = %e.format_for_log(), "Loop command rejected");
                        }
                    }
                },
                _ = self.next_trigger() => {}
            }
        }

        self.stop();
        Ok(())
    }

    fn publish(&mut self) -> Arc<Snapshot> {
        let snapshot = Arc::new(self.sampler.capture(self.last_index));
        self.last_index = snapshot.sequence_index;
        self.published.send_replace(Some(snapshot.clone()));
        snapshot
    }

    fn set_timer_active(&mut self, active: bool) {
        if let Some(timer) = self.timer.as_mut() {
            timer.active = active;
        }
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn new_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
