//! Fixed-interval cycle driver with a live countdown.
//!
//! Runs a [`MonitorJob`] cycle, then counts down to the next one in
//! `countdown_step` ticks, logging the remaining time at every tick. The
//! shutdown flag is checked before each cycle and at every tick; flipping it
//! also interrupts a tick that is already sleeping.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

/// A monitoring loop body.
#[async_trait]
pub trait MonitorJob: Send {
    /// Used in countdown and lifecycle logs.
    fn name(&self) -> &str;

    /// One fetch → delta → notify pass. Must not fail; errors are handled
    /// per entity inside the cycle.
    async fn run_cycle(&mut self);
}

pub struct Scheduler {
    interval: Duration,
    countdown_step: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(interval: Duration, countdown_step: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            interval,
            countdown_step: countdown_step.max(Duration::from_millis(1)),
            shutdown,
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run cycles until shutdown. Returns the number of cycles completed.
    pub async fn run(mut self, job: &mut dyn MonitorJob) -> u64 {
        let mut cycles = 0u64;
        info!(job = job.name(), interval_secs = self.interval.as_secs(), "Monitor started");

        while !self.is_shutdown() {
            job.run_cycle().await;
            cycles += 1;
            if !self.countdown(job.name()).await {
                break;
            }
        }

        info!(job = job.name(), cycles, "Monitor stopped");
        cycles
    }

    /// Sleep out the interval. `false` if shutdown was requested meanwhile.
    async fn countdown(&mut self, name: &str) -> bool {
        let mut remaining = self.interval;
        while !remaining.is_zero() {
            if self.is_shutdown() {
                return false;
            }
            let secs = remaining.as_secs();
            info!("Next {name} update in: {:02}:{:02}", secs / 60, secs % 60);

            let nap = remaining.min(self.countdown_step);
            let tick_end = Instant::now() + nap;
            tokio::select! {
                _ = tokio::time::sleep_until(tick_end) => {}
                changed = self.shutdown.changed() => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => return false,
                        // no shutdown, or sender gone: finish this tick on time
                        Ok(()) | Err(_) => tokio::time::sleep_until(tick_end).await,
                    }
                }
            }
            remaining = remaining.saturating_sub(nap);
        }
        !self.is_shutdown()
    }
}
