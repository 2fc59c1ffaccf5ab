use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Result;
use crate::schedule::compute_next_run;
use crate::types::DailySchedule;

/// Longest single sleep; the wall clock is re-read after each one so a
/// suspended host or a clock step cannot delay the fire by more than this.
const MAX_SLEEP: Duration = Duration::from_secs(300);

/// Fires a job once per local day.
pub struct DailyTrigger {
    schedule: DailySchedule,
    tz: Tz,
}

impl DailyTrigger {
    /// Validate the schedule. Fails on an unknown zone or an invalid time.
    pub fn new(schedule: DailySchedule) -> Result<Self> {
        let tz = schedule.zone()?;
        Ok(Self { schedule, tz })
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        compute_next_run(&self.schedule, self.tz, now)
    }

    /// Main loop. Runs `job` at every fire time until `shutdown` broadcasts
    /// `true` or its sender is dropped. A job run is awaited to completion
    /// before the next fire time is computed.
    pub async fn run<F, Fut>(self, mut job: F, mut shutdown: watch::Receiver<bool>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(
            hour = self.schedule.hour,
            minute = self.schedule.minute,
            timezone = %self.schedule.timezone,
            "daily trigger started"
        );

        loop {
            let Some(next) = self.next_fire(Utc::now()) else {
                error!("no next fire time could be computed; daily trigger stopped");
                return;
            };
            info!(next_run = %next, "next scheduled rollup");

            loop {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                if wait.is_zero() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(wait.min(MAX_SLEEP)) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("daily trigger shutting down");
                            return;
                        }
                    }
                }
            }

            info!(scheduled_for = %next, "firing scheduled rollup");
            job().await;
        }
    }
}
