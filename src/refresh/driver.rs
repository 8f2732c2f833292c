//! Periodic auto-refresh loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::selection::{claim_auto_refresh_batch, SelectionPolicy};
use crate::config::AutoRefreshConfig;
use crate::error::SchedulerError;
use crate::scheduler::RefreshScheduler;
use crate::types::{now, AutoRefreshStatus, TriggerType};

/// Lower bound on the loop interval, in seconds.
pub const MIN_LOOP_SECONDS: u64 = 30;

/// Result of one driver iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoRefreshRun {
    pub recovered: Vec<String>,
    /// Actors that got a new job.
    pub queued: Vec<String>,
    /// Actors whose submit returned an already active job.
    pub reused: Vec<String>,
}

/// Submits tracked actors through the same entry point interactive callers use.
pub struct AutoRefreshDriver {
    scheduler: Arc<RefreshScheduler>,
    config: AutoRefreshConfig,
}

impl AutoRefreshDriver {
    pub fn new(scheduler: Arc<RefreshScheduler>, config: AutoRefreshConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            min_interval_hours: self.config.min_interval_hours,
            batch_size: self.config.batch_size,
        }
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.config.loop_seconds.max(MIN_LOOP_SECONDS))
    }

    pub fn run_once(&self) -> Result<AutoRefreshRun, SchedulerError> {
        self.run_once_at(now())
    }

    /// Recovery pass, then claim one batch and submit it.
    pub fn run_once_at(&self, at: DateTime<Utc>) -> Result<AutoRefreshRun, SchedulerError> {
        let recovered = self.scheduler.recover_stale_runs(at)?;
        let actors = self.scheduler.actors();
        let claimed = claim_auto_refresh_batch(actors.as_ref(), self.policy(), at)?;

        let mut queued = Vec::with_capacity(claimed.len());
        let mut reused = Vec::new();
        for actor_id in claimed {
            match self.scheduler.submit(&actor_id, TriggerType::AutoRefresh) {
                Ok(response) => {
                    debug!(
                        actor_id = %actor_id,
                        job_id = %response.job_id,
                        queued = response.queued,
                        "Auto-refresh submitted"
                    );
                    if response.queued {
                        queued.push(actor_id);
                    } else {
                        reused.push(actor_id);
                    }
                }
                Err(err) => {
                    warn!(actor_id = %actor_id, error = %err, "Auto-refresh submit failed");
                    if let Err(err) =
                        actors.set_auto_refresh_state(&actor_id, None, AutoRefreshStatus::Error)
                    {
                        warn!(actor_id = %actor_id, error = %err, "Failed to record auto-refresh error");
                    }
                }
            }
        }

        info!(
            recovered = recovered.len(),
            queued = queued.len(),
            reused = reused.len(),
            "auto_refresh_run"
        );
        Ok(AutoRefreshRun {
            recovered,
            queued,
            reused,
        })
    }

    /// Iterate until shutdown. Iteration errors are logged and the loop keeps
    /// going; shutdown is observed between iterations only.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.loop_interval();
        info!(interval_secs = interval.as_secs(), "Auto-refresh driver started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(err) = self.run_once() {
                error!(error = %err, "auto_refresh_failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Auto-refresh driver stopped");
    }
}
