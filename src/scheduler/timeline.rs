//! Refresh timeline: recent runs, average duration and ETA for one actor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::SchedulerStats;
use crate::journal::JobDetail;
use crate::types::{elapsed_ms, JobStatus};

/// Jobs shown in the timeline and averaged for the ETA.
pub const TIMELINE_RUN_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    pub build_pending: usize,
    pub enrichment_pending: usize,
    pub build_running: usize,
    pub enrichment_running: usize,
}

impl From<&SchedulerStats> for QueueDepths {
    fn from(stats: &SchedulerStats) -> Self {
        Self {
            build_pending: stats.build_pending,
            enrichment_pending: stats.enrichment_pending,
            build_running: stats.build_running,
            enrichment_running: stats.enrichment_running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTimeline {
    pub actor_id: String,
    /// Newest first, each with its phases.
    pub recent_runs: Vec<JobDetail>,
    pub eta_seconds: Option<u64>,
    pub avg_duration_ms: Option<u64>,
    pub queue_depths: QueueDepths,
}

impl RefreshTimeline {
    /// Assemble the timeline from the actor's recent jobs, newest first.
    pub fn build(
        actor_id: &str,
        recent_runs: Vec<JobDetail>,
        queue_depths: QueueDepths,
        now: DateTime<Utc>,
    ) -> Self {
        let avg_duration_ms = average_completed_duration(&recent_runs);
        let eta_seconds = avg_duration_ms.and_then(|avg| {
            let active = recent_runs.iter().find(|run| run.job.status.is_active())?;
            let remaining_ms = match active.job.status {
                JobStatus::Running => {
                    avg.saturating_sub(elapsed_ms(active.job.reference_time(), now))
                }
                _ => avg.saturating_mul(queue_depths.build_pending.max(1) as u64),
            };
            Some(remaining_ms.div_ceil(1000))
        });

        Self {
            actor_id: actor_id.to_string(),
            recent_runs,
            eta_seconds,
            avg_duration_ms,
            queue_depths,
        }
    }
}

fn average_completed_duration(runs: &[JobDetail]) -> Option<u64> {
    let durations: Vec<u64> = runs
        .iter()
        .filter(|run| run.job.status == JobStatus::Completed)
        .filter_map(|run| run.job.duration_ms)
        .collect();
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<u64>() / durations.len() as u64)
}
