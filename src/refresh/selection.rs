//! Auto-refresh candidate selection and batch claiming.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::store::{ActorRecord, ActorStore};
use crate::types::{AutoRefreshStatus, NotebookStatus};

/// Selection knobs, clamped on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub min_interval_hours: u64,
    pub batch_size: usize,
}

impl SelectionPolicy {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.min_interval_hours.max(1) as i64)
    }

    pub fn limit(&self) -> usize {
        self.batch_size.max(1)
    }

    fn is_due(&self, actor: &ActorRecord, cutoff: DateTime<Utc>) -> bool {
        actor.is_tracked
            && actor.notebook_status != NotebookStatus::Running
            && actor
                .auto_refresh_last_run_at
                .map_or(true, |last_run| last_run <= cutoff)
    }
}

/// Tracked actors due for a refresh, oldest first, at most one batch.
/// Read-only; backs the dry-run view.
pub fn eligible_actors(
    actors: &dyn ActorStore,
    policy: SelectionPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<ActorRecord>, StorageError> {
    let cutoff = policy.cutoff(now);
    let mut tracked = actors.list_tracked()?;
    tracked.sort_by(|a, b| {
        a.auto_refresh_anchor()
            .cmp(&b.auto_refresh_anchor())
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(tracked
        .into_iter()
        .filter(|actor| policy.is_due(actor, cutoff))
        .take(policy.limit())
        .collect())
}

/// Select a batch and stamp each actor `queued` with `last_run_at = now`
/// before anything is submitted, so the next tick cannot pick them again.
///
/// Each stamp re-checks eligibility inside the record update; an actor that
/// stopped being due between selection and stamping is left out.
pub fn claim_auto_refresh_batch(
    actors: &dyn ActorStore,
    policy: SelectionPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StorageError> {
    let cutoff = policy.cutoff(now);
    let mut claimed = Vec::new();
    for candidate in eligible_actors(actors, policy, now)? {
        let mut won = false;
        actors.update(&candidate.id, &mut |record| {
            if policy.is_due(record, cutoff) {
                record.auto_refresh_last_run_at = Some(now);
                record.auto_refresh_last_status = Some(AutoRefreshStatus::Queued);
                won = true;
            }
        })?;
        if won {
            info!(actor_id = %candidate.id, "auto_refresh_actor_queued");
            claimed.push(candidate.id);
        } else {
            debug!(actor_id = %candidate.id, "Actor no longer due, not claimed");
        }
    }
    Ok(claimed)
}
