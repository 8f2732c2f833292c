//! Stale-run recovery.
//!
//! The execution guard lives in memory and is empty after every restart, so an
//! actor persisted as `running` may have no live run behind it. One recovery
//! pass flips such actors to `error` once their status is older than the
//! cutoff, and expires their dangling journal jobs.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::concurrency::ActorExecutionGuard;
use crate::error::StorageError;
use crate::journal::JobJournal;
use crate::queue::{BuildQueue, EnrichmentQueue};
use crate::store::ActorStore;

/// Lower bound on the recovery cutoff, in minutes.
pub const MIN_STALE_RECOVERY_MINUTES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub stale_recovery_minutes: u64,
    pub generation_job_stale_minutes: u64,
}

impl RecoveryPolicy {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = self.stale_recovery_minutes.max(MIN_STALE_RECOVERY_MINUTES);
        now - Duration::minutes(minutes as i64)
    }
}

/// Everything a recovery pass reconciles.
pub struct StaleRunRecovery<'a> {
    pub actors: &'a dyn ActorStore,
    pub journal: &'a JobJournal,
    pub guards: &'a ActorExecutionGuard,
    pub build_queue: &'a BuildQueue,
    pub enrichment_queue: &'a EnrichmentQueue,
}

impl StaleRunRecovery<'_> {
    /// Run one pass; returns the recovered actor ids.
    ///
    /// An actor is live, and left alone, while it holds either guard or has
    /// work waiting in either queue.
    pub fn run(
        &self,
        policy: RecoveryPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StorageError> {
        let cutoff = policy.cutoff(now);
        let mut live = self.guards.generation.snapshot();
        live.extend(self.guards.enrichment.snapshot());
        live.extend(self.build_queue.enqueued_actors());
        live.extend(self.enrichment_queue.enqueued_actors());

        let mut recovered = Vec::new();
        for actor in self.actors.list_running()? {
            if live.contains(&actor.id) {
                continue;
            }
            if matches!(actor.notebook_updated_at, Some(updated) if updated > cutoff) {
                continue;
            }

            self.actors.mark_recovered(&actor.id, now)?;
            // Expire on the recovery cutoff, not the submit-time job cutoff.
            let expired = match self.journal.expire_stale_generation_jobs_for_actor(
                &actor.id,
                policy.stale_recovery_minutes,
                now,
            ) {
                Ok(count) => count,
                Err(err) => {
                    warn!(actor_id = %actor.id, error = %err, "Failed to expire jobs of recovered actor");
                    0
                }
            };
            info!(
                actor_id = %actor.id,
                last_update = ?actor.notebook_updated_at,
                expired_jobs = expired,
                "stale_run_recovered"
            );
            recovered.push(actor.id);
        }
        Ok(recovered)
    }
}
