//! The scheduler entry point shared by interactive callers and the
//! auto-refresh driver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::stats::{OutcomeCounters, SchedulerStats};
use super::timeline::{QueueDepths, RefreshTimeline, TIMELINE_RUN_LIMIT};
use super::worker::{build_worker_loop, enrichment_worker_loop};
use crate::concurrency::ActorExecutionGuard;
use crate::config::RefreshConfig;
use crate::error::{SchedulerError, StorageError};
use crate::journal::{JobDetail, JobJournal, JobOutcome};
use crate::pipeline::{GenerationPipeline, PipelineCollaborators, MSG_ALREADY_RUNNING};
use crate::queue::{BuildQueue, EnrichmentQueue};
use crate::recovery::{RecoveryPolicy, StaleRunRecovery};
use crate::store::{ActorStore, SledActorStore};
use crate::types::{now, JobStatus, NotebookStatus, TriggerType};

pub const MSG_REFRESH_QUEUED: &str = "Refresh queued.";
pub const MSG_JOB_QUEUED: &str = "Refresh job queued.";

/// Answer to [`RefreshScheduler::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub actor_id: String,
    pub job_id: String,
    pub status: JobStatus,
    /// `false` when an existing job was returned or the submission was rejected.
    pub queued: bool,
    pub message: String,
}

/// Dual-queue refresh scheduler.
///
/// `submit` journals a job and pushes it onto the build queue. Two worker
/// tasks, started by [`RefreshScheduler::start`], drain the build and
/// enrichment queues one entry at a time.
pub struct RefreshScheduler {
    journal: Arc<JobJournal>,
    actors: Arc<dyn ActorStore>,
    guards: ActorExecutionGuard,
    build_queue: Arc<BuildQueue>,
    enrichment_queue: Arc<EnrichmentQueue>,
    pipeline: Arc<GenerationPipeline>,
    recovery: RecoveryPolicy,
    counters: Arc<RwLock<OutcomeCounters>>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        journal: Arc<JobJournal>,
        actors: Arc<dyn ActorStore>,
        collaborators: PipelineCollaborators,
        config: &RefreshConfig,
    ) -> Self {
        let guards = ActorExecutionGuard::new();
        let build_queue = Arc::new(BuildQueue::new());
        let enrichment_queue = Arc::new(EnrichmentQueue::new());
        let pipeline = Arc::new(GenerationPipeline::new(
            Arc::clone(&journal),
            Arc::clone(&actors),
            guards.clone(),
            Arc::clone(&enrichment_queue),
            collaborators,
            config.interactive.clone(),
            config.enrichment.clone(),
        ));
        let (shutdown, _) = watch::channel(false);

        Self {
            journal,
            actors,
            guards,
            build_queue,
            enrichment_queue,
            pipeline,
            recovery: RecoveryPolicy {
                stale_recovery_minutes: config.recovery.stale_recovery_minutes,
                generation_job_stale_minutes: config.recovery.generation_job_stale_minutes,
            },
            counters: Arc::new(RwLock::new(OutcomeCounters::default())),
            shutdown,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Build a scheduler whose journal and actor store share one sled database.
    pub fn open(
        db: sled::Db,
        collaborators: PipelineCollaborators,
        config: &RefreshConfig,
    ) -> Result<Self, StorageError> {
        let actors: Arc<dyn ActorStore> = Arc::new(SledActorStore::from_db(db.clone())?);
        let journal = JobJournal::shared(db)?;
        Ok(Self::new(journal, actors, collaborators, config))
    }

    pub fn actors(&self) -> &Arc<dyn ActorStore> {
        &self.actors
    }

    pub fn journal(&self) -> &Arc<JobJournal> {
        &self.journal
    }

    pub fn guards(&self) -> &ActorExecutionGuard {
        &self.guards
    }

    pub fn build_queue(&self) -> &Arc<BuildQueue> {
        &self.build_queue
    }

    pub fn enrichment_queue(&self) -> &Arc<EnrichmentQueue> {
        &self.enrichment_queue
    }

    /// Submit a refresh for the actor.
    ///
    /// Idempotent while a job is active: the existing job is returned with
    /// `queued: false`. Stale active jobs are expired first so one crashed
    /// run cannot block the actor forever.
    pub fn submit(
        &self,
        actor_id: &str,
        trigger: TriggerType,
    ) -> Result<SubmitResponse, SchedulerError> {
        let at = now();
        if self.actors.get(actor_id)?.is_none() {
            return Err(StorageError::ActorNotFound(actor_id.to_string()).into());
        }

        self.journal.expire_stale_generation_jobs_for_actor(
            actor_id,
            self.recovery.generation_job_stale_minutes,
            at,
        )?;
        if let Some(active) = self.journal.active_job_for_actor(actor_id)? {
            debug!(actor_id, job_id = %active.id, status = %active.status, "Returning active job");
            return Ok(SubmitResponse {
                actor_id: actor_id.to_string(),
                job_id: active.id,
                status: active.status,
                queued: false,
                message: MSG_ALREADY_RUNNING.to_string(),
            });
        }

        let job = self
            .journal
            .create_job(actor_id, trigger, JobStatus::Queued, at)?;
        // Written before the push so a fast worker cannot be overwritten.
        self.actors
            .set_notebook_status(actor_id, NotebookStatus::Running, MSG_REFRESH_QUEUED, at)?;

        let priority = trigger.priority();
        let accepted = self
            .build_queue
            .enqueue_build(actor_id, trigger, &job.id, priority)
            || self.replace_expired_build(actor_id, trigger, &job.id, priority)?;
        if !accepted {
            self.journal
                .finalize_job(&job.id, &JobOutcome::skipped(MSG_ALREADY_RUNNING), at)?;
            self.counters.write().record_rejected_submit();
            info!(actor_id, job_id = %job.id, "Submission rejected, build already waiting");
            return Ok(SubmitResponse {
                actor_id: actor_id.to_string(),
                job_id: job.id,
                status: JobStatus::Skipped,
                queued: false,
                message: MSG_ALREADY_RUNNING.to_string(),
            });
        }

        info!(
            actor_id,
            job_id = %job.id,
            trigger = %trigger,
            priority,
            queue_depth = self.build_queue.depth(),
            "generation_enqueued"
        );
        Ok(SubmitResponse {
            actor_id: actor_id.to_string(),
            job_id: job.id,
            status: JobStatus::Queued,
            queued: true,
            message: MSG_JOB_QUEUED.to_string(),
        })
    }

    /// Hand a waiting build slot to `job_id` when the job occupying it is no
    /// longer active (expired while it waited).
    fn replace_expired_build(
        &self,
        actor_id: &str,
        trigger: TriggerType,
        job_id: &str,
        priority: u8,
    ) -> Result<bool, StorageError> {
        let Some(waiting) = self.build_queue.waiting_job(actor_id) else {
            // Popped in the meantime; the dedup slot is free again.
            return Ok(self
                .build_queue
                .enqueue_build(actor_id, trigger, job_id, priority));
        };
        let still_active = self
            .journal
            .get_job(&waiting)?
            .is_some_and(|job| job.status.is_active());
        if still_active {
            return Ok(false);
        }

        let replaced = self
            .build_queue
            .replace_build(actor_id, &waiting, trigger, job_id, priority);
        if replaced {
            info!(
                actor_id,
                stale_job_id = %waiting,
                job_id,
                "Replaced waiting build of an expired job"
            );
        }
        Ok(replaced)
    }

    /// The job with its phases, or `None` when it does not belong to the actor.
    pub fn get_job(&self, actor_id: &str, job_id: &str) -> Result<Option<JobDetail>, SchedulerError> {
        Ok(self.journal.job_detail(actor_id, job_id)?)
    }

    pub fn get_refresh_timeline(&self, actor_id: &str) -> Result<RefreshTimeline, SchedulerError> {
        self.get_refresh_timeline_at(actor_id, now())
    }

    pub fn get_refresh_timeline_at(
        &self,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<RefreshTimeline, SchedulerError> {
        if self.actors.get(actor_id)?.is_none() {
            return Err(StorageError::ActorNotFound(actor_id.to_string()).into());
        }
        let mut runs = Vec::new();
        for job in self.journal.recent_jobs_for_actor(actor_id, TIMELINE_RUN_LIMIT)? {
            let phases = self.journal.phases_for_job(&job.id)?;
            runs.push(JobDetail { job, phases });
        }
        let depths = QueueDepths::from(&self.stats());
        Ok(RefreshTimeline::build(actor_id, runs, depths, at))
    }

    /// One stale-run recovery pass; returns the recovered actor ids.
    pub fn recover_stale_runs(&self, at: DateTime<Utc>) -> Result<Vec<String>, StorageError> {
        StaleRunRecovery {
            actors: self.actors.as_ref(),
            journal: &self.journal,
            guards: &self.guards,
            build_queue: &self.build_queue,
            enrichment_queue: &self.enrichment_queue,
        }
        .run(self.recovery, at)
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = *self.counters.read();
        SchedulerStats {
            build_pending: self.build_queue.depth(),
            enrichment_pending: self.enrichment_queue.depth(),
            build_running: self.guards.generation.running_count(),
            enrichment_running: self.guards.enrichment.running_count(),
            completed: counters.completed,
            failed: counters.failed,
            skipped: counters.skipped,
            enrichment_completed: counters.enrichment_completed,
            enrichment_degraded: counters.enrichment_degraded,
        }
    }

    /// A receiver for the shutdown signal, for tasks that should stop with
    /// the workers.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Spawn the build and enrichment workers on the current tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.is_shutting_down() {
            return Err(SchedulerError::RuntimeError(
                "Scheduler was shut down and cannot be restarted".to_string(),
            ));
        }
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return Ok(());
        }

        workers.push(tokio::spawn(build_worker_loop(
            Arc::clone(&self.build_queue),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.counters),
            self.shutdown.subscribe(),
        )));
        workers.push(tokio::spawn(enrichment_worker_loop(
            Arc::clone(&self.enrichment_queue),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.counters),
            self.shutdown.subscribe(),
        )));

        info!(worker_count = workers.len(), "Started refresh workers");
        Ok(())
    }

    /// Signal shutdown and wait for the workers. In-flight jobs finish first;
    /// queued entries stay unprocessed.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(err) = handle.await {
                warn!(error = %err, "Refresh worker ended abnormally");
            }
        }
        if let Err(err) = self.journal.flush() {
            warn!(error = %err, "Failed to flush journal on shutdown");
        }
        info!(
            build_pending = self.build_queue.depth(),
            enrichment_pending = self.enrichment_queue.depth(),
            "Stopped refresh workers"
        );
    }
}
