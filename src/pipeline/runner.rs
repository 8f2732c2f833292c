//! Phase execution for dispatched build and enrichment jobs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::collaborators::{
    EnrichmentSynthesizer, ImportBudget, NotebookBuilder, SourceCollector,
};
use crate::concurrency::ActorExecutionGuard;
use crate::config::{EnrichmentConfig, InteractiveBudgetConfig};
use crate::error::{SchedulerError, StorageError};
use crate::journal::{JobJournal, JobOutcome, PhaseScope};
use crate::queue::{BuildEntry, EnrichmentEntry, EnrichmentQueue};
use crate::store::ActorStore;
use crate::types::{duration_ms, now, AutoRefreshStatus, NotebookStatus, PhaseKey, TriggerType};

pub const MSG_COLLECTING: &str = "Collecting sources...";
pub const MSG_TIMELINE_READY: &str = "Timeline ready. Generating question threads and guidance...";
pub const MSG_ENRICHMENT_PENDING: &str = "Notebook ready. Generating AI summary...";
pub const MSG_ENRICHED: &str = "Notebook ready. AI summary generated.";
pub const MSG_ENRICHMENT_DEGRADED: &str =
    "Notebook ready. AI summary incomplete after retries; showing deterministic notebook.";
pub const MSG_ALREADY_RUNNING: &str = "Refresh already in progress.";
pub const MSG_JOB_EXPIRED: &str = "Refresh job expired before it started. Refresh again.";

/// How a dispatched build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Finished; `enrichment_queued` means the notebook stays `running`.
    Completed {
        imported: u64,
        skip_heavy: bool,
        enrichment_queued: bool,
    },
    Failed { error: String },
    /// Not executed: the actor was already running or the job had expired.
    Skipped { reason: String },
}

/// How a dispatched enrichment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Enriched { attempts: u32 },
    Degraded { attempts: u32 },
    Skipped { reason: String },
}

struct BuildSummary {
    imported: u64,
    skip_heavy: bool,
    enrichment_queued: bool,
    final_message: String,
}

/// Collaborators for [`GenerationPipeline`].
#[derive(Clone)]
pub struct PipelineCollaborators {
    pub collector: Arc<dyn SourceCollector>,
    pub builder: Arc<dyn NotebookBuilder>,
    /// `None` disables the enrichment phase entirely.
    pub enricher: Option<Arc<dyn EnrichmentSynthesizer>>,
}

/// Runs the ordered phases of a job once a worker dispatches it.
pub struct GenerationPipeline {
    journal: Arc<JobJournal>,
    actors: Arc<dyn ActorStore>,
    guards: ActorExecutionGuard,
    enrichment_queue: Arc<EnrichmentQueue>,
    collaborators: PipelineCollaborators,
    interactive: InteractiveBudgetConfig,
    enrichment: EnrichmentConfig,
}

impl GenerationPipeline {
    pub fn new(
        journal: Arc<JobJournal>,
        actors: Arc<dyn ActorStore>,
        guards: ActorExecutionGuard,
        enrichment_queue: Arc<EnrichmentQueue>,
        collaborators: PipelineCollaborators,
        interactive: InteractiveBudgetConfig,
        enrichment: EnrichmentConfig,
    ) -> Self {
        Self {
            journal,
            actors,
            guards,
            enrichment_queue,
            collaborators,
            interactive,
            enrichment,
        }
    }

    fn enrichment_configured(&self) -> bool {
        self.enrichment.enabled && self.collaborators.enricher.is_some()
    }

    /// Execute source collection and the deterministic build for one job.
    ///
    /// Never returns an error: every outcome lands in the journal and the
    /// actor's notebook status. The generation guard is held for the whole
    /// run and released on every exit path.
    pub async fn run_generation(&self, entry: &BuildEntry) -> GenerationOutcome {
        let actor_id = entry.actor_id.as_str();
        let job_id = entry.job_id.as_str();

        let Some(_permit) = self.guards.generation.try_start(actor_id) else {
            warn!(actor_id, job_id, "Generation already running for actor, skipping job");
            self.finalize_best_effort(job_id, JobOutcome::skipped(MSG_ALREADY_RUNNING));
            return GenerationOutcome::Skipped {
                reason: MSG_ALREADY_RUNNING.to_string(),
            };
        };

        match self.journal.mark_job_started(job_id, now()) {
            Ok(true) => {}
            Ok(false) => {
                warn!(actor_id, job_id, "Job was finalized before dispatch, not running it");
                self.persist_status_best_effort(actor_id, NotebookStatus::Error, MSG_JOB_EXPIRED);
                return GenerationOutcome::Skipped {
                    reason: MSG_JOB_EXPIRED.to_string(),
                };
            }
            Err(err) => {
                error!(actor_id, job_id, error = %err, "Failed to mark job started");
            }
        }

        info!(
            actor_id,
            job_id,
            trigger = %entry.trigger,
            priority = entry.priority,
            "generation_started"
        );
        let started = Instant::now();

        let result = AssertUnwindSafe(self.execute_build(entry))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(SchedulerError::PhasePanicked {
                    phase: "generation".to_string(),
                    detail: panic_message(panic.as_ref()),
                })
            });
        let duration_ms = duration_ms(started.elapsed());

        match result {
            Ok(summary) => {
                self.finalize_best_effort(
                    job_id,
                    JobOutcome::completed(summary.imported, duration_ms, summary.final_message),
                );
                if entry.trigger == TriggerType::AutoRefresh {
                    self.auto_refresh_status_best_effort(actor_id, AutoRefreshStatus::Completed);
                }
                info!(
                    actor_id,
                    job_id,
                    imported = summary.imported,
                    skip_heavy = summary.skip_heavy,
                    enrichment_queued = summary.enrichment_queued,
                    duration_ms,
                    "generation_completed"
                );
                GenerationOutcome::Completed {
                    imported: summary.imported,
                    skip_heavy: summary.skip_heavy,
                    enrichment_queued: summary.enrichment_queued,
                }
            }
            Err(err) => {
                let message = format!("Notebook generation failed: {}", err);
                if let Err(metrics_err) = self.actors.record_refresh_metrics(actor_id, duration_ms, 0) {
                    warn!(actor_id, error = %metrics_err, "Failed to record refresh metrics");
                }
                self.persist_status_best_effort(actor_id, NotebookStatus::Error, &message);
                self.finalize_best_effort(job_id, JobOutcome::error(duration_ms, err.to_string()));
                if entry.trigger == TriggerType::AutoRefresh {
                    self.auto_refresh_status_best_effort(actor_id, AutoRefreshStatus::Error);
                }
                error!(actor_id, job_id, duration_ms, error = %err, "generation_failed");
                GenerationOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    async fn execute_build(&self, entry: &BuildEntry) -> Result<BuildSummary, SchedulerError> {
        let actor_id = entry.actor_id.as_str();
        let job_id = entry.job_id.as_str();
        let started = Instant::now();
        let budget = ImportBudget::for_trigger(entry.trigger, &self.interactive);

        self.actors
            .set_notebook_status(actor_id, NotebookStatus::Running, MSG_COLLECTING, now())?;

        let phase = PhaseScope::start(
            &self.journal,
            job_id,
            actor_id,
            PhaseKey::SourceCollection,
            1,
            MSG_COLLECTING,
        )?;
        let imported = match self
            .collaborators
            .collector
            .import_sources(actor_id, &budget)
            .await
        {
            Ok(count) => {
                phase.complete(format!("Imported {} source(s).", count))?;
                count
            }
            Err(err) => {
                phase.fail("Source collection failed", err.to_string())?;
                return Err(err);
            }
        };

        let skip_heavy = entry.trigger == TriggerType::AutoRefresh && imported == 0;
        let build_message = if skip_heavy {
            "No new sources. Running consistency check...".to_string()
        } else {
            format!("Sources collected ({}). Building timeline preview...", imported)
        };
        self.actors
            .set_notebook_status(actor_id, NotebookStatus::Running, &build_message, now())?;

        let phase = PhaseScope::start(
            &self.journal,
            job_id,
            actor_id,
            PhaseKey::DeterministicBuild,
            1,
            &build_message,
        )?;
        if let Err(err) = self.rebuild(actor_id, skip_heavy).await {
            phase.fail("Deterministic build failed", err.to_string())?;
            return Err(err);
        }
        phase.complete(if skip_heavy {
            "Consistency check passed; heavy recompute skipped."
        } else {
            "Timeline and question threads rebuilt."
        })?;

        let elapsed_ms = duration_ms(started.elapsed());
        self.actors
            .record_refresh_metrics(actor_id, elapsed_ms, imported)?;

        let wants_enrichment = !skip_heavy && self.enrichment_configured();
        let final_message = format!("Notebook ready. Imported {} feed source(s).", imported);
        if wants_enrichment {
            // Status must read `running` before the enrichment worker can see the entry.
            self.actors.set_notebook_status(
                actor_id,
                NotebookStatus::Running,
                MSG_ENRICHMENT_PENDING,
                now(),
            )?;
            if self.enrichment_queue.enqueue_enrichment(actor_id, job_id) {
                info!(actor_id, job_id, "llm_enrichment_enqueued");
            } else {
                debug!(actor_id, job_id, "Enrichment already waiting for actor");
            }
        } else {
            self.actors
                .set_notebook_status(actor_id, NotebookStatus::Ready, &final_message, now())?;
        }

        Ok(BuildSummary {
            imported,
            skip_heavy,
            enrichment_queued: wants_enrichment,
            final_message,
        })
    }

    async fn rebuild(&self, actor_id: &str, skip_heavy: bool) -> Result<(), SchedulerError> {
        let builder = &self.collaborators.builder;
        if skip_heavy {
            return builder.rebuild_deterministic(actor_id, false, false).await;
        }
        builder.rebuild_deterministic(actor_id, false, true).await?;
        self.actors
            .set_notebook_status(actor_id, NotebookStatus::Running, MSG_TIMELINE_READY, now())?;
        builder.rebuild_deterministic(actor_id, true, false).await
    }

    /// Run the enrichment phase with bounded retries.
    ///
    /// Degraded output and errors are retried up to `max_attempts`; after
    /// that the notebook is marked `ready` with a note instead of failing.
    pub async fn run_enrichment(&self, entry: &EnrichmentEntry) -> EnrichmentOutcome {
        let actor_id = entry.actor_id.as_str();
        let job_id = entry.job_id.as_str();

        let Some(enricher) = self.collaborators.enricher.clone() else {
            warn!(actor_id, job_id, "Enrichment dispatched without a synthesizer");
            return EnrichmentOutcome::Skipped {
                reason: "enrichment not configured".to_string(),
            };
        };
        let Some(_permit) = self.guards.enrichment.try_start(actor_id) else {
            warn!(actor_id, job_id, "Enrichment already running for actor, skipping");
            return EnrichmentOutcome::Skipped {
                reason: MSG_ALREADY_RUNNING.to_string(),
            };
        };

        let max_attempts = self.enrichment.max_attempts.max(1);
        let mut attempts = 0;
        let mut accepted = false;
        for attempt in 1..=max_attempts {
            attempts = attempt;
            match self
                .attempt_enrichment(enricher.as_ref(), actor_id, job_id, attempt, max_attempts)
                .await
            {
                Ok(true) => {
                    accepted = true;
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(actor_id, job_id, attempt, error = %err, "Failed to journal enrichment attempt");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.enrichment.retry_sleep()).await;
            }
        }

        let message = if accepted {
            MSG_ENRICHED
        } else {
            MSG_ENRICHMENT_DEGRADED
        };
        self.persist_status_best_effort(actor_id, NotebookStatus::Ready, message);
        info!(actor_id, job_id, attempts, degraded = !accepted, "llm_enrichment_finished");

        if accepted {
            EnrichmentOutcome::Enriched { attempts }
        } else {
            EnrichmentOutcome::Degraded { attempts }
        }
    }

    /// One journaled attempt. `Ok(true)` when the output was accepted.
    async fn attempt_enrichment(
        &self,
        enricher: &dyn EnrichmentSynthesizer,
        actor_id: &str,
        job_id: &str,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<bool, StorageError> {
        let phase = PhaseScope::start(
            &self.journal,
            job_id,
            actor_id,
            PhaseKey::LlmEnrichment,
            attempt,
            &format!("Generating AI summary (attempt {}/{})", attempt, max_attempts),
        )?;

        let result = AssertUnwindSafe(enricher.synthesize_enrichment(actor_id))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(output)) if !output.degraded => {
                phase.complete("AI summary generated.")?;
                Ok(true)
            }
            Ok(Ok(_)) => {
                debug!(actor_id, attempt, "Enrichment output degraded");
                phase.fail("Degraded output", "synthesis output incomplete")?;
                Ok(false)
            }
            Ok(Err(err)) => {
                warn!(actor_id, attempt, error = %err, "Enrichment attempt failed");
                phase.fail("Enrichment attempt failed", err.to_string())?;
                Ok(false)
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(actor_id, attempt, detail = %detail, "Enrichment attempt panicked");
                phase.fail("Enrichment attempt panicked", detail)?;
                Ok(false)
            }
        }
    }

    fn finalize_best_effort(&self, job_id: &str, outcome: JobOutcome) {
        match self.journal.finalize_job(job_id, &outcome, now()) {
            Ok(true) => {}
            Ok(false) => debug!(job_id, status = %outcome.status, "Job already had a terminal status"),
            Err(err) => warn!(job_id, error = %err, "Failed to finalize job"),
        }
    }

    fn persist_status_best_effort(&self, actor_id: &str, status: NotebookStatus, message: &str) {
        if let Err(err) = self.actors.set_notebook_status(actor_id, status, message, now()) {
            warn!(actor_id, status = %status, error = %err, "Failed to persist notebook status");
        }
    }

    fn auto_refresh_status_best_effort(&self, actor_id: &str, status: AutoRefreshStatus) {
        if let Err(err) = self.actors.set_auto_refresh_state(actor_id, None, status) {
            warn!(actor_id, error = %err, "Failed to record auto-refresh status");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
