//! Durable sled-backed job/phase journal.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use tracing::{debug, info};

use super::types::{
    GenerationJob, GenerationPhase, JobDetail, JobOutcome, PhaseOutcome, PhaseTimelineEntry,
};
use crate::error::StorageError;
use crate::types::{elapsed_ms, new_job_id, new_phase_id, JobStatus, PhaseKey, PhaseStatus, TriggerType};

const TREE_JOBS: &str = "generation_jobs";
const TREE_PHASES: &str = "generation_phases";
const TREE_ACTOR_JOBS: &str = "generation_actor_jobs";
const TREE_JOB_PHASES: &str = "generation_job_phases";
const INDEX_SEP: u8 = 0x1f;

/// Floor applied to any stale-job threshold.
pub const MIN_STALE_JOB_MINUTES: u64 = 5;
/// Error message stamped on jobs expired as stale.
pub const STALE_JOB_ERROR: &str = "stale_generation_job_recovered";

/// Persisted record of every generation job and its phases.
///
/// Each operation is a short read-modify-write; `write_lock` only serializes
/// those writes against each other and is never held across an await.
#[derive(Clone)]
pub struct JobJournal {
    db: Db,
    jobs: Tree,
    phases: Tree,
    actor_jobs: Tree,
    job_phases: Tree,
    write_lock: Arc<Mutex<()>>,
}

impl JobJournal {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let jobs = db.open_tree(TREE_JOBS).map_err(StorageError::io)?;
        let phases = db.open_tree(TREE_PHASES).map_err(StorageError::io)?;
        let actor_jobs = db.open_tree(TREE_ACTOR_JOBS).map_err(StorageError::io)?;
        let job_phases = db.open_tree(TREE_JOB_PHASES).map_err(StorageError::io)?;
        Ok(Self {
            db,
            jobs,
            phases,
            actor_jobs,
            job_phases,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    pub fn create_job(
        &self,
        actor_id: &str,
        trigger_type: TriggerType,
        initial_status: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<GenerationJob, StorageError> {
        let job = GenerationJob {
            id: new_job_id(),
            actor_id: actor_id.to_string(),
            trigger_type,
            status: initial_status,
            created_at: now,
            started_at: (initial_status == JobStatus::Running).then_some(now),
            finished_at: initial_status.is_terminal().then_some(now),
            duration_ms: initial_status.is_terminal().then_some(0),
            imported_sources: 0,
            final_message: String::new(),
            error_message: String::new(),
        };

        let _write = self.write_lock.lock();
        put_json(&self.jobs, job.id.as_bytes(), &job)?;
        self.actor_jobs
            .insert(index_key(actor_id, &job.id), Vec::<u8>::new())
            .map_err(StorageError::io)?;

        debug!(
            actor_id,
            job_id = %job.id,
            trigger = %trigger_type,
            status = %initial_status,
            "Created generation job"
        );
        Ok(job)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>, StorageError> {
        get_json(&self.jobs, job_id.as_bytes())
    }

    /// Move an active job to `running`, keeping the first start time.
    /// Returns `false` when the job is already terminal.
    pub fn mark_job_started(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let _write = self.write_lock.lock();
        let mut job = self.require_job(job_id)?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Running;
        job.started_at.get_or_insert(now);
        put_json(&self.jobs, job_id.as_bytes(), &job)?;
        Ok(true)
    }

    /// Write the job's single terminal status. Returns `false` and writes
    /// nothing when a terminal status was already recorded.
    pub fn finalize_job(
        &self,
        job_id: &str,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let _write = self.write_lock.lock();
        let mut job = self.require_job(job_id)?;
        if job.status.is_terminal() {
            debug!(
                job_id,
                current = %job.status,
                attempted = %outcome.status,
                "Job already finalized"
            );
            return Ok(false);
        }
        job.status = outcome.status;
        job.finished_at = Some(now);
        job.duration_ms = Some(outcome.duration_ms);
        job.imported_sources = outcome.imported_sources;
        job.final_message = outcome.final_message.clone();
        job.error_message = outcome.error_message.clone();
        put_json(&self.jobs, job_id.as_bytes(), &job)?;
        Ok(true)
    }

    pub fn start_phase(
        &self,
        job_id: &str,
        actor_id: &str,
        phase_key: PhaseKey,
        attempt: u32,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<GenerationPhase, StorageError> {
        let phase = GenerationPhase {
            id: new_phase_id(),
            job_id: job_id.to_string(),
            actor_id: actor_id.to_string(),
            phase_key,
            phase_label: phase_key.label().to_string(),
            attempt: attempt.max(1),
            status: PhaseStatus::Running,
            message: message.to_string(),
            error_detail: String::new(),
            started_at: now,
            finished_at: None,
            duration_ms: None,
        };

        let _write = self.write_lock.lock();
        put_json(&self.phases, phase.id.as_bytes(), &phase)?;
        self.job_phases
            .insert(index_key(job_id, &phase.id), Vec::<u8>::new())
            .map_err(StorageError::io)?;
        Ok(phase)
    }

    /// Close a running phase. Returns `false` when it was already closed.
    pub fn finish_phase(
        &self,
        phase_id: &str,
        outcome: &PhaseOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let _write = self.write_lock.lock();
        let mut phase: GenerationPhase = get_json(&self.phases, phase_id.as_bytes())?
            .ok_or_else(|| StorageError::PhaseNotFound(phase_id.to_string()))?;
        if phase.status != PhaseStatus::Running {
            return Ok(false);
        }
        phase.status = outcome.status;
        phase.message = outcome.message.clone();
        phase.error_detail = outcome.error_detail.clone();
        phase.finished_at = Some(now);
        phase.duration_ms = Some(
            outcome
                .duration_ms
                .unwrap_or_else(|| elapsed_ms(phase.started_at, now)),
        );
        put_json(&self.phases, phase_id.as_bytes(), &phase)?;
        Ok(true)
    }

    pub fn get_phase(&self, phase_id: &str) -> Result<Option<GenerationPhase>, StorageError> {
        get_json(&self.phases, phase_id.as_bytes())
    }

    /// Newest job for the actor still `queued` or `running`.
    pub fn active_job_for_actor(
        &self,
        actor_id: &str,
    ) -> Result<Option<GenerationJob>, StorageError> {
        Ok(self
            .jobs_for_actor(actor_id)?
            .into_iter()
            .find(|job| job.status.is_active()))
    }

    /// Flip the actor's active jobs older than the threshold to `error`.
    pub fn expire_stale_generation_jobs_for_actor(
        &self,
        actor_id: &str,
        stale_after_minutes: u64,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let minutes = stale_after_minutes.max(MIN_STALE_JOB_MINUTES);
        let cutoff = now - Duration::minutes(minutes as i64);

        let _write = self.write_lock.lock();
        let mut expired = 0usize;
        for mut job in self.jobs_for_actor(actor_id)? {
            if !job.status.is_active() || job.reference_time() > cutoff {
                continue;
            }
            job.status = JobStatus::Error;
            job.finished_at = Some(now);
            job.duration_ms.get_or_insert(0);
            if job.error_message.is_empty() {
                job.error_message = STALE_JOB_ERROR.to_string();
            }
            put_json(&self.jobs, job.id.as_bytes(), &job)?;
            expired += 1;
        }

        if expired > 0 {
            info!(actor_id, expired, stale_after_minutes = minutes, "Expired stale generation jobs");
        }
        Ok(expired)
    }

    /// All jobs for the actor, newest first.
    pub fn jobs_for_actor(&self, actor_id: &str) -> Result<Vec<GenerationJob>, StorageError> {
        let mut out = Vec::new();
        for result in self.actor_jobs.scan_prefix(index_prefix(actor_id)) {
            let (key, _) = result.map_err(StorageError::io)?;
            let job_id = index_suffix(&key)?;
            if let Some(job) = self.get_job(&job_id)? {
                out.push(job);
            }
        }
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }

    pub fn recent_jobs_for_actor(
        &self,
        actor_id: &str,
        limit: usize,
    ) -> Result<Vec<GenerationJob>, StorageError> {
        let mut jobs = self.jobs_for_actor(actor_id)?;
        jobs.truncate(limit);
        Ok(jobs)
    }

    /// Phases of a job, oldest first.
    pub fn phases_for_job(&self, job_id: &str) -> Result<Vec<GenerationPhase>, StorageError> {
        let mut out = Vec::new();
        for result in self.job_phases.scan_prefix(index_prefix(job_id)) {
            let (key, _) = result.map_err(StorageError::io)?;
            let phase_id = index_suffix(&key)?;
            if let Some(phase) = self.get_phase(&phase_id)? {
                out.push(phase);
            }
        }
        out.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }

    /// The job with its phases, or `None` if it does not belong to the actor.
    pub fn job_detail(
        &self,
        actor_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDetail>, StorageError> {
        let Some(job) = self.get_job(job_id)? else {
            return Ok(None);
        };
        if job.actor_id != actor_id {
            return Ok(None);
        }
        let phases = self.phases_for_job(job_id)?;
        Ok(Some(JobDetail { job, phases }))
    }

    /// Phases of the actor's most recent jobs, newest first.
    pub fn recent_phases_for_actor(
        &self,
        actor_id: &str,
        job_limit: usize,
        phase_limit: usize,
    ) -> Result<Vec<PhaseTimelineEntry>, StorageError> {
        let mut entries = Vec::new();
        for job in self.recent_jobs_for_actor(actor_id, job_limit.max(1))? {
            for phase in self.phases_for_job(&job.id)? {
                entries.push(PhaseTimelineEntry {
                    job_status: job.status,
                    trigger_type: job.trigger_type,
                    job_created_at: job.created_at,
                    phase,
                });
            }
        }
        entries.sort_by(|a, b| {
            b.phase
                .started_at
                .cmp(&a.phase.started_at)
                .then_with(|| b.phase.id.cmp(&a.phase.id))
        });
        entries.truncate(phase_limit.max(1));
        Ok(entries)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(StorageError::io)?;
        Ok(())
    }

    fn require_job(&self, job_id: &str) -> Result<GenerationJob, StorageError> {
        self.get_job(job_id)?
            .ok_or_else(|| StorageError::JobNotFound(job_id.to_string()))
    }
}

fn index_prefix(owner: &str) -> Vec<u8> {
    let mut key = owner.as_bytes().to_vec();
    key.push(INDEX_SEP);
    key
}

fn index_key(owner: &str, child: &str) -> Vec<u8> {
    let mut key = index_prefix(owner);
    key.extend_from_slice(child.as_bytes());
    key
}

fn index_suffix(key: &[u8]) -> Result<String, StorageError> {
    let start = key
        .iter()
        .position(|b| *b == INDEX_SEP)
        .map(|idx| idx + 1)
        .ok_or_else(|| StorageError::data("journal index key without separator"))?;
    String::from_utf8(key[start..].to_vec()).map_err(StorageError::data)
}

fn put_json<T: Serialize>(tree: &Tree, key: &[u8], value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_vec(value).map_err(StorageError::data)?;
    tree.insert(key, raw).map_err(StorageError::io)?;
    Ok(())
}

fn get_json<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>, StorageError> {
    let Some(raw) = tree.get(key).map_err(StorageError::io)? else {
        return Ok(None);
    };
    let parsed = serde_json::from_slice(&raw).map_err(StorageError::data)?;
    Ok(Some(parsed))
}
