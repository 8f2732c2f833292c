//! Job/phase journal: the durable record of every generation attempt.

mod store;
mod types;

pub use store::{JobJournal, MIN_STALE_JOB_MINUTES, STALE_JOB_ERROR};
pub use types::{
    GenerationJob, GenerationPhase, JobDetail, JobOutcome, PhaseOutcome, PhaseTimelineEntry,
};

use std::sync::Arc;

use tracing::warn;

use crate::error::StorageError;
use crate::types::{now, PhaseKey};

/// A started phase that is finished exactly once.
///
/// Call [`PhaseScope::complete`] or [`PhaseScope::fail`]. If the scope is
/// dropped first (early `?` return, panic), the phase is closed as `error`.
pub struct PhaseScope {
    journal: Arc<JobJournal>,
    phase: GenerationPhase,
    finished: bool,
}

impl PhaseScope {
    pub fn start(
        journal: &Arc<JobJournal>,
        job_id: &str,
        actor_id: &str,
        phase_key: PhaseKey,
        attempt: u32,
        message: &str,
    ) -> Result<Self, StorageError> {
        let phase = journal.start_phase(job_id, actor_id, phase_key, attempt, message, now())?;
        Ok(Self {
            journal: Arc::clone(journal),
            phase,
            finished: false,
        })
    }

    pub fn phase(&self) -> &GenerationPhase {
        &self.phase
    }

    pub fn complete(mut self, message: impl Into<String>) -> Result<(), StorageError> {
        self.finish(PhaseOutcome::completed(message))
    }

    pub fn fail(
        mut self,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Result<(), StorageError> {
        self.finish(PhaseOutcome::error(message, detail))
    }

    fn finish(&mut self, outcome: PhaseOutcome) -> Result<(), StorageError> {
        self.finished = true;
        self.journal.finish_phase(&self.phase.id, &outcome, now())?;
        Ok(())
    }
}

impl Drop for PhaseScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let outcome = PhaseOutcome::error("Phase aborted", "phase exited without a recorded outcome");
        if let Err(err) = self.finish(outcome) {
            warn!(
                phase_id = %self.phase.id,
                job_id = %self.phase.job_id,
                error = %err,
                "Failed to close aborted phase"
            );
        }
    }
}
