//! Scheduler statistics.

use serde::{Deserialize, Serialize};

use crate::pipeline::{EnrichmentOutcome, GenerationOutcome};

/// Point-in-time view of both queues and the outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Builds waiting in the priority queue
    pub build_pending: usize,
    /// Enrichments waiting in the FIFO queue
    pub enrichment_pending: usize,
    /// Actors holding the generation guard
    pub build_running: usize,
    /// Actors holding the enrichment guard
    pub enrichment_running: usize,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub enrichment_completed: u64,
    pub enrichment_degraded: u64,
}

/// Outcome counters updated by the workers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OutcomeCounters {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub enrichment_completed: u64,
    pub enrichment_degraded: u64,
}

impl OutcomeCounters {
    pub fn record_generation(&mut self, outcome: &GenerationOutcome) {
        match outcome {
            GenerationOutcome::Completed { .. } => self.completed += 1,
            GenerationOutcome::Failed { .. } => self.failed += 1,
            GenerationOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn record_enrichment(&mut self, outcome: &EnrichmentOutcome) {
        match outcome {
            EnrichmentOutcome::Enriched { .. } => self.enrichment_completed += 1,
            EnrichmentOutcome::Degraded { .. } => self.enrichment_degraded += 1,
            EnrichmentOutcome::Skipped { .. } => {}
        }
    }

    /// Submissions rejected by the build-queue dedup.
    pub fn record_rejected_submit(&mut self) {
        self.skipped += 1;
    }
}
