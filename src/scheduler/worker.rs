//! Single-consumer worker loops, one per queue.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use super::stats::OutcomeCounters;
use crate::pipeline::GenerationPipeline;
use crate::queue::{BuildQueue, EnrichmentQueue};

/// Drain the build queue until shutdown. A dequeued build always runs to
/// completion before the shutdown flag is looked at again.
pub(crate) async fn build_worker_loop(
    queue: Arc<BuildQueue>,
    pipeline: Arc<GenerationPipeline>,
    counters: Arc<RwLock<OutcomeCounters>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Build worker started");
    while let Some(entry) = queue.next(&mut shutdown).await {
        debug!(
            actor_id = %entry.actor_id,
            job_id = %entry.job_id,
            priority = entry.priority,
            sequence = entry.sequence,
            "Dispatching build"
        );
        let outcome = pipeline.run_generation(&entry).await;
        counters.write().record_generation(&outcome);
    }
    debug!("Build worker stopped");
}

pub(crate) async fn enrichment_worker_loop(
    queue: Arc<EnrichmentQueue>,
    pipeline: Arc<GenerationPipeline>,
    counters: Arc<RwLock<OutcomeCounters>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Enrichment worker started");
    while let Some(entry) = queue.next(&mut shutdown).await {
        debug!(actor_id = %entry.actor_id, job_id = %entry.job_id, "Dispatching enrichment");
        let outcome = pipeline.run_enrichment(&entry).await;
        counters.write().record_enrichment(&outcome);
    }
    debug!("Enrichment worker stopped");
}
