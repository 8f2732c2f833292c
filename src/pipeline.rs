//! Generation pipeline: collaborator seams and the phase runner.

mod collaborators;
mod collector;
mod evidence;
mod runner;

pub use collaborators::{
    EnrichmentOutput, EnrichmentSynthesizer, ImportBudget, ImportMode, NotebookBuilder,
    SourceCollector,
};
pub use collector::{EvidenceFeed, EvidenceItem, EvidenceSink, FeedCollector};
pub use evidence::{NotebookSnapshot, SledEvidenceStore, TimelineEntry};
pub use runner::{
    EnrichmentOutcome, GenerationOutcome, GenerationPipeline, PipelineCollaborators,
    MSG_ALREADY_RUNNING, MSG_ENRICHED, MSG_ENRICHMENT_DEGRADED, MSG_ENRICHMENT_PENDING,
    MSG_JOB_EXPIRED,
};
