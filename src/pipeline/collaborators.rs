//! Collaborator seams consumed by the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::InteractiveBudgetConfig;
use crate::error::SchedulerError;
use crate::types::TriggerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Bounded by a wall-clock budget and a high-signal target.
    Interactive,
    /// Drain every feed.
    Background,
}

/// Budget handed to [`SourceCollector::import_sources`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBudget {
    #[serde(rename = "import_mode")]
    pub mode: ImportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_signal_target: Option<u32>,
}

impl ImportBudget {
    pub fn background() -> Self {
        Self {
            mode: ImportMode::Background,
            max_seconds: None,
            high_signal_target: None,
        }
    }

    pub fn interactive(max_seconds: u64, high_signal_target: u32) -> Self {
        Self {
            mode: ImportMode::Interactive,
            max_seconds: Some(max_seconds),
            high_signal_target: Some(high_signal_target),
        }
    }

    /// Interactive triggers get the configured budget; auto refresh runs unbounded.
    pub fn for_trigger(trigger: TriggerType, config: &InteractiveBudgetConfig) -> Self {
        if trigger.is_interactive() {
            Self::interactive(config.max_seconds, config.high_signal_target)
        } else {
            Self::background()
        }
    }
}

/// Result of one synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentOutput {
    /// Output was incomplete and should be retried.
    pub degraded: bool,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Fetches new evidence for an actor; returns how many items were stored.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    async fn import_sources(
        &self,
        actor_id: &str,
        budget: &ImportBudget,
    ) -> Result<u64, SchedulerError>;
}

/// Rebuilds the evidence timeline and question threads.
///
/// With both flags false the call is a cheap consistency pass.
#[async_trait]
pub trait NotebookBuilder: Send + Sync {
    async fn rebuild_deterministic(
        &self,
        actor_id: &str,
        generate_questions: bool,
        rebuild_timeline: bool,
    ) -> Result<(), SchedulerError>;
}

/// Opaque AI synthesis call.
#[async_trait]
pub trait EnrichmentSynthesizer: Send + Sync {
    async fn synthesize_enrichment(&self, actor_id: &str) -> Result<EnrichmentOutput, SchedulerError>;
}
