//! Journal record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, PhaseKey, PhaseStatus, TriggerType};

/// One submitted refresh attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub actor_id: String,
    pub trigger_type: TriggerType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub imported_sources: u64,
    pub final_message: String,
    pub error_message: String,
}

impl GenerationJob {
    /// Time the job began counting toward staleness.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.started_at.unwrap_or(self.created_at)
    }
}

/// One sub-step of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPhase {
    pub id: String,
    pub job_id: String,
    pub actor_id: String,
    pub phase_key: PhaseKey,
    pub phase_label: String,
    pub attempt: u32,
    pub status: PhaseStatus,
    pub message: String,
    pub error_detail: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

/// Terminal values written by `finalize_job`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub imported_sources: u64,
    pub duration_ms: u64,
    pub final_message: String,
    pub error_message: String,
}

impl JobOutcome {
    pub fn completed(imported_sources: u64, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            imported_sources,
            duration_ms,
            final_message: message.into(),
            error_message: String::new(),
        }
    }

    pub fn error(duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            imported_sources: 0,
            duration_ms,
            final_message: String::new(),
            error_message: error.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Skipped,
            imported_sources: 0,
            duration_ms: 0,
            final_message: message.into(),
            error_message: String::new(),
        }
    }
}

/// Values written by `finish_phase`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub status: PhaseStatus,
    pub message: String,
    pub error_detail: String,
    pub duration_ms: Option<u64>,
}

impl PhaseOutcome {
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: PhaseStatus::Completed,
            message: message.into(),
            error_detail: String::new(),
            duration_ms: None,
        }
    }

    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: PhaseStatus::Error,
            message: message.into(),
            error_detail: detail.into(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// A job together with its phases, ordered by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: GenerationJob,
    pub phases: Vec<GenerationPhase>,
}

/// A phase annotated with its parent job, for timeline views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimelineEntry {
    pub job_status: JobStatus,
    pub trigger_type: TriggerType,
    pub job_created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub phase: GenerationPhase,
}
