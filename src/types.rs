//! Shared vocabulary: trigger types, job and phase states, identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Priority used for interactive submissions.
pub const INTERACTIVE_PRIORITY: u8 = 0;
/// Priority used for scheduled background submissions.
pub const BACKGROUND_PRIORITY: u8 = 2;

/// Origin of a refresh submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ManualRefresh,
    AutoRefresh,
    PageLoad,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::ManualRefresh => "manual_refresh",
            TriggerType::AutoRefresh => "auto_refresh",
            TriggerType::PageLoad => "page_load",
        }
    }

    /// Someone is waiting on the result.
    pub fn is_interactive(self) -> bool {
        !matches!(self, TriggerType::AutoRefresh)
    }

    /// Queue priority; lower dequeues first.
    pub fn priority(self) -> u8 {
        if self.is_interactive() {
            INTERACTIVE_PRIORITY
        } else {
            BACKGROUND_PRIORITY
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "manual_refresh" => Ok(TriggerType::ManualRefresh),
            "auto_refresh" => Ok(TriggerType::AutoRefresh),
            "page_load" => Ok(TriggerType::PageLoad),
            other => Err(SchedulerError::InvalidTrigger(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Error,
    Skipped,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Skipped => "skipped",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKey {
    SourceCollection,
    DeterministicBuild,
    LlmEnrichment,
}

impl PhaseKey {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKey::SourceCollection => "source_collection",
            PhaseKey::DeterministicBuild => "deterministic_build",
            PhaseKey::LlmEnrichment => "llm_enrichment",
        }
    }

    /// Human-readable label stored on the phase row.
    pub fn label(self) -> &'static str {
        match self {
            PhaseKey::SourceCollection => "Collecting sources",
            PhaseKey::DeterministicBuild => "Building timeline and questions",
            PhaseKey::LlmEnrichment => "Generating AI summary",
        }
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Running,
    Completed,
    Error,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Error => "error",
        }
    }
}

/// Persisted notebook state shown to analysts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotebookStatus {
    Idle,
    Running,
    Ready,
    Error,
}

impl NotebookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotebookStatus::Idle => "idle",
            NotebookStatus::Running => "running",
            NotebookStatus::Ready => "ready",
            NotebookStatus::Error => "error",
        }
    }
}

impl fmt::Display for NotebookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last outcome recorded by the auto-refresh driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRefreshStatus {
    Queued,
    Completed,
    Error,
}

impl AutoRefreshStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AutoRefreshStatus::Queued => "queued",
            AutoRefreshStatus::Completed => "completed",
            AutoRefreshStatus::Error => "error",
        }
    }
}

impl fmt::Display for AutoRefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Millisecond difference, never negative.
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// Whole milliseconds of a std duration, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn next_id(prefix: &str) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{}-{seq:08}", now_millis(), std::process::id())
}

pub fn new_job_id() -> String {
    next_id("job")
}

pub fn new_phase_id() -> String {
    next_id("phase")
}
