//! Actor Store
//!
//! Durable per-actor refresh state. This is the crash-surviving view that
//! stale-run recovery reconciles against the in-memory execution guard.

pub mod persistence;

pub use persistence::SledActorStore;

use crate::error::StorageError;
use crate::types::{AutoRefreshStatus, NotebookStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message written when recovery flips a stalled actor to `error`.
pub const STALLED_REFRESH_MESSAGE: &str = "Previous refresh stalled and was recovered. Refresh again.";

/// ActorRecord: profile identity plus refresh state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub id: String,
    pub display_name: String,
    pub is_tracked: bool,
    pub created_at: DateTime<Utc>,
    pub notebook_status: NotebookStatus,
    pub notebook_message: String,
    pub notebook_updated_at: Option<DateTime<Utc>>,
    pub auto_refresh_last_run_at: Option<DateTime<Utc>>,
    pub auto_refresh_last_status: Option<AutoRefreshStatus>,
    pub last_refresh_duration_ms: Option<u64>,
    pub last_refresh_sources_processed: Option<u64>,
}

impl ActorRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            is_tracked: false,
            created_at,
            notebook_status: NotebookStatus::Idle,
            notebook_message: String::new(),
            notebook_updated_at: None,
            auto_refresh_last_run_at: None,
            auto_refresh_last_status: None,
            last_refresh_duration_ms: None,
            last_refresh_sources_processed: None,
        }
    }

    pub fn tracked(mut self) -> Self {
        self.is_tracked = true;
        self
    }

    /// Ordering key for auto-refresh: last run, else creation time.
    pub fn auto_refresh_anchor(&self) -> DateTime<Utc> {
        self.auto_refresh_last_run_at.unwrap_or(self.created_at)
    }
}

/// Actor store interface
///
/// `update` is the single mutation primitive; every state transition below is
/// a short read-modify-write on one record.
pub trait ActorStore: Send + Sync {
    fn get(&self, actor_id: &str) -> Result<Option<ActorRecord>, StorageError>;
    fn upsert(&self, record: &ActorRecord) -> Result<(), StorageError>;
    fn list(&self) -> Result<Vec<ActorRecord>, StorageError>;

    /// Apply `apply` to the stored record and persist it.
    /// Returns the updated record, or `None` when the actor does not exist.
    fn update(
        &self,
        actor_id: &str,
        apply: &mut dyn FnMut(&mut ActorRecord),
    ) -> Result<Option<ActorRecord>, StorageError>;

    fn list_tracked(&self) -> Result<Vec<ActorRecord>, StorageError> {
        Ok(self.list()?.into_iter().filter(|a| a.is_tracked).collect())
    }

    fn list_running(&self) -> Result<Vec<ActorRecord>, StorageError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|a| a.notebook_status == NotebookStatus::Running)
            .collect())
    }

    /// Persist the analyst-visible notebook status.
    fn set_notebook_status(
        &self,
        actor_id: &str,
        status: NotebookStatus,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.update(actor_id, &mut |record| {
            record.notebook_status = status;
            record.notebook_message = message.to_string();
            record.notebook_updated_at = Some(now);
        })?
        .map(|_| ())
        .ok_or_else(|| StorageError::ActorNotFound(actor_id.to_string()))
    }

    fn record_refresh_metrics(
        &self,
        actor_id: &str,
        duration_ms: u64,
        sources_processed: u64,
    ) -> Result<(), StorageError> {
        self.update(actor_id, &mut |record| {
            record.last_refresh_duration_ms = Some(duration_ms);
            record.last_refresh_sources_processed = Some(sources_processed);
        })?
        .map(|_| ())
        .ok_or_else(|| StorageError::ActorNotFound(actor_id.to_string()))
    }

    fn set_auto_refresh_state(
        &self,
        actor_id: &str,
        last_run_at: Option<DateTime<Utc>>,
        status: AutoRefreshStatus,
    ) -> Result<(), StorageError> {
        self.update(actor_id, &mut |record| {
            if let Some(at) = last_run_at {
                record.auto_refresh_last_run_at = Some(at);
            }
            record.auto_refresh_last_status = Some(status);
        })?
        .map(|_| ())
        .ok_or_else(|| StorageError::ActorNotFound(actor_id.to_string()))
    }

    /// Flip a stalled `running` actor to `error`.
    fn mark_recovered(&self, actor_id: &str, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.update(actor_id, &mut |record| {
            record.notebook_status = NotebookStatus::Error;
            record.notebook_message = STALLED_REFRESH_MESSAGE.to_string();
            record.notebook_updated_at = Some(now);
            record.auto_refresh_last_status = Some(AutoRefreshStatus::Error);
        })?
        .map(|_| ())
        .ok_or_else(|| StorageError::ActorNotFound(actor_id.to_string()))
    }
}
