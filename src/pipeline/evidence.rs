//! Sled-backed evidence store and deterministic notebook builder.
//!
//! Used by the stock binary. Deployments with real feed parsing and notebook
//! rendering plug their own [`SourceCollector`](super::SourceCollector) and
//! [`NotebookBuilder`] implementations into the scheduler instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use super::collaborators::NotebookBuilder;
use super::collector::{EvidenceItem, EvidenceSink};
use crate::error::{SchedulerError, StorageError};
use crate::types::now;

const TREE_EVIDENCE: &str = "evidence_items";
const TREE_NOTEBOOKS: &str = "notebook_snapshots";
const KEY_SEP: u8 = 0x1f;
const TIMELINE_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEvidence {
    item: EvidenceItem,
    stored_at: DateTime<Utc>,
}

impl StoredEvidence {
    fn occurred_at(&self) -> DateTime<Utc> {
        self.item.published_at.unwrap_or(self.stored_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub occurred_at: DateTime<Utc>,
    pub title: String,
    pub source_url: String,
}

/// Derived notebook state for one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookSnapshot {
    pub actor_id: String,
    pub evidence_count: u64,
    pub timeline: Vec<TimelineEntry>,
    pub questions: Vec<String>,
    pub timeline_rebuilt_at: Option<DateTime<Utc>>,
    pub questions_generated_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SledEvidenceStore {
    evidence: Tree,
    notebooks: Tree,
}

impl SledEvidenceStore {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        Ok(Self {
            evidence: db.open_tree(TREE_EVIDENCE).map_err(StorageError::io)?,
            notebooks: db.open_tree(TREE_NOTEBOOKS).map_err(StorageError::io)?,
        })
    }

    pub fn shared(db: &Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    pub fn snapshot(&self, actor_id: &str) -> Result<Option<NotebookSnapshot>, StorageError> {
        let Some(raw) = self.notebooks.get(actor_id.as_bytes()).map_err(StorageError::io)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&raw).map_err(StorageError::data)?))
    }

    fn evidence_for(&self, actor_id: &str) -> Result<Vec<StoredEvidence>, StorageError> {
        let mut prefix = actor_id.as_bytes().to_vec();
        prefix.push(KEY_SEP);
        let mut out = Vec::new();
        for result in self.evidence.scan_prefix(prefix) {
            let (_, value) = result.map_err(StorageError::io)?;
            out.push(serde_json::from_slice(&value).map_err(StorageError::data)?);
        }
        Ok(out)
    }

    fn rebuild(
        &self,
        actor_id: &str,
        generate_questions: bool,
        rebuild_timeline: bool,
    ) -> Result<NotebookSnapshot, StorageError> {
        let at = now();
        let mut evidence = self.evidence_for(actor_id)?;
        let mut snapshot = self.snapshot(actor_id)?.unwrap_or_else(|| NotebookSnapshot {
            actor_id: actor_id.to_string(),
            evidence_count: 0,
            timeline: Vec::new(),
            questions: Vec::new(),
            timeline_rebuilt_at: None,
            questions_generated_at: None,
            checked_at: at,
        });
        snapshot.evidence_count = evidence.len() as u64;
        snapshot.checked_at = at;

        evidence.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        if rebuild_timeline {
            snapshot.timeline = evidence
                .iter()
                .take(TIMELINE_LIMIT)
                .map(|stored| TimelineEntry {
                    occurred_at: stored.occurred_at(),
                    title: stored.item.title.clone(),
                    source_url: stored.item.source_url.clone(),
                })
                .collect();
            snapshot.timeline_rebuilt_at = Some(at);
        }
        if generate_questions {
            snapshot.questions = evidence
                .iter()
                .filter(|stored| stored.item.high_signal)
                .map(|stored| format!("What does \"{}\" change about current tracking?", stored.item.title))
                .collect();
            snapshot.questions_generated_at = Some(at);
        }

        let raw = serde_json::to_vec(&snapshot).map_err(StorageError::data)?;
        self.notebooks
            .insert(actor_id.as_bytes(), raw)
            .map_err(StorageError::io)?;
        Ok(snapshot)
    }
}

impl EvidenceSink for SledEvidenceStore {
    fn store(&self, actor_id: &str, item: &EvidenceItem) -> Result<bool, SchedulerError> {
        let mut key = actor_id.as_bytes().to_vec();
        key.push(KEY_SEP);
        key.extend_from_slice(item.source_url.as_bytes());

        let value = serde_json::to_vec(&StoredEvidence {
            item: item.clone(),
            stored_at: now(),
        })
        .map_err(StorageError::data)?;
        let swapped = self
            .evidence
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))
            .map_err(StorageError::io)?;
        Ok(swapped.is_ok())
    }
}

#[async_trait]
impl NotebookBuilder for SledEvidenceStore {
    async fn rebuild_deterministic(
        &self,
        actor_id: &str,
        generate_questions: bool,
        rebuild_timeline: bool,
    ) -> Result<(), SchedulerError> {
        self.rebuild(actor_id, generate_questions, rebuild_timeline)
            .map_err(|e| SchedulerError::BuildFailed(e.to_string()))?;
        Ok(())
    }
}
