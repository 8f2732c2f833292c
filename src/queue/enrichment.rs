//! Enrichment queue: plain FIFO with per-actor dedup.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::debug;

use super::pop_or_shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentEntry {
    pub actor_id: String,
    pub job_id: String,
}

#[derive(Default)]
struct EnrichmentState {
    pending: VecDeque<EnrichmentEntry>,
    enqueued: HashSet<String>,
}

#[derive(Default)]
pub struct EnrichmentQueue {
    state: Mutex<EnrichmentState>,
    notify: Notify,
}

impl EnrichmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same dedup contract as the build queue, without priorities.
    pub fn enqueue_enrichment(&self, actor_id: &str, job_id: &str) -> bool {
        let depth = {
            let mut state = self.state.lock();
            if !state.enqueued.insert(actor_id.to_string()) {
                debug!(actor_id, job_id, "Enrichment already waiting, enqueue ignored");
                return false;
            }
            state.pending.push_back(EnrichmentEntry {
                actor_id: actor_id.to_string(),
                job_id: job_id.to_string(),
            });
            state.pending.len()
        };
        self.notify.notify_one();
        debug!(actor_id, job_id, queue_depth = depth, "Enqueued enrichment");
        true
    }

    pub fn try_pop(&self) -> Option<EnrichmentEntry> {
        let mut state = self.state.lock();
        let entry = state.pending.pop_front()?;
        state.enqueued.remove(&entry.actor_id);
        Some(entry)
    }

    pub async fn next(&self, shutdown: &mut watch::Receiver<bool>) -> Option<EnrichmentEntry> {
        pop_or_shutdown(&self.notify, shutdown, || self.try_pop()).await
    }

    pub fn depth(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_enqueued(&self, actor_id: &str) -> bool {
        self.state.lock().enqueued.contains(actor_id)
    }

    /// Actors with an enrichment waiting.
    pub fn enqueued_actors(&self) -> HashSet<String> {
        self.state.lock().enqueued.clone()
    }
}
