//! Notebook build queue.

use std::collections::HashSet;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::debug;

use super::priority::{next_sequence, PriorityQueue};
use super::pop_or_shutdown;
use crate::types::TriggerType;

/// One waiting build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEntry {
    pub priority: u8,
    pub sequence: u64,
    pub actor_id: String,
    pub trigger: TriggerType,
    pub job_id: String,
}

#[derive(Default)]
struct BuildState {
    pending: PriorityQueue<BuildEntry>,
    enqueued: HashSet<String>,
}

/// Priority queue of builds with per-actor submission dedup.
#[derive(Default)]
pub struct BuildQueue {
    state: Mutex<BuildState>,
    notify: Notify,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a build. Returns `false`, leaving the queue untouched, when the
    /// actor already has a build waiting.
    pub fn enqueue_build(
        &self,
        actor_id: &str,
        trigger: TriggerType,
        job_id: &str,
        priority: u8,
    ) -> bool {
        let (sequence, depth) = {
            let mut state = self.state.lock();
            if !state.enqueued.insert(actor_id.to_string()) {
                debug!(actor_id, job_id, "Build already waiting, enqueue ignored");
                return false;
            }
            let sequence = next_sequence();
            state.pending.push_with_sequence(
                priority,
                sequence,
                BuildEntry {
                    priority,
                    sequence,
                    actor_id: actor_id.to_string(),
                    trigger,
                    job_id: job_id.to_string(),
                },
            );
            (sequence, state.pending.len())
        };
        self.notify.notify_one();

        debug!(
            actor_id,
            job_id,
            trigger = %trigger,
            priority,
            sequence,
            queue_depth = depth,
            "Enqueued build"
        );
        true
    }

    /// Job id of the actor's waiting build, if any.
    pub fn waiting_job(&self, actor_id: &str) -> Option<String> {
        self.state
            .lock()
            .pending
            .iter()
            .find(|entry| entry.actor_id == actor_id)
            .map(|entry| entry.job_id.clone())
    }

    /// Swap the actor's waiting build for a new job, with the new trigger's
    /// priority and a fresh sequence. Only replaces while the waiting entry
    /// still carries `stale_job_id`; returns `false` otherwise.
    pub fn replace_build(
        &self,
        actor_id: &str,
        stale_job_id: &str,
        trigger: TriggerType,
        job_id: &str,
        priority: u8,
    ) -> bool {
        let sequence = {
            let mut state = self.state.lock();
            let waiting = state
                .pending
                .iter()
                .any(|entry| entry.actor_id == actor_id && entry.job_id == stale_job_id);
            if !waiting {
                return false;
            }
            state
                .pending
                .retain(|entry| !(entry.actor_id == actor_id && entry.job_id == stale_job_id));
            let sequence = next_sequence();
            state.pending.push_with_sequence(
                priority,
                sequence,
                BuildEntry {
                    priority,
                    sequence,
                    actor_id: actor_id.to_string(),
                    trigger,
                    job_id: job_id.to_string(),
                },
            );
            state.enqueued.insert(actor_id.to_string());
            sequence
        };
        self.notify.notify_one();

        debug!(
            actor_id,
            stale_job_id,
            job_id,
            trigger = %trigger,
            priority,
            sequence,
            "Replaced waiting build"
        );
        true
    }

    /// Pop the lowest `(priority, sequence)` entry and release its dedup slot.
    pub fn try_pop(&self) -> Option<BuildEntry> {
        let mut state = self.state.lock();
        let (_, _, entry) = state.pending.pop()?;
        state.enqueued.remove(&entry.actor_id);
        Some(entry)
    }

    /// Wait for the next build, or `None` once shutdown is signalled.
    pub async fn next(&self, shutdown: &mut watch::Receiver<bool>) -> Option<BuildEntry> {
        pop_or_shutdown(&self.notify, shutdown, || self.try_pop()).await
    }

    pub fn depth(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_enqueued(&self, actor_id: &str) -> bool {
        self.state.lock().enqueued.contains(actor_id)
    }

    /// Actors with a build waiting.
    pub fn enqueued_actors(&self) -> HashSet<String> {
        self.state.lock().enqueued.clone()
    }
}
