//! Per-actor execution guards.
//!
//! An actor id sits in a guard's running set only while a [`RunPermit`] for it
//! is alive. Dropping the permit removes the id, so every exit path out of a
//! run (normal return, error, panic unwinding) releases the actor.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// In-memory "who is running right now" set for one kind of work.
#[derive(Debug)]
pub struct ExecutionGuard {
    name: &'static str,
    running: Mutex<HashSet<String>>,
}

impl ExecutionGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn shared(name: &'static str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Claim the actor. Returns `None` when it is already running.
    pub fn try_start(self: &Arc<Self>, actor_id: &str) -> Option<RunPermit> {
        if !self.mark_started(actor_id) {
            debug!(guard = self.name, actor_id, "Actor already running");
            return None;
        }
        Some(RunPermit {
            guard: Arc::clone(self),
            actor_id: actor_id.to_string(),
        })
    }

    pub fn is_running(&self, actor_id: &str) -> bool {
        self.running.lock().contains(actor_id)
    }

    /// Copy of the running set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.running.lock().clone()
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    fn mark_started(&self, actor_id: &str) -> bool {
        self.running.lock().insert(actor_id.to_string())
    }

    fn mark_finished(&self, actor_id: &str) {
        self.running.lock().remove(actor_id);
    }
}

/// Proof that an actor was claimed; releases it on drop.
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<ExecutionGuard>,
    actor_id: String,
}

impl RunPermit {
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.mark_finished(&self.actor_id);
    }
}

/// The two guards used by the scheduler: one per queue.
#[derive(Debug, Clone)]
pub struct ActorExecutionGuard {
    pub generation: Arc<ExecutionGuard>,
    pub enrichment: Arc<ExecutionGuard>,
}

impl ActorExecutionGuard {
    pub fn new() -> Self {
        Self {
            generation: ExecutionGuard::shared("generation"),
            enrichment: ExecutionGuard::shared("llm_enrichment"),
        }
    }
}

impl Default for ActorExecutionGuard {
    fn default() -> Self {
        Self::new()
    }
}
