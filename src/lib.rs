//! notebook-refresh: generation job scheduler for threat-actor notebooks.
//!
//! Decides which actor's notebook is rebuilt and when, runs the multi-phase
//! generation pipeline with at most one build and one enrichment in flight
//! per actor, journals every job and phase, and reconciles state left behind
//! by crashes.

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod journal;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod recovery;
pub mod refresh;
pub mod scheduler;
pub mod store;
pub mod types;
