//! Refresh scheduler: submission, worker lifecycle and read models.

mod service;
mod stats;
mod timeline;
mod worker;

pub use service::{RefreshScheduler, SubmitResponse, MSG_JOB_QUEUED, MSG_REFRESH_QUEUED};
pub use stats::SchedulerStats;
pub use timeline::{QueueDepths, RefreshTimeline, TIMELINE_RUN_LIMIT};
