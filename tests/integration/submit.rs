//! Submission semantics: idempotency, stale-job expiry and read models.

use chrono::Duration;
use notebook_refresh::error::{SchedulerError, StorageError};
use notebook_refresh::journal::STALE_JOB_ERROR;
use notebook_refresh::pipeline::MSG_ALREADY_RUNNING;
use notebook_refresh::scheduler::MSG_REFRESH_QUEUED;
use notebook_refresh::store::ActorStore;
use notebook_refresh::types::{now, JobStatus, NotebookStatus, TriggerType};

use crate::integration::test_utils::{CollectBehavior, Harness};

#[test]
fn second_submit_returns_the_waiting_job() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");

    let first = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();
    let second = harness
        .scheduler
        .submit("apt28", TriggerType::PageLoad)
        .unwrap();

    assert!(first.queued);
    assert_eq!(first.status, JobStatus::Queued);
    assert!(!second.queued);
    assert_eq!(second.job_id, first.job_id);
    assert_eq!(second.message, MSG_ALREADY_RUNNING);
    assert_eq!(harness.scheduler.build_queue().depth(), 1);
    assert_eq!(
        harness.scheduler.journal().jobs_for_actor("apt28").unwrap().len(),
        1
    );
}

#[test]
fn submit_marks_actor_running() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");

    harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    let record = harness.actors().get("apt28").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Running);
    assert_eq!(record.notebook_message, MSG_REFRESH_QUEUED);
}

#[test]
fn unknown_actor_is_rejected() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    let err = harness
        .scheduler
        .submit("nobody", TriggerType::ManualRefresh)
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::StorageError(StorageError::ActorNotFound(_))
    ));
}

#[test]
fn stale_active_job_does_not_block_new_submission() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let journal = harness.scheduler.journal();
    let crashed = journal
        .create_job(
            "apt28",
            TriggerType::ManualRefresh,
            JobStatus::Running,
            now() - Duration::hours(3),
        )
        .unwrap();

    let response = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    assert!(response.queued);
    assert_ne!(response.job_id, crashed.id);
    let crashed = journal.get_job(&crashed.id).unwrap().unwrap();
    assert_eq!(crashed.status, JobStatus::Error);
    assert_eq!(crashed.error_message, STALE_JOB_ERROR);
}

#[test]
fn get_job_is_scoped_to_the_actor() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    harness.add_actor("apt29");
    let response = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    let detail = harness
        .scheduler
        .get_job("apt28", &response.job_id)
        .unwrap()
        .unwrap();
    assert_eq!(detail.job.id, response.job_id);
    assert!(detail.phases.is_empty());
    assert!(harness
        .scheduler
        .get_job("apt29", &response.job_id)
        .unwrap()
        .is_none());
}

#[test]
fn timeline_of_waiting_job_has_no_eta_without_history() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    let timeline = harness.scheduler.get_refresh_timeline("apt28").unwrap();
    assert_eq!(timeline.recent_runs.len(), 1);
    assert_eq!(timeline.avg_duration_ms, None);
    assert_eq!(timeline.eta_seconds, None);
    assert_eq!(timeline.queue_depths.build_pending, 1);
}

#[test]
fn expired_waiting_build_is_replaced_by_new_submission() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let first = harness
        .scheduler
        .submit("apt28", TriggerType::AutoRefresh)
        .unwrap();
    let expired = harness
        .scheduler
        .journal()
        .expire_stale_generation_jobs_for_actor("apt28", 30, now() + Duration::hours(1))
        .unwrap();
    assert_eq!(expired, 1);

    let second = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    assert!(second.queued);
    assert_eq!(second.status, JobStatus::Queued);
    assert_ne!(second.job_id, first.job_id);
    let queue = harness.scheduler.build_queue();
    assert_eq!(queue.depth(), 1);
    let head = queue.try_pop().unwrap();
    assert_eq!(head.job_id, second.job_id);
    assert_eq!(head.priority, TriggerType::ManualRefresh.priority());
    assert_eq!(head.trigger, TriggerType::ManualRefresh);
}
