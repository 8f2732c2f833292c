//! End-to-end runs through the worker tasks.

use std::time::Duration;

use notebook_refresh::pipeline::MSG_ENRICHMENT_DEGRADED;
use notebook_refresh::store::ActorStore;
use notebook_refresh::types::{JobStatus, NotebookStatus, TriggerType};

use crate::integration::test_utils::{wait_until, CollectBehavior, Harness, ScriptedEnricher};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_job_runs_to_ready() {
    let harness = Harness::new(CollectBehavior::Import(2), None);
    harness.add_actor("apt28");
    harness.scheduler.start().unwrap();

    let response = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();

    let journal = harness.scheduler.journal().clone();
    let job_id = response.job_id.clone();
    assert!(
        wait_until(WAIT, || {
            journal
                .get_job(&job_id)
                .unwrap()
                .map(|job| job.status == JobStatus::Completed)
                .unwrap_or(false)
        })
        .await
    );
    let job = journal.get_job(&response.job_id).unwrap().unwrap();
    assert!(job.started_at.is_some());
    assert_eq!(job.imported_sources, 2);
    let record = harness.actors().get("apt28").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Ready);

    harness.scheduler.shutdown().await;
    let stats = harness.scheduler.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.build_running, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enrichment_worker_finishes_degraded_notebook() {
    let enricher = ScriptedEnricher::new(&[true, true]);
    let harness = Harness::new(CollectBehavior::Import(4), Some(enricher.clone()));
    harness.add_actor("apt29");
    harness.scheduler.start().unwrap();

    harness
        .scheduler
        .submit("apt29", TriggerType::ManualRefresh)
        .unwrap();

    let actors = harness.actors().clone();
    assert!(
        wait_until(WAIT, || {
            actors
                .get("apt29")
                .unwrap()
                .map(|a| a.notebook_status == NotebookStatus::Ready)
                .unwrap_or(false)
        })
        .await
    );
    let record = actors.get("apt29").unwrap().unwrap();
    assert_eq!(record.notebook_message, MSG_ENRICHMENT_DEGRADED);
    assert_eq!(*enricher.calls.lock(), 2);

    harness.scheduler.shutdown().await;
    let stats = harness.scheduler.stats();
    assert_eq!(stats.enrichment_degraded, 1);
    assert_eq!(stats.enrichment_running, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_run_does_not_block_the_next_refresh() {
    let harness = Harness::new(CollectBehavior::Fail, None);
    harness.add_actor("sandworm");
    harness.scheduler.start().unwrap();

    let first = harness
        .scheduler
        .submit("sandworm", TriggerType::ManualRefresh)
        .unwrap();
    let journal = harness.scheduler.journal().clone();
    let guard = harness.scheduler.guards().generation.clone();
    let first_id = first.job_id.clone();
    assert!(
        wait_until(WAIT, || {
            let failed = journal
                .get_job(&first_id)
                .unwrap()
                .map(|job| job.status == JobStatus::Error)
                .unwrap_or(false);
            failed && !guard.is_running("sandworm")
        })
        .await
    );

    let second = harness
        .scheduler
        .submit("sandworm", TriggerType::ManualRefresh)
        .unwrap();
    assert!(second.queued);
    assert_ne!(second.job_id, first.job_id);

    harness.scheduler.shutdown().await;
}

#[tokio::test]
async fn shutdown_leaves_waiting_work_untouched() {
    let harness = Harness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    harness.scheduler.start().unwrap();
    harness.scheduler.shutdown().await;

    let response = harness
        .scheduler
        .submit("apt28", TriggerType::ManualRefresh)
        .unwrap();
    assert!(response.queued);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.scheduler.build_queue().depth(), 1);
    assert!(harness.scheduler.start().is_err());
}
