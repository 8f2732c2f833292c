//! Auto-refresh driver: batch claiming, ordering and shutdown.

use std::time::Duration as StdDuration;

use chrono::Duration;
use notebook_refresh::refresh::{eligible_actors, AutoRefreshDriver};
use notebook_refresh::store::{ActorRecord, ActorStore};
use notebook_refresh::types::{now, AutoRefreshStatus, JobStatus, TriggerType};

use crate::integration::test_utils::{test_config, wait_until, CollectBehavior, Harness};

fn harness_with_batch(batch_size: usize) -> Harness {
    let mut config = test_config();
    config.auto_refresh.batch_size = batch_size;
    config.auto_refresh.min_interval_hours = 24;
    Harness::with_config(CollectBehavior::Import(0), None, config)
}

fn driver(harness: &Harness) -> AutoRefreshDriver {
    let mut config = test_config().auto_refresh;
    config.batch_size = 3;
    config.min_interval_hours = 24;
    AutoRefreshDriver::new(harness.scheduler.clone(), config)
}

/// Five tracked actors created an hour apart, `a0` oldest.
fn seed_five(harness: &Harness) {
    let base = now() - Duration::days(3);
    for i in 0..5 {
        let record = ActorRecord::new(format!("a{i}"), format!("Actor {i}"), base + Duration::hours(i))
            .tracked();
        harness.actors().upsert(&record).unwrap();
    }
}

#[test]
fn one_tick_queues_one_batch_oldest_first() {
    let harness = harness_with_batch(3);
    seed_five(&harness);

    let run = driver(&harness).run_once_at(now()).unwrap();

    assert_eq!(run.queued, vec!["a0", "a1", "a2"]);
    assert!(run.recovered.is_empty());
    assert_eq!(harness.scheduler.build_queue().depth(), 3);
    for id in ["a0", "a1", "a2"] {
        let record = harness.actors().get(id).unwrap().unwrap();
        assert_eq!(record.auto_refresh_last_status, Some(AutoRefreshStatus::Queued));
        assert!(record.auto_refresh_last_run_at.is_some());
    }
    let untouched = harness.actors().get("a3").unwrap().unwrap();
    assert_eq!(untouched.auto_refresh_last_status, None);
}

#[test]
fn claimed_actors_are_not_selected_again() {
    let harness = harness_with_batch(3);
    seed_five(&harness);
    let driver = driver(&harness);

    let at = now();
    driver.run_once_at(at).unwrap();
    let second = driver.run_once_at(at + Duration::minutes(1)).unwrap();

    assert_eq!(second.queued, vec!["a3", "a4"]);
    let policy = driver.policy();
    assert!(eligible_actors(harness.actors().as_ref(), policy, at + Duration::minutes(2))
        .unwrap()
        .is_empty());
}

#[test]
fn untracked_actors_are_ignored() {
    let harness = harness_with_batch(3);
    harness
        .actors()
        .upsert(&ActorRecord::new("watchlist", "Watchlist", now() - Duration::days(9)))
        .unwrap();

    let run = driver(&harness).run_once_at(now()).unwrap();
    assert!(run.queued.is_empty());
}

#[test]
fn actor_with_active_job_is_reported_as_reused() {
    let harness = harness_with_batch(3);
    harness.add_actor("apt28");
    let active = harness
        .scheduler
        .journal()
        .create_job("apt28", TriggerType::PageLoad, JobStatus::Queued, now())
        .unwrap();

    let run = driver(&harness).run_once_at(now()).unwrap();

    assert!(run.queued.is_empty());
    assert_eq!(run.reused, vec!["apt28"]);
    let jobs = harness.scheduler.journal().jobs_for_actor("apt28").unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, active.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auto_run_records_completion_on_the_actor() {
    let harness = harness_with_batch(3);
    harness.add_actor("apt28");
    harness.scheduler.start().unwrap();

    let run = driver(&harness).run_once_at(now()).unwrap();
    assert_eq!(run.queued, vec!["apt28"]);

    let actors = harness.actors().clone();
    assert!(
        wait_until(StdDuration::from_secs(5), || {
            actors
                .get("apt28")
                .unwrap()
                .and_then(|a| a.auto_refresh_last_status)
                == Some(AutoRefreshStatus::Completed)
        })
        .await
    );
    // Nothing was imported, so the heavy rebuild was skipped.
    assert_eq!(harness.builder.calls.lock().len(), 1);
    harness.scheduler.shutdown().await;

    let jobs = harness.scheduler.journal().jobs_for_actor("apt28").unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
}

#[tokio::test]
async fn driver_loop_stops_on_shutdown() {
    let harness = harness_with_batch(3);
    harness.add_actor("apt28");
    let task = tokio::spawn(driver(&harness).run(harness.scheduler.shutdown_signal()));

    let actors = harness.actors().clone();
    assert!(
        wait_until(StdDuration::from_secs(5), || {
            actors
                .get("apt28")
                .unwrap()
                .map(|a| a.auto_refresh_last_run_at.is_some())
                .unwrap_or(false)
        })
        .await
    );
    harness.scheduler.shutdown().await;

    tokio::time::timeout(StdDuration::from_secs(5), task)
        .await
        .expect("driver did not stop")
        .unwrap();
}
