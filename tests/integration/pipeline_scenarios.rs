//! Generation pipeline scenarios: budgets, skip-heavy, enrichment hand-off,
//! failure handling and guard release.

use notebook_refresh::journal::STALE_JOB_ERROR;
use notebook_refresh::pipeline::{
    EnrichmentOutcome, GenerationOutcome, ImportMode, MSG_ENRICHED, MSG_ENRICHMENT_DEGRADED,
    MSG_ENRICHMENT_PENDING,
};
use notebook_refresh::queue::{BuildEntry, EnrichmentEntry};
use notebook_refresh::store::ActorStore;
use notebook_refresh::types::{
    now, AutoRefreshStatus, JobStatus, NotebookStatus, PhaseKey, PhaseStatus, TriggerType,
};

use crate::integration::test_utils::{CollectBehavior, PipelineHarness, ScriptedEnricher};

fn queued_entry(harness: &PipelineHarness, actor_id: &str, trigger: TriggerType) -> BuildEntry {
    let job = harness
        .journal
        .create_job(actor_id, trigger, JobStatus::Queued, now())
        .unwrap();
    BuildEntry {
        priority: trigger.priority(),
        sequence: 0,
        actor_id: actor_id.to_string(),
        trigger,
        job_id: job.id,
    }
}

#[tokio::test]
async fn manual_refresh_uses_interactive_budget() {
    let harness = PipelineHarness::new(CollectBehavior::Import(2), None);
    harness.add_actor("apt28");
    let entry = queued_entry(&harness, "apt28", TriggerType::ManualRefresh);

    harness.pipeline.run_generation(&entry).await;

    let budgets = harness.collector.budgets.lock();
    assert_eq!(budgets.len(), 1);
    let budget = &budgets[0].1;
    assert_eq!(budget.mode, ImportMode::Interactive);
    assert_eq!(budget.max_seconds, Some(22));
    assert_eq!(budget.high_signal_target, Some(2));
}

#[tokio::test]
async fn auto_refresh_uses_background_budget() {
    let harness = PipelineHarness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let entry = queued_entry(&harness, "apt28", TriggerType::AutoRefresh);

    harness.pipeline.run_generation(&entry).await;

    let budgets = harness.collector.budgets.lock();
    let json = serde_json::to_value(&budgets[0].1).unwrap();
    assert_eq!(json["import_mode"], "background");
    assert!(json.get("max_seconds").is_none());
}

#[tokio::test]
async fn enrichment_hand_off_keeps_status_running() {
    let enricher = ScriptedEnricher::new(&[]);
    let harness = PipelineHarness::new(CollectBehavior::Import(3), Some(enricher));
    harness.add_actor("apt29");
    let entry = queued_entry(&harness, "apt29", TriggerType::ManualRefresh);

    let outcome = harness.pipeline.run_generation(&entry).await;

    assert_eq!(
        outcome,
        GenerationOutcome::Completed {
            imported: 3,
            skip_heavy: false,
            enrichment_queued: true,
        }
    );
    let record = harness.actors.get("apt29").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Running);
    assert_eq!(record.notebook_message, MSG_ENRICHMENT_PENDING);
    assert_eq!(harness.enrichment_queue.depth(), 1);
    let queued = harness.enrichment_queue.try_pop().unwrap();
    assert_eq!(queued.actor_id, "apt29");
    assert_eq!(queued.job_id, entry.job_id);

    let job = harness.journal.get_job(&entry.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.imported_sources, 3);
}

#[tokio::test]
async fn without_enrichment_notebook_is_ready() {
    let harness = PipelineHarness::new(CollectBehavior::Import(2), None);
    harness.add_actor("fin7");
    let entry = queued_entry(&harness, "fin7", TriggerType::ManualRefresh);

    harness.pipeline.run_generation(&entry).await;

    let record = harness.actors.get("fin7").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Ready);
    assert_eq!(record.last_refresh_sources_processed, Some(2));
    assert_eq!(harness.enrichment_queue.depth(), 0);
    assert_eq!(
        *harness.builder.calls.lock(),
        vec![
            ("fin7".to_string(), false, true),
            ("fin7".to_string(), true, false),
        ]
    );
}

#[tokio::test]
async fn auto_refresh_without_new_sources_skips_heavy_work() {
    let enricher = ScriptedEnricher::new(&[]);
    let harness = PipelineHarness::new(CollectBehavior::Import(0), Some(enricher));
    harness.add_actor("lazarus");
    let entry = queued_entry(&harness, "lazarus", TriggerType::AutoRefresh);

    let outcome = harness.pipeline.run_generation(&entry).await;

    assert_eq!(
        outcome,
        GenerationOutcome::Completed {
            imported: 0,
            skip_heavy: true,
            enrichment_queued: false,
        }
    );
    assert_eq!(
        *harness.builder.calls.lock(),
        vec![("lazarus".to_string(), false, false)]
    );
    assert_eq!(harness.enrichment_queue.depth(), 0);
    let record = harness.actors.get("lazarus").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Ready);
    assert_eq!(
        record.auto_refresh_last_status,
        Some(AutoRefreshStatus::Completed)
    );
}

#[tokio::test]
async fn manual_refresh_without_new_sources_still_rebuilds() {
    let harness = PipelineHarness::new(CollectBehavior::Import(0), None);
    harness.add_actor("apt41");
    let entry = queued_entry(&harness, "apt41", TriggerType::ManualRefresh);

    harness.pipeline.run_generation(&entry).await;

    assert_eq!(harness.builder.calls.lock().len(), 2);
}

#[tokio::test]
async fn phases_are_journaled_in_order() {
    let harness = PipelineHarness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let entry = queued_entry(&harness, "apt28", TriggerType::PageLoad);

    harness.pipeline.run_generation(&entry).await;

    let phases = harness.journal.phases_for_job(&entry.job_id).unwrap();
    let keys: Vec<PhaseKey> = phases.iter().map(|p| p.phase_key).collect();
    assert_eq!(keys, vec![PhaseKey::SourceCollection, PhaseKey::DeterministicBuild]);
    assert!(phases.iter().all(|p| p.status == PhaseStatus::Completed));
    assert!(phases.iter().all(|p| p.finished_at.is_some()));
}

#[tokio::test]
async fn collection_failure_marks_job_error_and_releases_guard() {
    let harness = PipelineHarness::new(CollectBehavior::Fail, None);
    harness.add_actor("sandworm");
    let entry = queued_entry(&harness, "sandworm", TriggerType::AutoRefresh);

    let outcome = harness.pipeline.run_generation(&entry).await;

    assert!(matches!(outcome, GenerationOutcome::Failed { .. }));
    assert!(!harness.guards.generation.is_running("sandworm"));

    let job = harness.journal.get_job(&entry.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error_message.contains("feed backend unavailable"));

    let phases = harness.journal.phases_for_job(&entry.job_id).unwrap();
    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].status, PhaseStatus::Error);

    let record = harness.actors.get("sandworm").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Error);
    assert!(record.notebook_message.starts_with("Notebook generation failed"));
    assert_eq!(record.auto_refresh_last_status, Some(AutoRefreshStatus::Error));
}

#[tokio::test]
async fn collector_panic_is_contained_and_releases_guard() {
    let harness = PipelineHarness::new(CollectBehavior::Panic, None);
    harness.add_actor("turla");
    let entry = queued_entry(&harness, "turla", TriggerType::ManualRefresh);

    let outcome = harness.pipeline.run_generation(&entry).await;

    match outcome {
        GenerationOutcome::Failed { error } => assert!(error.contains("collector exploded")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!harness.guards.generation.is_running("turla"));

    // The phase opened before the panic is closed by its scope.
    let phases = harness.journal.phases_for_job(&entry.job_id).unwrap();
    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].status, PhaseStatus::Error);
    assert!(phases[0].finished_at.is_some());

    let job = harness.journal.get_job(&entry.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
}

#[tokio::test]
async fn busy_actor_job_is_skipped() {
    let harness = PipelineHarness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let entry = queued_entry(&harness, "apt28", TriggerType::ManualRefresh);

    let permit = harness.guards.generation.try_start("apt28").unwrap();
    let outcome = harness.pipeline.run_generation(&entry).await;
    drop(permit);

    assert!(matches!(outcome, GenerationOutcome::Skipped { .. }));
    assert!(harness.collector.budgets.lock().is_empty());
    let job = harness.journal.get_job(&entry.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Skipped);
}

#[tokio::test]
async fn expired_job_is_not_run() {
    let harness = PipelineHarness::new(CollectBehavior::Import(1), None);
    harness.add_actor("apt28");
    let entry = queued_entry(&harness, "apt28", TriggerType::ManualRefresh);
    let later = now() + chrono::Duration::hours(2);
    harness
        .journal
        .expire_stale_generation_jobs_for_actor("apt28", 30, later)
        .unwrap();

    let outcome = harness.pipeline.run_generation(&entry).await;

    assert!(matches!(outcome, GenerationOutcome::Skipped { .. }));
    assert!(harness.collector.budgets.lock().is_empty());
    let job = harness.journal.get_job(&entry.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_message, STALE_JOB_ERROR);
}

#[tokio::test]
async fn degraded_enrichment_retries_then_succeeds() {
    let enricher = ScriptedEnricher::new(&[true]);
    let harness = PipelineHarness::new(CollectBehavior::Import(3), Some(enricher.clone()));
    harness.add_actor("apt29");
    let entry = queued_entry(&harness, "apt29", TriggerType::ManualRefresh);
    harness.pipeline.run_generation(&entry).await;
    let queued: EnrichmentEntry = harness.enrichment_queue.try_pop().unwrap();

    let outcome = harness.pipeline.run_enrichment(&queued).await;

    assert_eq!(outcome, EnrichmentOutcome::Enriched { attempts: 2 });
    assert_eq!(*enricher.calls.lock(), 2);
    let record = harness.actors.get("apt29").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Ready);
    assert_eq!(record.notebook_message, MSG_ENRICHED);

    let attempts: Vec<(u32, PhaseStatus)> = harness
        .journal
        .phases_for_job(&entry.job_id)
        .unwrap()
        .into_iter()
        .filter(|p| p.phase_key == PhaseKey::LlmEnrichment)
        .map(|p| (p.attempt, p.status))
        .collect();
    assert_eq!(
        attempts,
        vec![(1, PhaseStatus::Error), (2, PhaseStatus::Completed)]
    );
    assert!(!harness.guards.enrichment.is_running("apt29"));
}

#[tokio::test]
async fn exhausted_enrichment_downgrades_to_ready() {
    let enricher = ScriptedEnricher::new(&[true, true, true]);
    let harness = PipelineHarness::new(CollectBehavior::Import(3), Some(enricher.clone()));
    harness.add_actor("apt29");
    let entry = queued_entry(&harness, "apt29", TriggerType::ManualRefresh);
    harness.pipeline.run_generation(&entry).await;
    let queued = harness.enrichment_queue.try_pop().unwrap();

    let outcome = harness.pipeline.run_enrichment(&queued).await;

    assert_eq!(outcome, EnrichmentOutcome::Degraded { attempts: 2 });
    assert_eq!(*enricher.calls.lock(), 2);
    let record = harness.actors.get("apt29").unwrap().unwrap();
    assert_eq!(record.notebook_status, NotebookStatus::Ready);
    assert_eq!(record.notebook_message, MSG_ENRICHMENT_DEGRADED);
}
