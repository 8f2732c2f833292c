//! CLI route: single route table and run context. Dispatches to the scheduler,
//! the actor store and presentation.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::parse::{ActorCommands, Commands};
use crate::cli::presentation::{
    format_actor_list_json, format_actor_list_text, format_eligible_json, format_eligible_text,
    format_json, format_recovered,
};
use crate::config::{ConfigLoader, RefreshConfig};
use crate::error::{SchedulerError, StorageError};
use crate::pipeline::{FeedCollector, PipelineCollaborators, SledEvidenceStore};
use crate::refresh::{eligible_actors, AutoRefreshDriver, SelectionPolicy};
use crate::scheduler::RefreshScheduler;
use crate::store::ActorRecord;
use crate::types::now;

/// Runtime context for CLI execution: workspace, loaded config and the
/// scheduler over the workspace database.
pub struct RunContext {
    workspace_root: PathBuf,
    config: RefreshConfig,
    scheduler: Arc<RefreshScheduler>,
}

impl RunContext {
    /// Load config, open the database and wire the store-backed collaborators.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, SchedulerError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.ensure_valid()?;

        let db_path = config.storage.resolve_db_path(&workspace_root);
        std::fs::create_dir_all(&db_path).map_err(StorageError::IoError)?;
        let db = sled::open(&db_path).map_err(|e| {
            StorageError::io(format!("Failed to open sled database: {}", e))
        })?;

        let evidence = SledEvidenceStore::shared(&db)?;
        let collaborators = PipelineCollaborators {
            collector: Arc::new(FeedCollector::new(
                Vec::new(),
                evidence.clone(),
                config.interactive.fetch_timeout(),
            )),
            builder: evidence,
            enricher: None,
        };
        let scheduler = Arc::new(RefreshScheduler::open(db, collaborators, &config)?);

        Ok(Self {
            workspace_root,
            config,
            scheduler,
        })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Execute a command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, SchedulerError> {
        match command {
            Commands::Serve { no_auto_refresh } => self.handle_serve(*no_auto_refresh),
            Commands::Actor { command } => self.handle_actor(command),
            Commands::Recover => {
                let recovered = self.scheduler.recover_stale_runs(now())?;
                Ok(format_recovered(&recovered))
            }
            Commands::Eligible { format } => {
                let policy = SelectionPolicy {
                    min_interval_hours: self.config.auto_refresh.min_interval_hours,
                    batch_size: self.config.auto_refresh.batch_size,
                };
                let actors = eligible_actors(self.scheduler.actors().as_ref(), policy, now())?;
                match format.as_str() {
                    "json" => Ok(format_eligible_json(&actors)),
                    _ => Ok(format_eligible_text(&actors)),
                }
            }
            Commands::Timeline { actor_id } => {
                let timeline = self.scheduler.get_refresh_timeline(actor_id)?;
                Ok(format_json(&timeline))
            }
            Commands::Job { actor_id, job_id } => {
                let detail = self
                    .scheduler
                    .get_job(actor_id, job_id)?
                    .ok_or_else(|| StorageError::JobNotFound(job_id.clone()))?;
                Ok(format_json(&detail))
            }
        }
    }

    fn handle_actor(&self, command: &ActorCommands) -> Result<String, SchedulerError> {
        let actors = self.scheduler.actors();
        match command {
            ActorCommands::Add {
                actor_id,
                name,
                tracked,
            } => {
                let display_name = name.clone().unwrap_or_else(|| actor_id.clone());
                let updated = actors.update(actor_id, &mut |record| {
                    record.display_name = display_name.clone();
                    record.is_tracked = *tracked;
                })?;
                if updated.is_some() {
                    return Ok(format!("Updated actor: {}", actor_id));
                }
                let mut record = ActorRecord::new(actor_id.clone(), display_name, now());
                record.is_tracked = *tracked;
                actors.upsert(&record)?;
                info!(actor_id = %actor_id, tracked = *tracked, "Added actor");
                Ok(format!("Added actor: {}", actor_id))
            }
            ActorCommands::List { format } => {
                let list = actors.list()?;
                match format.as_str() {
                    "json" => Ok(format_actor_list_json(&list)),
                    _ => Ok(format_actor_list_text(&list)),
                }
            }
        }
    }

    fn handle_serve(&self, no_auto_refresh: bool) -> Result<String, SchedulerError> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SchedulerError::RuntimeError(format!("Failed to create runtime: {}", e)))?;

        let auto_refresh = self.config.auto_refresh.enabled && !no_auto_refresh;
        let scheduler = Arc::clone(&self.scheduler);
        rt.block_on(async {
            scheduler.start()?;
            let driver = auto_refresh.then(|| {
                let driver =
                    AutoRefreshDriver::new(Arc::clone(&scheduler), self.config.auto_refresh.clone());
                tokio::spawn(driver.run(scheduler.shutdown_signal()))
            });
            info!(
                workspace = %self.workspace_root.display(),
                auto_refresh,
                "Serving refresh scheduler"
            );

            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
            }
            scheduler.shutdown().await;
            if let Some(handle) = driver {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Auto-refresh driver ended abnormally");
                }
            }
            Ok::<(), SchedulerError>(())
        })?;

        let stats = self.scheduler.stats();
        Ok(format!(
            "Scheduler stopped. completed={} failed={} skipped={} pending={}",
            stats.completed, stats.failed, stats.skipped, stats.build_pending
        ))
    }
}
