//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("auto_refresh.enabled", true)?
        .set_default("auto_refresh.min_interval_hours", 24i64)?
        .set_default("auto_refresh.loop_seconds", 300i64)?
        .set_default("auto_refresh.batch_size", 3i64)?
        .set_default("recovery.stale_recovery_minutes", 10i64)?
        .set_default("recovery.generation_job_stale_minutes", 30i64)?
        .set_default("storage.db_path", ".notebook-refresh/db")
}
