//! Configuration System
//!
//! Layered configuration for the refresh scheduler: built-in defaults, the
//! global config file, workspace config files, then the flat environment
//! variables operators already use. Every load ends with [`RefreshConfig::normalized`],
//! so out-of-range values are clamped rather than rejected.

use crate::error::SchedulerError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::env_vars::{apply_env_overrides, apply_env_overrides_from};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub auto_refresh: AutoRefreshConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub interactive: InteractiveBudgetConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Periodic auto-refresh driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoRefreshConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum hours between automatic refreshes of one actor (>= 1)
    #[serde(default = "default_min_interval_hours")]
    pub min_interval_hours: u64,

    /// Seconds between driver iterations (>= 30)
    #[serde(default = "default_loop_seconds")]
    pub loop_seconds: u64,

    /// Actors queued per iteration (>= 1)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Stale state reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Age after which a `running` actor absent from the guard is recovered (>= 5)
    #[serde(default = "default_stale_recovery_minutes")]
    pub stale_recovery_minutes: u64,

    /// Age after which a queued/running journal job is expired on submit (>= 10)
    #[serde(default = "default_generation_job_stale_minutes")]
    pub generation_job_stale_minutes: u64,
}

/// Budget for interactive source collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveBudgetConfig {
    /// Wall-clock budget in seconds (>= 10)
    #[serde(default = "default_interactive_max_seconds")]
    pub max_seconds: u64,

    /// Stop early once this many high-signal items were stored (>= 1)
    #[serde(default = "default_high_signal_target")]
    pub high_signal_target: u32,

    /// Per-fetch timeout in seconds (>= 1)
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

/// Enrichment retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts before accepting degraded output (>= 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep between attempts (>= 0)
    #[serde(default = "default_retry_sleep_seconds")]
    pub retry_sleep_seconds: f64,
}

/// Storage paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory, relative to the workspace root unless absolute
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_min_interval_hours() -> u64 {
    24
}

fn default_loop_seconds() -> u64 {
    300
}

fn default_batch_size() -> usize {
    3
}

fn default_stale_recovery_minutes() -> u64 {
    10
}

fn default_generation_job_stale_minutes() -> u64 {
    30
}

fn default_interactive_max_seconds() -> u64 {
    22
}

fn default_high_signal_target() -> u32 {
    2
}

fn default_fetch_timeout_seconds() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_sleep_seconds() -> f64 {
    2.0
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".notebook-refresh/db")
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_hours: default_min_interval_hours(),
            loop_seconds: default_loop_seconds(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stale_recovery_minutes: default_stale_recovery_minutes(),
            generation_job_stale_minutes: default_generation_job_stale_minutes(),
        }
    }
}

impl Default for InteractiveBudgetConfig {
    fn default() -> Self {
        Self {
            max_seconds: default_interactive_max_seconds(),
            high_signal_target: default_high_signal_target(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_sleep_seconds: default_retry_sleep_seconds(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Resolve the database path against the workspace root.
    pub fn resolve_db_path(&self, workspace_root: &Path) -> PathBuf {
        if self.db_path.is_absolute() {
            self.db_path.clone()
        } else {
            workspace_root.join(&self.db_path)
        }
    }
}

impl EnrichmentConfig {
    pub fn retry_sleep(&self) -> Duration {
        Duration::from_secs_f64(self.retry_sleep_seconds.max(0.0))
    }
}

impl InteractiveBudgetConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RefreshConfig {
    /// Clamp every tunable into its supported range.
    pub fn normalized(mut self) -> Self {
        let auto = &mut self.auto_refresh;
        auto.min_interval_hours = auto.min_interval_hours.max(1);
        auto.loop_seconds = auto.loop_seconds.max(30);
        auto.batch_size = auto.batch_size.max(1);

        let recovery = &mut self.recovery;
        recovery.stale_recovery_minutes = recovery.stale_recovery_minutes.max(5);
        recovery.generation_job_stale_minutes = recovery.generation_job_stale_minutes.max(10);

        let interactive = &mut self.interactive;
        interactive.max_seconds = interactive.max_seconds.max(10);
        interactive.high_signal_target = interactive.high_signal_target.max(1);
        interactive.fetch_timeout_seconds = interactive.fetch_timeout_seconds.max(1);

        let enrichment = &mut self.enrichment;
        enrichment.max_attempts = enrichment.max_attempts.max(1);
        if !enrichment.retry_sleep_seconds.is_finite() || enrichment.retry_sleep_seconds < 0.0 {
            enrichment.retry_sleep_seconds = 0.0;
        }

        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.db_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Database path cannot be empty".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Logging(format!(
                "Unknown log format '{}'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold the errors into one [`SchedulerError`].
    pub fn ensure_valid(&self) -> Result<(), SchedulerError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SchedulerError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}
