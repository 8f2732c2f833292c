//! Flat environment variable overrides.
//!
//! These names predate the layered config and are applied last. Unparsable
//! values are ignored with a warning; range checks happen in
//! [`RefreshConfig::normalized`](crate::config::RefreshConfig::normalized).

use std::str::FromStr;

use tracing::warn;

use crate::config::RefreshConfig;

pub const AUTO_REFRESH_ENABLED: &str = "AUTO_REFRESH_ENABLED";
pub const AUTO_REFRESH_MIN_INTERVAL_HOURS: &str = "AUTO_REFRESH_MIN_INTERVAL_HOURS";
pub const AUTO_REFRESH_LOOP_SECONDS: &str = "AUTO_REFRESH_LOOP_SECONDS";
pub const AUTO_REFRESH_BATCH_SIZE: &str = "AUTO_REFRESH_BATCH_SIZE";
pub const RUNNING_STALE_RECOVERY_MINUTES: &str = "RUNNING_STALE_RECOVERY_MINUTES";
pub const GENERATION_JOB_STALE_MINUTES: &str = "GENERATION_JOB_STALE_MINUTES";
pub const FEED_IMPORT_INTERACTIVE_MAX_SECONDS: &str = "FEED_IMPORT_INTERACTIVE_MAX_SECONDS";
pub const FEED_INTERACTIVE_HIGH_SIGNAL_TARGET: &str = "FEED_INTERACTIVE_HIGH_SIGNAL_TARGET";
pub const FEED_FETCH_TIMEOUT_SECONDS: &str = "FEED_FETCH_TIMEOUT_SECONDS";
pub const LLM_ENRICHMENT_ENABLED: &str = "LLM_ENRICHMENT_ENABLED";
pub const LLM_ENRICHMENT_MAX_ATTEMPTS: &str = "LLM_ENRICHMENT_MAX_ATTEMPTS";
pub const LLM_ENRICHMENT_RETRY_SECONDS: &str = "LLM_ENRICHMENT_RETRY_SECONDS";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: RefreshConfig) -> RefreshConfig {
    apply_env_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides from an arbitrary lookup, then clamp.
pub fn apply_env_overrides_from<F>(mut config: RefreshConfig, lookup: F) -> RefreshConfig
where
    F: Fn(&str) -> Option<String>,
{
    let auto = &mut config.auto_refresh;
    override_bool(&lookup, AUTO_REFRESH_ENABLED, &mut auto.enabled);
    override_parsed(&lookup, AUTO_REFRESH_MIN_INTERVAL_HOURS, &mut auto.min_interval_hours);
    override_parsed(&lookup, AUTO_REFRESH_LOOP_SECONDS, &mut auto.loop_seconds);
    override_parsed(&lookup, AUTO_REFRESH_BATCH_SIZE, &mut auto.batch_size);

    let recovery = &mut config.recovery;
    override_parsed(&lookup, RUNNING_STALE_RECOVERY_MINUTES, &mut recovery.stale_recovery_minutes);
    override_parsed(
        &lookup,
        GENERATION_JOB_STALE_MINUTES,
        &mut recovery.generation_job_stale_minutes,
    );

    let interactive = &mut config.interactive;
    override_parsed(&lookup, FEED_IMPORT_INTERACTIVE_MAX_SECONDS, &mut interactive.max_seconds);
    override_parsed(
        &lookup,
        FEED_INTERACTIVE_HIGH_SIGNAL_TARGET,
        &mut interactive.high_signal_target,
    );
    override_parsed(&lookup, FEED_FETCH_TIMEOUT_SECONDS, &mut interactive.fetch_timeout_seconds);

    let enrichment = &mut config.enrichment;
    override_bool(&lookup, LLM_ENRICHMENT_ENABLED, &mut enrichment.enabled);
    override_parsed(&lookup, LLM_ENRICHMENT_MAX_ATTEMPTS, &mut enrichment.max_attempts);
    override_parsed(&lookup, LLM_ENRICHMENT_RETRY_SECONDS, &mut enrichment.retry_sleep_seconds);

    config.normalized()
}

fn override_parsed<F, T>(lookup: &F, name: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    // Integer settings also accept "30.0"-style values.
    match trimmed.parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => match trimmed.parse::<f64>() {
            Ok(float) if float.is_finite() && float >= 0.0 => {
                if let Ok(value) = format!("{}", float.trunc() as u64).parse::<T>() {
                    *slot = value;
                    return;
                }
                warn!(variable = name, value = %raw, "Ignoring unparsable environment override");
            }
            _ => warn!(variable = name, value = %raw, "Ignoring unparsable environment override"),
        },
    }
}

fn override_bool<F>(lookup: &F, name: &str, slot: &mut bool)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        "" => {}
        _ => warn!(variable = name, value = %raw, "Ignoring unparsable boolean override"),
    }
}
