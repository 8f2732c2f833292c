//! Budgeted feed collector.
//!
//! Per-feed and per-item failures are logged and skipped; whatever the sink
//! already stored stays stored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::collaborators::{ImportBudget, SourceCollector};
use crate::error::SchedulerError;
use crate::types::duration_ms;

/// One piece of evidence returned by a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source_url: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Counts toward the interactive high-signal target.
    pub high_signal: bool,
}

#[async_trait]
pub trait EvidenceFeed: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, actor_id: &str) -> Result<Vec<EvidenceItem>, SchedulerError>;
}

/// Destination for fetched evidence.
pub trait EvidenceSink: Send + Sync {
    /// Store the item; `Ok(false)` when it was already known.
    fn store(&self, actor_id: &str, item: &EvidenceItem) -> Result<bool, SchedulerError>;
}

pub struct FeedCollector {
    feeds: Vec<Arc<dyn EvidenceFeed>>,
    sink: Arc<dyn EvidenceSink>,
    fetch_timeout: Duration,
}

impl FeedCollector {
    pub fn new(
        feeds: Vec<Arc<dyn EvidenceFeed>>,
        sink: Arc<dyn EvidenceSink>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            feeds,
            sink,
            fetch_timeout,
        }
    }
}

#[async_trait]
impl SourceCollector for FeedCollector {
    async fn import_sources(
        &self,
        actor_id: &str,
        budget: &ImportBudget,
    ) -> Result<u64, SchedulerError> {
        let deadline = budget
            .max_seconds
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut imported = 0u64;
        let mut high_signal = 0u32;

        for feed in &self.feeds {
            if let Some(target) = budget.high_signal_target {
                if high_signal >= target {
                    debug!(actor_id, high_signal, "High-signal target reached");
                    break;
                }
            }
            let timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        info!(actor_id, imported, "Interactive import budget spent");
                        break;
                    }
                    remaining.min(self.fetch_timeout)
                }
                None => self.fetch_timeout,
            };

            let items = match tokio::time::timeout(timeout, feed.fetch(actor_id)).await {
                Ok(Ok(items)) => items,
                Ok(Err(err)) => {
                    warn!(actor_id, feed = feed.name(), error = %err, "Feed fetch failed, skipping");
                    continue;
                }
                Err(_) => {
                    warn!(
                        actor_id,
                        feed = feed.name(),
                        timeout_ms = duration_ms(timeout),
                        "Feed fetch timed out, skipping"
                    );
                    continue;
                }
            };

            for item in &items {
                match self.sink.store(actor_id, item) {
                    Ok(true) => {
                        imported += 1;
                        if item.high_signal {
                            high_signal += 1;
                        }
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(
                            actor_id,
                            feed = feed.name(),
                            source_url = %item.source_url,
                            error = %err,
                            "Failed to store evidence item, skipping"
                        );
                    }
                }
            }
        }

        debug!(actor_id, imported, high_signal, mode = ?budget.mode, "Source import finished");
        Ok(imported)
    }
}
