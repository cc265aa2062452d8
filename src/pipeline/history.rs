//! Historical observations feeding the percentile index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engagement::{item_engagement, item_velocity};
use crate::config::HistoryConfig;
use crate::model::{ContentItem, ContentSource};
use crate::util::time::cutoff_days;

/// Materialized per-source observations of a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalObservations {
    pub engagement: BTreeMap<ContentSource, Vec<f64>>,
    pub velocity: BTreeMap<ContentSource, Vec<f64>>,
}

impl HistoricalObservations {
    /// Collect observations from stored items fetched within the lookback window.
    ///
    /// At most `sample_cap_per_source` items per source are sampled, in input
    /// order. Items without snapshots contribute nothing; velocity needs two.
    #[must_use]
    pub fn collect(items: &[ContentItem], now: DateTime<Utc>, config: &HistoryConfig) -> Self {
        let cutoff = cutoff_days(now, config.lookback_days);
        let mut sampled: BTreeMap<ContentSource, usize> = BTreeMap::new();
        let mut observations = Self::default();

        for item in items.iter().filter(|item| item.fetched_at >= cutoff) {
            let taken = sampled.entry(item.source).or_default();
            if *taken >= config.sample_cap_per_source {
                continue;
            }
            *taken += 1;

            if item.snapshots.is_empty() {
                continue;
            }
            observations
                .engagement
                .entry(item.source)
                .or_default()
                .push(item_engagement(item));
            if item.snapshots.len() >= 2 {
                observations
                    .velocity
                    .entry(item.source)
                    .or_default()
                    .push(item_velocity(item));
            }
        }

        observations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engagement.values().all(Vec::is_empty) && self.velocity.values().all(Vec::is_empty)
    }
}
