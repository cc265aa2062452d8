//! Grouping of content items into story clusters.

use std::collections::BTreeMap;

use tracing::debug;

use super::engagement::item_engagement;
use super::identity::CanonicalIdentity;
use crate::model::ContentItem;

/// Items kept per cluster unless configured otherwise.
pub const DEFAULT_CLUSTER_MAX_ITEMS: usize = 5;

/// Clusters keyed by identity. Items are ordered by engagement, most engaged first.
pub type ClusterMap = BTreeMap<CanonicalIdentity, Vec<ContentItem>>;

/// Groups items by canonical identity and keeps the top-K by engagement.
#[derive(Debug, Clone, Copy)]
pub struct ClusterBuilder {
    max_items: usize,
}

impl ClusterBuilder {
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Group items by identity without trimming.
    #[must_use]
    pub fn group<I>(items: I) -> ClusterMap
    where
        I: IntoIterator<Item = ContentItem>,
    {
        let mut clusters = ClusterMap::new();
        for item in items {
            let identity = CanonicalIdentity::resolve(&item.url, item.text_or_empty());
            clusters.entry(identity).or_default().push(item);
        }
        clusters
    }

    /// Group, then sort each cluster by engagement (stable) and keep the top `max_items`.
    #[must_use]
    pub fn build<I>(&self, items: I) -> ClusterMap
    where
        I: IntoIterator<Item = ContentItem>,
    {
        let mut item_count = 0usize;
        let grouped = Self::group(items.into_iter().inspect(|_| item_count += 1));

        let clusters: ClusterMap = grouped
            .into_iter()
            .map(|(identity, items)| (identity, self.top_items(items)))
            .collect();

        debug!(
            item_count,
            cluster_count = clusters.len(),
            max_items = self.max_items,
            "clusters built"
        );
        clusters
    }

    fn top_items(&self, items: Vec<ContentItem>) -> Vec<ContentItem> {
        let mut scored: Vec<(f64, ContentItem)> = items
            .into_iter()
            .map(|item| (item_engagement(&item), item))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(self.max_items)
            .map(|(_, item)| item)
            .collect()
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_MAX_ITEMS)
    }
}
