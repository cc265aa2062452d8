//! Cluster filters applied between clustering and scoring.
//!
//! The political-content filter has two stages:
//!
//! 1. **Keyword match** - a cluster whose concatenated title + text mentions a
//!    configured keyword is a candidate for removal.
//! 2. **Classifier confirmation** - when a [`PoliticsClassifier`] is attached,
//!    only candidates it confirms as political are removed. Without one, every
//!    keyword hit is removed.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::cluster::ClusterMap;
use crate::config::FilterConfig;
use crate::model::ContentItem;
use crate::util::text::KeywordMatcher;

/// Trait for filtering clusters before scoring.
#[async_trait]
pub trait ClusterFilter: Send + Sync {
    /// Return the clusters that stay eligible.
    async fn filter(&self, clusters: ClusterMap) -> Result<ClusterMap>;
}

/// Second-stage check for keyword hits (an LLM in production).
#[async_trait]
pub trait PoliticsClassifier: Send + Sync {
    /// Whether `text` is actually political.
    async fn is_political(&self, text: &str) -> Result<bool>;
}

/// Keeps every cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughFilter;

#[async_trait]
impl ClusterFilter for PassThroughFilter {
    async fn filter(&self, clusters: ClusterMap) -> Result<ClusterMap> {
        Ok(clusters)
    }
}

/// Keyword-first political content filter.
pub struct KeywordPoliticsFilter {
    enabled: bool,
    keywords: KeywordMatcher,
    classifier: Option<Arc<dyn PoliticsClassifier>>,
}

impl KeywordPoliticsFilter {
    /// # Errors
    /// Returns the automaton build error for an unusable keyword list.
    pub fn new(config: &FilterConfig) -> Result<Self, aho_corasick::BuildError> {
        Ok(Self {
            enabled: config.exclude_politics,
            keywords: KeywordMatcher::new(&config.politics_keywords)?,
            classifier: None,
        })
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn PoliticsClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    async fn is_political(&self, text: &str) -> bool {
        let Some(keyword) = self.keywords.find(text) else {
            return false;
        };
        let Some(classifier) = &self.classifier else {
            debug!(keyword, "keyword hit without classifier");
            return true;
        };
        match classifier.is_political(text).await {
            Ok(political) => political,
            Err(error) => {
                warn!(error = %error, keyword, "politics classifier failed; keeping cluster");
                false
            }
        }
    }
}

fn cluster_text(items: &[ContentItem]) -> String {
    items
        .iter()
        .map(ContentItem::searchable_text)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ClusterFilter for KeywordPoliticsFilter {
    async fn filter(&self, clusters: ClusterMap) -> Result<ClusterMap> {
        if !self.enabled {
            return Ok(clusters);
        }

        let input_count = clusters.len();
        let mut kept = ClusterMap::new();
        for (identity, items) in clusters {
            if self.is_political(&cluster_text(&items)).await {
                debug!(identity = %identity, "political cluster filtered");
            } else {
                kept.insert(identity, items);
            }
        }

        info!(
            input_count,
            output_count = kept.len(),
            removed_count = input_count - kept.len(),
            "political cluster filter applied"
        );
        Ok(kept)
    }
}
