//! Daily issue entry points.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::cluster::{ClusterBuilder, ClusterMap};
use super::echo::EchoIndex;
use super::filters::{ClusterFilter, KeywordPoliticsFilter, PassThroughFilter};
use super::history::HistoricalObservations;
use super::identity::CanonicalIdentity;
use super::percentile::HistoricalMetrics;
use super::ranking::{IssueRanker, PublishedIdentitySet, RankingError, RankingResult, RankingStats};
use super::scoring::ClusterScorer;
use crate::config::{Config, RankingConfig};
use crate::model::ContentItem;
use crate::observability::metrics::Metrics;

/// Everything a ranking run reads. All of it is materialized before scoring starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyRankingInput {
    /// Candidate items of the issue window.
    pub items: Vec<ContentItem>,
    pub historical: HistoricalObservations,
    /// Social posts for the echo index.
    pub social_items: Vec<ContentItem>,
    pub published: PublishedIdentitySet,
    /// Identities of the immediately preceding issue (soft penalty only).
    pub previous_issue: BTreeSet<CanonicalIdentity>,
}

/// Borrowed run inputs for [`rank_clusters`].
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    pub historical: &'a HistoricalObservations,
    pub social_items: &'a [ContentItem],
    pub published: &'a PublishedIdentitySet,
    pub previous_issue: &'a BTreeSet<CanonicalIdentity>,
}

/// Cluster, score and rank one day's items.
///
/// A pure function of its arguments: the same input, config and `now` always
/// produce the same ordered result.
///
/// # Errors
/// Returns [`RankingError`] when the configured practical-boost keywords cannot
/// be compiled.
pub fn rank_daily_clusters(
    input: DailyRankingInput,
    config: &RankingConfig,
    now: DateTime<Utc>,
) -> Result<RankingResult, RankingError> {
    let DailyRankingInput {
        items,
        historical,
        social_items,
        published,
        previous_issue,
    } = input;

    let item_count = items.len();
    let clusters = ClusterBuilder::new(config.cluster_max_items).build(items);
    let context = RankingContext {
        historical: &historical,
        social_items: &social_items,
        published: &published,
        previous_issue: &previous_issue,
    };

    let mut result = rank_clusters(clusters, context, config, now)?;
    result.stats.items = item_count;
    Ok(result)
}

/// Score and rank already built (and filtered) clusters.
///
/// The percentile and echo indices are built concurrently, then clusters are
/// scored in parallel.
///
/// # Errors
/// See [`rank_daily_clusters`].
pub fn rank_clusters(
    clusters: ClusterMap,
    context: RankingContext<'_>,
    config: &RankingConfig,
    now: DateTime<Utc>,
) -> Result<RankingResult, RankingError> {
    let clusters_built = clusters.len();
    let (history, echo) = rayon::join(
        || HistoricalMetrics::build(context.historical),
        || EchoIndex::build(context.social_items, now, config.echo_window_hours),
    );

    let scorer = ClusterScorer::new(config, &history, &echo, context.previous_issue, now)?;
    let outcome = IssueRanker::new(config.max_items).rank(clusters, &scorer, context.published);

    let stats = RankingStats {
        items: 0,
        clusters_built,
        filtered_out: 0,
        excluded_published: outcome.excluded_published,
        scored: outcome.scored,
        viral: outcome.viral,
        returned: outcome.clusters.len(),
    };
    Ok(RankingResult {
        clusters: outcome.clusters,
        stats,
    })
}

/// Trait for the issue-building stage.
#[async_trait]
pub trait IssueStage: Send + Sync {
    /// Build the ranked cluster list of one issue.
    async fn build_issue(&self, input: DailyRankingInput, now: DateTime<Utc>)
    -> Result<RankingResult>;
}

/// Default implementation: cluster, filter, then rank on the blocking pool.
pub struct DefaultIssueStage {
    config: RankingConfig,
    filter: Arc<dyn ClusterFilter>,
    metrics: Option<Arc<Metrics>>,
}

impl DefaultIssueStage {
    /// Stage without filtering or metrics.
    #[must_use]
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            filter: Arc::new(PassThroughFilter),
            metrics: None,
        }
    }

    /// Stage with the keyword politics filter from `config`.
    ///
    /// # Errors
    /// Returns an error when the politics keywords cannot be compiled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let filter = KeywordPoliticsFilter::new(&config.filters)
            .context("failed to build politics filter")?;
        Ok(Self::new(config.ranking.clone()).with_filter(Arc::new(filter)))
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn ClusterFilter>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, stats: &RankingStats, elapsed_secs: f64) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.ranking_runs.inc();
        metrics.items_ranked.inc_by(stats.items as f64);
        metrics.clusters_built.inc_by(stats.clusters_built as f64);
        metrics.clusters_filtered.inc_by(stats.filtered_out as f64);
        metrics.clusters_excluded.inc_by(stats.excluded_published as f64);
        metrics.viral_clusters.inc_by(stats.viral as f64);
        metrics.clusters_selected.inc_by(stats.returned as f64);
        metrics.ranking_duration.observe(elapsed_secs);
    }
}

#[async_trait]
impl IssueStage for DefaultIssueStage {
    #[instrument(skip_all, fields(items = input.items.len(), now = %now))]
    async fn build_issue(
        &self,
        input: DailyRankingInput,
        now: DateTime<Utc>,
    ) -> Result<RankingResult> {
        let started = Instant::now();
        let DailyRankingInput {
            items,
            historical,
            social_items,
            published,
            previous_issue,
        } = input;

        let item_count = items.len();
        let clusters = ClusterBuilder::new(self.config.cluster_max_items).build(items);
        let clusters_built = clusters.len();

        let clusters = match self.filter.filter(clusters).await {
            Ok(clusters) => clusters,
            Err(error) => {
                if let Some(metrics) = &self.metrics {
                    metrics.ranking_runs_failed.inc();
                }
                return Err(error.context("cluster filter failed"));
            }
        };
        let filtered_out = clusters_built.saturating_sub(clusters.len());

        let config = self.config.clone();
        let ranked = tokio::task::spawn_blocking(move || {
            let context = RankingContext {
                historical: &historical,
                social_items: &social_items,
                published: &published,
                previous_issue: &previous_issue,
            };
            rank_clusters(clusters, context, &config, now)
        })
        .await
        .context("failed to join ranking task")?;

        let mut result = match ranked {
            Ok(result) => result,
            Err(error) => {
                if let Some(metrics) = &self.metrics {
                    metrics.ranking_runs_failed.inc();
                }
                return Err(error).context("ranking failed");
            }
        };
        result.stats.items = item_count;
        result.stats.clusters_built = clusters_built;
        result.stats.filtered_out = filtered_out;

        self.record(&result.stats, started.elapsed().as_secs_f64());
        info!(
            items = result.stats.items,
            clusters_built,
            filtered_out,
            excluded_published = result.stats.excluded_published,
            returned = result.stats.returned,
            "issue ranked"
        );
        Ok(result)
    }
}
