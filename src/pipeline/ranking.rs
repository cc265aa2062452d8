//! Issue ranking: hard exclusion, parallel scoring and top-N selection.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::cluster::ClusterMap;
use super::identity::CanonicalIdentity;
use super::scoring::{ClusterScorer, ScoreBreakdown};
use super::topics::Topic;
use crate::model::ContentItem;

/// Number of clusters in an issue unless configured otherwise.
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("failed to build keyword matcher: {0}")]
    KeywordMatcher(#[from] aho_corasick::BuildError),
}

/// Every identity ever selected into a published issue.
///
/// Append-only. Identities are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedIdentitySet(BTreeSet<CanonicalIdentity>);

impl PublishedIdentitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, identity: &CanonicalIdentity) -> bool {
        self.0.contains(identity)
    }

    /// Returns `true` when the identity was not yet published.
    pub fn record(&mut self, identity: CanonicalIdentity) -> bool {
        self.0.insert(identity)
    }

    /// Record every cluster of a finished issue. Returns the number of new identities.
    pub fn record_issue(&mut self, clusters: &[RankedCluster]) -> usize {
        clusters
            .iter()
            .filter(|cluster| self.record(cluster.identity.clone()))
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalIdentity> {
        self.0.iter()
    }
}

impl FromIterator<CanonicalIdentity> for PublishedIdentitySet {
    fn from_iter<T: IntoIterator<Item = CanonicalIdentity>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One selected cluster of an issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCluster {
    /// 1-based position in the issue.
    pub rank: usize,
    pub identity: CanonicalIdentity,
    pub items: Vec<ContentItem>,
    pub breakdown: ScoreBreakdown,
    pub topic: Topic,
}

/// Counters of one ranking run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingStats {
    pub items: usize,
    pub clusters_built: usize,
    /// Clusters removed by the cluster filter.
    pub filtered_out: usize,
    pub excluded_published: usize,
    pub scored: usize,
    pub viral: usize,
    pub returned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingResult {
    pub clusters: Vec<RankedCluster>,
    pub stats: RankingStats,
}

/// Outcome of [`IssueRanker::rank`] before run-level stats are attached.
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    pub clusters: Vec<RankedCluster>,
    pub excluded_published: usize,
    pub scored: usize,
    pub viral: usize,
}

/// Selects the top-N clusters of an issue.
#[derive(Debug, Clone, Copy)]
pub struct IssueRanker {
    top_n: usize,
}

impl IssueRanker {
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Drop published identities, score the rest in parallel, sort and truncate.
    ///
    /// Ordering is by final score descending, then identity ascending, so the
    /// result does not depend on the order clusters were built or scored in.
    #[must_use]
    pub fn rank(
        &self,
        clusters: ClusterMap,
        scorer: &ClusterScorer<'_>,
        published: &PublishedIdentitySet,
    ) -> RankOutcome {
        let total = clusters.len();
        let eligible: Vec<(CanonicalIdentity, Vec<ContentItem>)> = clusters
            .into_iter()
            .filter(|(identity, _)| !published.contains(identity))
            .collect();
        let excluded_published = total - eligible.len();
        if excluded_published > 0 {
            debug!(excluded_published, "hard exclusion applied");
        }

        let mut scored: Vec<(CanonicalIdentity, Vec<ContentItem>, ScoreBreakdown)> = eligible
            .into_par_iter()
            .map(|(identity, items)| {
                let breakdown = scorer.score(&identity, &items);
                (identity, items, breakdown)
            })
            .collect();
        let scored_count = scored.len();
        let viral = scored.iter().filter(|(_, _, b)| b.is_viral).count();

        scored.sort_by(|a, b| b.2.score.total_cmp(&a.2.score).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(self.top_n);

        let clusters: Vec<RankedCluster> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (identity, items, breakdown))| {
                let topic = Topic::detect(&identity, breakdown.is_viral);
                RankedCluster {
                    rank: index + 1,
                    identity,
                    items,
                    breakdown,
                    topic,
                }
            })
            .collect();

        info!(
            total = scored_count,
            top_n = self.top_n,
            returned = clusters.len(),
            viral,
            "clusters ranked"
        );

        RankOutcome {
            clusters,
            excluded_published,
            scored: scored_count,
            viral,
        }
    }
}

impl Default for IssueRanker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}
