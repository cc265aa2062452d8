use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, HistoryConfig};
use crate::model::{ContentItem, ContentSource, RawContentItem};
use crate::observability::metrics::Metrics;
use crate::pipeline::history::HistoricalObservations;
use crate::pipeline::topics::{DominantTopic, Topic};
use crate::pipeline::{
    CanonicalIdentity, DailyRankingInput, DefaultIssueStage, IssueStage, PublishedIdentitySet,
    RankedCluster, RankingResult, RankingStats, ScoreBreakdown,
};

/// Configuration required by the offline replay helper.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub snapshot: PathBuf,
    /// Reference time of the run. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
    /// Overrides `RankingConfig::max_items`.
    pub top_n: Option<usize>,
    pub pretty: bool,
}

/// Ranking inputs exported from storage as one JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RankingSnapshot {
    pub items: Vec<RawContentItem>,
    /// Collected from `items` when absent.
    pub historical: Option<HistoricalObservations>,
    pub social_items: Vec<RawContentItem>,
    pub published: PublishedIdentitySet,
    pub previous_issue: BTreeSet<CanonicalIdentity>,
}

impl RankingSnapshot {
    /// Validate raw items and assemble the ranking input.
    ///
    /// Items that fail validation are skipped with a warning.
    #[must_use]
    pub fn into_input(self, now: DateTime<Utc>, history: &HistoryConfig) -> DailyRankingInput {
        let items = validate_items(self.items, "items");
        let social_items = validate_items(self.social_items, "social_items");
        let historical = self
            .historical
            .unwrap_or_else(|| HistoricalObservations::collect(&items, now, history));

        DailyRankingInput {
            items,
            historical,
            social_items,
            published: self.published,
            previous_issue: self.previous_issue,
        }
    }
}

fn validate_items(raw: Vec<RawContentItem>, field: &'static str) -> Vec<ContentItem> {
    raw.into_iter()
        .filter_map(|item| {
            let id = item.id;
            match ContentItem::try_from(item) {
                Ok(item) => Some(item),
                Err(error) => {
                    warn!(field, item_id = %id, error = %error, "skipping invalid content item");
                    None
                }
            }
        })
        .collect()
}

/// Rendered issue, as printed by the replay binary.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReport {
    pub generated_at: DateTime<Utc>,
    pub stats: RankingStats,
    pub clusters: Vec<ReportCluster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportCluster {
    pub rank: usize,
    pub identity: CanonicalIdentity,
    pub topic: Topic,
    pub dominant_topic: DominantTopic,
    pub score: ScoreBreakdown,
    pub items: Vec<ReportItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportItem {
    pub source: ContentSource,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl From<&RankedCluster> for ReportCluster {
    fn from(cluster: &RankedCluster) -> Self {
        Self {
            rank: cluster.rank,
            identity: cluster.identity.clone(),
            topic: cluster.topic,
            dominant_topic: cluster.topic.dominant(),
            score: cluster.breakdown.clone(),
            items: cluster
                .items
                .iter()
                .map(|item| ReportItem {
                    source: item.source,
                    url: item.url.clone(),
                    title: item.title.clone(),
                    author: item.author.clone(),
                    published_at: item.published_at,
                })
                .collect(),
        }
    }
}

impl IssueReport {
    #[must_use]
    pub fn new(generated_at: DateTime<Utc>, result: &RankingResult) -> Self {
        Self {
            generated_at,
            stats: result.stats,
            clusters: result.clusters.iter().map(ReportCluster::from).collect(),
        }
    }

    /// # Errors
    /// Returns an error when serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let rendered = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        rendered.context("failed to serialize issue report")
    }
}

/// Parse a snapshot document.
///
/// # Errors
/// Returns an error for malformed JSON.
pub fn parse_snapshot(raw: &str) -> Result<RankingSnapshot> {
    serde_json::from_str(raw).context("failed to parse ranking snapshot")
}

/// Rank a snapshot file offline and build the issue report.
///
/// # Errors
/// Returns an error when the snapshot cannot be read or parsed, or when the
/// stage fails.
pub async fn replay_issue(
    replay: &ReplayConfig,
    mut config: Config,
    metrics: Option<Arc<Metrics>>,
) -> Result<IssueReport> {
    let raw = tokio::fs::read_to_string(&replay.snapshot)
        .await
        .with_context(|| format!("failed to read snapshot at {}", replay.snapshot.display()))?;
    let snapshot = parse_snapshot(&raw)?;

    if let Some(top_n) = replay.top_n {
        config.ranking.max_items = top_n;
    }
    config
        .validate()
        .context("invalid configuration for replay")?;

    let now = replay.now.unwrap_or_else(Utc::now);
    let input = snapshot.into_input(now, &config.ranking.history);
    info!(
        items = input.items.len(),
        social_items = input.social_items.len(),
        published = input.published.len(),
        "snapshot loaded"
    );

    let mut stage = DefaultIssueStage::from_config(&config)?;
    if let Some(metrics) = metrics {
        stage = stage.with_metrics(metrics);
    }
    let result = stage.build_issue(input, now).await?;

    Ok(IssueReport::new(now, &result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SNAPSHOT: &str = r#"{
        "items": [
            {
                "source": "reddit",
                "url": "https://example.com/post?utm_source=reddit",
                "title": "Rust 2.0 release",
                "published_at": "2025-03-10T10:00:00Z",
                "metrics_snapshots": [
                    {"captured_at": "2025-03-10T10:30:00Z", "metrics": {"upvotes": 10}},
                    {"captured_at": "2025-03-10T11:30:00Z", "metrics": {"upvotes": 70, "comments": 5}}
                ]
            },
            {
                "source": "x",
                "url": "https://example.com/post",
                "title": "must read",
                "author": "alice",
                "published_at": "2025-03-10T11:00:00Z"
            },
            {
                "source": "rss",
                "url": "",
                "title": "broken",
                "published_at": "2025-03-10T11:00:00Z"
            },
            {
                "source": "github",
                "url": "https://github.com/acme/tool/releases/tag/v1",
                "title": "tool v1",
                "published_at": "2025-03-09T11:00:00Z"
            }
        ],
        "published": ["github:acme/tool"]
    }"#;

    #[test]
    fn snapshot_builds_input_and_skips_invalid_items() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let snapshot = parse_snapshot(SNAPSHOT).unwrap();

        let input = snapshot.into_input(now, &HistoryConfig::default());

        assert_eq!(input.items.len(), 3);
        assert!(input.social_items.is_empty());
        assert_eq!(input.historical.engagement[&ContentSource::Reddit], vec![80.0]);
        assert_eq!(input.historical.velocity[&ContentSource::Reddit], vec![70.0]);
        assert!(input.published.contains(&CanonicalIdentity::from("github:acme/tool")));
    }

    #[tokio::test]
    async fn replay_ranks_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();
        let replay = ReplayConfig {
            snapshot: path,
            now: Some(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()),
            top_n: Some(5),
            pretty: false,
        };

        let report = replay_issue(&replay, Config::default(), None).await.unwrap();

        assert_eq!(report.stats.excluded_published, 1);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].identity.as_str(), "https://example.com/post");
        assert_eq!(report.clusters[0].items.len(), 2);
        assert!((report.clusters[0].score.practical_boost - 0.15).abs() < f64::EPSILON);
        let json = report.to_json(false).unwrap();
        assert!(json.contains("\"dominant_topic\""));
    }

    #[tokio::test]
    async fn missing_snapshot_is_an_error() {
        let replay = ReplayConfig {
            snapshot: PathBuf::from("/nonexistent/snapshot.json"),
            now: None,
            top_n: None,
            pretty: false,
        };

        let error = replay_issue(&replay, Config::default(), None)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("failed to read snapshot"));
    }
}
