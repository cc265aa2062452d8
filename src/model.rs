//! Content items as handed over by the ingestion collaborator.
//!
//! Raw records (`RawContentItem`, `RawMetricsSnapshot`) carry untyped metric
//! maps. They are validated once, at this boundary, and converted into
//! [`ContentItem`] whose [`EngagementMetrics`] are typed per source family.
//! Everything downstream of this module assumes finite metrics and snapshots
//! ordered oldest to newest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Content source (platform tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    X,
    Reddit,
    Github,
    Youtube,
    Devto,
    Rss,
    Status,
    Bluesky,
}

impl ContentSource {
    pub const ALL: [ContentSource; 8] = [
        ContentSource::X,
        ContentSource::Reddit,
        ContentSource::Github,
        ContentSource::Youtube,
        ContentSource::Devto,
        ContentSource::Rss,
        ContentSource::Status,
        ContentSource::Bluesky,
    ];

    /// Engagement formula family this source belongs to.
    #[must_use]
    pub fn family(self) -> SourceFamily {
        match self {
            ContentSource::X | ContentSource::Bluesky => SourceFamily::Microblog,
            ContentSource::Reddit => SourceFamily::LinkAggregator,
            ContentSource::Youtube => SourceFamily::Video,
            ContentSource::Github => SourceFamily::CodeHost,
            ContentSource::Devto => SourceFamily::DevCommunity,
            ContentSource::Rss | ContentSource::Status => SourceFamily::Generic,
        }
    }

    /// Social sources feed the echo index.
    #[must_use]
    pub fn is_social(self) -> bool {
        matches!(self, ContentSource::X | ContentSource::Bluesky)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentSource::X => "x",
            ContentSource::Reddit => "reddit",
            ContentSource::Github => "github",
            ContentSource::Youtube => "youtube",
            ContentSource::Devto => "devto",
            ContentSource::Rss => "rss",
            ContentSource::Status => "status",
            ContentSource::Bluesky => "bluesky",
        }
    }
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown content source: {s}"))
    }
}

/// Groups of sources sharing one engagement formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    /// X, Bluesky.
    Microblog,
    /// Reddit.
    LinkAggregator,
    /// YouTube.
    Video,
    /// GitHub release feeds.
    CodeHost,
    /// dev.to.
    DevCommunity,
    /// RSS and status pages. Engagement is always zero.
    Generic,
}

/// Engagement counters of one snapshot, typed by source family.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum EngagementMetrics {
    Microblog {
        likes: f64,
        reposts: f64,
        replies: f64,
    },
    LinkAggregator {
        upvotes: f64,
        comments: f64,
    },
    Video {
        views: f64,
        comments: f64,
    },
    CodeHost {
        stars: f64,
        forks: f64,
    },
    DevCommunity {
        reactions: f64,
        comments: f64,
    },
    #[default]
    None,
}

impl EngagementMetrics {
    /// Read the known keys for `source` out of a raw metrics map.
    ///
    /// Missing keys count as zero. Unknown keys are ignored.
    #[must_use]
    pub fn from_map(source: ContentSource, raw: &BTreeMap<String, f64>) -> Self {
        let get = |key: &str| raw.get(key).copied().unwrap_or(0.0);
        match source.family() {
            SourceFamily::Microblog => EngagementMetrics::Microblog {
                likes: get("likes"),
                reposts: get(repost_key(source)),
                replies: get("replies"),
            },
            SourceFamily::LinkAggregator => EngagementMetrics::LinkAggregator {
                upvotes: get("upvotes"),
                comments: get("comments"),
            },
            SourceFamily::Video => EngagementMetrics::Video {
                views: get("views"),
                comments: get("comments"),
            },
            SourceFamily::CodeHost => EngagementMetrics::CodeHost {
                stars: get("stars"),
                forks: get("forks"),
            },
            SourceFamily::DevCommunity => EngagementMetrics::DevCommunity {
                reactions: get("reactions"),
                comments: get("comments"),
            },
            SourceFamily::Generic => EngagementMetrics::None,
        }
    }

    /// Write the counters back as the raw map `from_map` reads for `source`.
    #[must_use]
    pub fn to_map(&self, source: ContentSource) -> BTreeMap<String, f64> {
        self.values()
            .into_iter()
            .map(|(key, value)| {
                let key = if key == "reposts" { repost_key(source) } else { key };
                (key.to_string(), value)
            })
            .collect()
    }

    fn values(&self) -> Vec<(&'static str, f64)> {
        match *self {
            EngagementMetrics::Microblog {
                likes,
                reposts,
                replies,
            } => vec![("likes", likes), ("reposts", reposts), ("replies", replies)],
            EngagementMetrics::LinkAggregator { upvotes, comments } => {
                vec![("upvotes", upvotes), ("comments", comments)]
            }
            EngagementMetrics::Video { views, comments } => {
                vec![("views", views), ("comments", comments)]
            }
            EngagementMetrics::CodeHost { stars, forks } => vec![("stars", stars), ("forks", forks)],
            EngagementMetrics::DevCommunity {
                reactions,
                comments,
            } => vec![("reactions", reactions), ("comments", comments)],
            EngagementMetrics::None => Vec::new(),
        }
    }

    /// Reject NaN and infinite counters.
    ///
    /// # Errors
    /// Returns [`ValidationError::NonFiniteMetric`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.values().into_iter().find(|(_, value)| !value.is_finite()) {
            Some((key, value)) => Err(ValidationError::NonFiniteMetric { key, value }),
            None => Ok(()),
        }
    }
}

/// X calls them retweets, Bluesky calls them reposts.
fn repost_key(source: ContentSource) -> &'static str {
    match source {
        ContentSource::X => "retweets",
        _ => "reposts",
    }
}

/// Point-in-time engagement observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub metrics: EngagementMetrics,
}

/// One piece of ingested content. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContentItem", into = "RawContentItem")]
pub struct ContentItem {
    pub id: Uuid,
    pub source: ContentSource,
    pub source_id: Option<String>,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub text: Option<String>,
    /// Ordered oldest to newest.
    pub snapshots: Vec<MetricsSnapshot>,
}

impl ContentItem {
    /// Current snapshot.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.last()
    }

    /// The two most recent snapshots as `(previous, latest)`.
    #[must_use]
    pub fn last_two_snapshots(&self) -> Option<(&MetricsSnapshot, &MetricsSnapshot)> {
        match self.snapshots.as_slice() {
            [.., previous, latest] => Some((previous, latest)),
            _ => None,
        }
    }

    #[must_use]
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Title and body text joined for keyword matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.text_or_empty())
    }
}

/// Snapshot as stored: untyped counter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Content item as stored by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContentItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub source: ContentSource,
    #[serde(default)]
    pub source_id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub metrics_snapshots: Vec<RawMetricsSnapshot>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("metric {key} is not finite ({value})")]
    NonFiniteMetric { key: &'static str, value: f64 },
    #[error("content item {0} has neither url nor text")]
    Unresolvable(Uuid),
}

impl TryFrom<RawContentItem> for ContentItem {
    type Error = ValidationError;

    fn try_from(raw: RawContentItem) -> Result<Self, Self::Error> {
        let has_text = raw.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if raw.url.trim().is_empty() && !has_text {
            return Err(ValidationError::Unresolvable(raw.id));
        }

        let mut snapshots = raw
            .metrics_snapshots
            .iter()
            .map(|snapshot| {
                let metrics = EngagementMetrics::from_map(raw.source, &snapshot.metrics);
                metrics.validate()?;
                Ok(MetricsSnapshot {
                    captured_at: snapshot.captured_at,
                    metrics,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        snapshots.sort_by_key(|snapshot| snapshot.captured_at);

        Ok(Self {
            id: raw.id,
            source: raw.source,
            source_id: raw.source_id,
            url: raw.url,
            title: raw.title,
            author: raw.author,
            published_at: raw.published_at,
            fetched_at: raw.fetched_at.unwrap_or(raw.published_at),
            text: raw.text,
            snapshots,
        })
    }
}

impl From<ContentItem> for RawContentItem {
    fn from(item: ContentItem) -> Self {
        let metrics_snapshots = item
            .snapshots
            .iter()
            .map(|snapshot| RawMetricsSnapshot {
                captured_at: snapshot.captured_at,
                metrics: snapshot.metrics.to_map(item.source),
            })
            .collect();

        Self {
            id: item.id,
            source: item.source,
            source_id: item.source_id,
            url: item.url,
            title: item.title,
            author: item.author,
            published_at: item.published_at,
            fetched_at: Some(item.fetched_at),
            text: item.text,
            metrics_snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_item(source: ContentSource, snapshots: Vec<RawMetricsSnapshot>) -> RawContentItem {
        RawContentItem {
            id: Uuid::new_v4(),
            source,
            source_id: None,
            url: "https://example.com/post".to_string(),
            title: "Post".to_string(),
            author: None,
            published_at: Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap(),
            fetched_at: None,
            text: None,
            metrics_snapshots: snapshots,
        }
    }

    fn snapshot(hour: u32, pairs: &[(&str, f64)]) -> RawMetricsSnapshot {
        RawMetricsSnapshot {
            captured_at: Utc.with_ymd_and_hms(2025, 1, 10, hour, 0, 0).unwrap(),
            metrics: pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        }
    }

    #[test]
    fn source_families_follow_engagement_table() {
        assert_eq!(ContentSource::X.family(), SourceFamily::Microblog);
        assert_eq!(ContentSource::Bluesky.family(), SourceFamily::Microblog);
        assert_eq!(ContentSource::Reddit.family(), SourceFamily::LinkAggregator);
        assert_eq!(ContentSource::Youtube.family(), SourceFamily::Video);
        assert_eq!(ContentSource::Github.family(), SourceFamily::CodeHost);
        assert_eq!(ContentSource::Devto.family(), SourceFamily::DevCommunity);
        assert_eq!(ContentSource::Rss.family(), SourceFamily::Generic);
        assert!(ContentSource::X.is_social());
        assert!(!ContentSource::Reddit.is_social());
    }

    #[test]
    fn source_round_trips_through_str() {
        for source in ContentSource::ALL {
            assert_eq!(source.as_str().parse::<ContentSource>(), Ok(source));
        }
        assert!("mastodon".parse::<ContentSource>().is_err());
    }

    #[test]
    fn repost_key_depends_on_source() {
        let both = BTreeMap::from([("retweets".to_string(), 4.0), ("reposts".to_string(), 9.0)]);

        assert_eq!(
            EngagementMetrics::from_map(ContentSource::X, &both),
            EngagementMetrics::Microblog {
                likes: 0.0,
                reposts: 4.0,
                replies: 0.0
            }
        );
        assert_eq!(
            EngagementMetrics::from_map(ContentSource::Bluesky, &both),
            EngagementMetrics::Microblog {
                likes: 0.0,
                reposts: 9.0,
                replies: 0.0
            }
        );
    }

    #[test]
    fn serialized_item_keeps_its_snapshots() {
        for source in [ContentSource::Reddit, ContentSource::X, ContentSource::Bluesky] {
            let raw = raw_item(
                source,
                vec![
                    snapshot(9, &[("upvotes", 10.0), ("likes", 2.0), ("retweets", 1.0)]),
                    snapshot(10, &[("upvotes", 25.0), ("comments", 3.0), ("reposts", 5.0)]),
                ],
            );
            let item = ContentItem::try_from(raw).expect("valid item");

            let json = serde_json::to_string(&item).expect("item serializes");
            let back: ContentItem = serde_json::from_str(&json).expect("item parses");

            assert_eq!(back.snapshots.len(), 2);
            assert_eq!(back, item);
        }
    }

    #[test]
    fn microblog_accepts_retweets_and_reposts() {
        let x = BTreeMap::from([("retweets".to_string(), 4.0)]);
        let bsky = BTreeMap::from([("reposts".to_string(), 6.0)]);

        assert_eq!(
            EngagementMetrics::from_map(ContentSource::X, &x),
            EngagementMetrics::Microblog {
                likes: 0.0,
                reposts: 4.0,
                replies: 0.0
            }
        );
        assert_eq!(
            EngagementMetrics::from_map(ContentSource::Bluesky, &bsky),
            EngagementMetrics::Microblog {
                likes: 0.0,
                reposts: 6.0,
                replies: 0.0
            }
        );
    }

    #[test]
    fn conversion_sorts_snapshots_oldest_first() {
        let raw = raw_item(
            ContentSource::Reddit,
            vec![
                snapshot(12, &[("upvotes", 30.0)]),
                snapshot(9, &[("upvotes", 10.0)]),
            ],
        );

        let item = ContentItem::try_from(raw).expect("valid item");

        assert_eq!(item.snapshots.len(), 2);
        assert!(item.snapshots[0].captured_at < item.snapshots[1].captured_at);
        assert_eq!(item.fetched_at, item.published_at);
    }

    #[test]
    fn conversion_rejects_non_finite_metrics() {
        let raw = raw_item(
            ContentSource::Reddit,
            vec![snapshot(9, &[("upvotes", f64::NAN)])],
        );

        let error = ContentItem::try_from(raw).expect_err("NaN must be rejected");

        assert!(matches!(
            error,
            ValidationError::NonFiniteMetric { key: "upvotes", .. }
        ));
    }

    #[test]
    fn conversion_rejects_items_without_url_or_text() {
        let mut raw = raw_item(ContentSource::Rss, vec![]);
        raw.url = "  ".to_string();

        let error = ContentItem::try_from(raw).expect_err("unresolvable item");

        assert!(matches!(error, ValidationError::Unresolvable(_)));
    }

    #[test]
    fn item_deserializes_through_raw_form() {
        let json = r#"{
            "source": "x",
            "url": "https://x.com/someone/status/1",
            "title": "hello",
            "author": "someone",
            "published_at": "2025-01-10T08:00:00Z",
            "metrics_snapshots": [
                {"captured_at": "2025-01-10T09:00:00Z", "metrics": {"likes": 3, "retweets": 1}}
            ]
        }"#;

        let item: ContentItem = serde_json::from_str(json).expect("item parses");

        assert_eq!(item.source, ContentSource::X);
        assert_eq!(item.author.as_deref(), Some("someone"));
        assert_eq!(
            item.latest_snapshot().map(|s| s.metrics),
            Some(EngagementMetrics::Microblog {
                likes: 3.0,
                reposts: 1.0,
                replies: 0.0
            })
        );
    }
}
