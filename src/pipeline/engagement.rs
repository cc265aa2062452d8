//! Engagement and velocity of content items.
//!
//! One formula per source family. Discussion (comments, replies, reposts)
//! weighs twice as much as passive approval.

use std::collections::BTreeMap;

use crate::model::{ContentItem, ContentSource, EngagementMetrics, MetricsSnapshot};
use crate::util::time::hours_between;

/// Comparable engagement number for one set of counters.
#[must_use]
pub fn calculate(metrics: &EngagementMetrics) -> f64 {
    match *metrics {
        EngagementMetrics::Microblog {
            likes,
            reposts,
            replies,
        } => likes + 2.0 * reposts + replies,
        EngagementMetrics::LinkAggregator { upvotes, comments } => upvotes + 2.0 * comments,
        EngagementMetrics::Video { views, comments } => views / 1000.0 + 2.0 * comments,
        EngagementMetrics::CodeHost { stars, forks } => stars + forks,
        EngagementMetrics::DevCommunity {
            reactions,
            comments,
        } => reactions + 2.0 * comments,
        EngagementMetrics::None => 0.0,
    }
}

/// Engagement straight from an untyped counter map.
#[must_use]
pub fn from_raw(source: ContentSource, raw: &BTreeMap<String, f64>) -> f64 {
    calculate(&EngagementMetrics::from_map(source, raw))
}

#[must_use]
pub fn snapshot_engagement(snapshot: &MetricsSnapshot) -> f64 {
    calculate(&snapshot.metrics)
}

/// Current engagement of an item: its latest snapshot, or zero without one.
#[must_use]
pub fn item_engagement(item: &ContentItem) -> f64 {
    item.latest_snapshot().map_or(0.0, snapshot_engagement)
}

/// Engagement gained per hour between the two most recent snapshots.
///
/// Zero with fewer than two snapshots, a non-positive time delta, or declining
/// engagement.
#[must_use]
pub fn item_velocity(item: &ContentItem) -> f64 {
    let Some((previous, latest)) = item.last_two_snapshots() else {
        return 0.0;
    };
    let dt_hours = hours_between(latest.captured_at, previous.captured_at);
    if dt_hours <= 0.0 {
        return 0.0;
    }
    let gained = snapshot_engagement(latest) - snapshot_engagement(previous);
    (gained / dt_hours).max(0.0)
}
