//! Property checks for identity resolution, percentiles and ranking.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use issue_ranker::config::RankingConfig;
use issue_ranker::model::{ContentItem, ContentSource, EngagementMetrics, MetricsSnapshot};
use issue_ranker::pipeline::echo::EchoIndex;
use issue_ranker::pipeline::history::HistoricalObservations;
use issue_ranker::pipeline::identity::canonicalize_url;
use issue_ranker::pipeline::percentile::{HistoricalDistribution, NEUTRAL_PERCENTILE};
use issue_ranker::pipeline::{
    CanonicalIdentity, DailyRankingInput, PublishedIdentitySet, rank_daily_clusters,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap()
}

fn story(url: &str, hours_ago: i64, upvotes: f64) -> ContentItem {
    let published_at = now() - Duration::hours(hours_ago);
    ContentItem {
        id: Uuid::new_v4(),
        source: ContentSource::Reddit,
        source_id: None,
        url: url.to_string(),
        title: format!("story at {url}"),
        author: None,
        published_at,
        fetched_at: published_at,
        text: None,
        snapshots: vec![MetricsSnapshot {
            captured_at: published_at,
            metrics: EngagementMetrics::LinkAggregator {
                upvotes,
                comments: 0.0,
            },
        }],
    }
}

fn post(author: &str, url: &str) -> ContentItem {
    let published_at = now() - Duration::hours(1);
    ContentItem {
        id: Uuid::new_v4(),
        source: ContentSource::X,
        source_id: None,
        url: url.to_string(),
        title: String::new(),
        author: Some(author.to_string()),
        published_at,
        fetched_at: published_at,
        text: None,
        snapshots: Vec::new(),
    }
}

proptest! {
    #[test]
    fn tracking_params_and_trailing_slash_do_not_change_identity(
        host in "[a-z]{1,10}\\.(com|org|dev)",
        segments in proptest::collection::vec("[a-z0-9]{1,8}", 1..4),
        tracking in "[a-z0-9]{1,6}",
    ) {
        let path = segments.join("/");
        let clean = format!("https://{host}/{path}");
        let noisy = format!(
            "http://{}/{path}/?utm_source={tracking}&fbclid={tracking}&ref={tracking}#top",
            host.to_uppercase()
        );

        prop_assert_eq!(canonicalize_url(&clean), canonicalize_url(&noisy));
    }

    #[test]
    fn query_order_does_not_change_identity(
        a in "[a-z0-9]{1,6}",
        b in "[a-z0-9]{1,6}",
    ) {
        let forward = format!("https://example.com/search?alpha={a}&beta={b}");
        let reverse = format!("https://example.com/search?beta={b}&alpha={a}");

        prop_assert_eq!(canonicalize_url(&forward), canonicalize_url(&reverse));
    }

    #[test]
    fn github_urls_resolve_to_their_repository(
        owner in "[a-z][a-z0-9-]{0,10}",
        repo in "[a-z][a-z0-9_]{0,10}",
        suffix in prop::sample::select(vec![
            "", "/", ".git", "/issues/12", "/pull/7/files", "/releases/tag/v1.0", "?tab=readme",
        ]),
    ) {
        let url = format!("https://github.com/{owner}/{repo}{suffix}");
        let identity = CanonicalIdentity::resolve(&url, "");

        prop_assert_eq!(identity.as_str(), format!("github:{owner}/{repo}"));
    }

    #[test]
    fn cve_outranks_the_url(
        year in 1999u32..2100,
        number in 1000u32..100_000,
        host in "[a-z]{1,10}\\.com",
    ) {
        let url = format!("https://{host}/advisory");
        let text = format!("patched cve-{year}-{number} today");
        let identity = CanonicalIdentity::resolve(&url, &text);

        prop_assert_eq!(identity.as_str(), format!("cve:CVE-{year}-{number}"));
    }

    #[test]
    fn percentile_is_bounded_and_monotonic(
        history in proptest::collection::vec(0.0f64..10_000.0, 1..64),
        low in 0.0f64..10_000.0,
        delta in 0.0f64..10_000.0,
    ) {
        let distribution = HistoricalDistribution::new(history);
        let high = low + delta;
        let p_low = distribution.percentile(low);
        let p_high = distribution.percentile(high);

        prop_assert!((0.0..=100.0).contains(&p_low));
        prop_assert!((0.0..=100.0).contains(&p_high));
        prop_assert!(p_low <= p_high);
    }

    #[test]
    fn empty_history_is_neutral(value in -1_000.0f64..1_000.0) {
        let distribution = HistoricalDistribution::new(Vec::new());

        prop_assert!((distribution.percentile(value) - NEUTRAL_PERCENTILE).abs() < f64::EPSILON);
    }

    #[test]
    fn echo_counts_each_author_once(
        authors in proptest::collection::vec("[a-e]", 1..30),
    ) {
        let posts: Vec<ContentItem> = authors
            .iter()
            .map(|author| post(author, "https://example.com/shared"))
            .collect();
        let distinct: BTreeSet<&String> = authors.iter().collect();

        let index = EchoIndex::build(&posts, now(), 12);

        prop_assert_eq!(
            index.echo_count(&CanonicalIdentity::from("https://example.com/shared")),
            distinct.len()
        );
    }

    #[test]
    fn published_identities_are_never_returned(
        stories in proptest::collection::vec((0i64..48, 0.0f64..500.0), 1..30),
        published_mask in proptest::collection::vec(any::<bool>(), 30),
    ) {
        let items: Vec<ContentItem> = stories
            .iter()
            .enumerate()
            .map(|(i, (hours_ago, upvotes))| {
                story(&format!("https://news.example.com/{i}"), *hours_ago, *upvotes)
            })
            .collect();
        let published: PublishedIdentitySet = items
            .iter()
            .zip(&published_mask)
            .filter(|(_, published)| **published)
            .map(|(item, _)| CanonicalIdentity::from(item.url.as_str()))
            .collect();
        let input = DailyRankingInput {
            items,
            historical: HistoricalObservations {
                engagement: BTreeMap::from([(ContentSource::Reddit, vec![10.0, 100.0])]),
                velocity: BTreeMap::new(),
            },
            published: published.clone(),
            ..DailyRankingInput::default()
        };

        let result = rank_daily_clusters(input, &RankingConfig::default(), now()).unwrap();

        prop_assert!(result.clusters.len() <= RankingConfig::default().max_items);
        for cluster in &result.clusters {
            prop_assert!(!published.contains(&cluster.identity));
        }
        for pair in result.clusters.windows(2) {
            prop_assert!(pair[0].breakdown.score >= pair[1].breakdown.score);
        }
    }
}
