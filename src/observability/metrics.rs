//! Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

/// ランキング処理のメトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub ranking_runs: Counter,
    pub ranking_runs_failed: Counter,
    pub items_ranked: Counter,
    pub clusters_built: Counter,
    pub clusters_filtered: Counter,
    pub clusters_excluded: Counter,
    pub viral_clusters: Counter,
    pub clusters_selected: Counter,

    // ヒストグラム
    pub ranking_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成し、`registry` に登録する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            ranking_runs: register_counter_with_registry!(
                "issue_ranker_runs_total",
                "Total number of completed ranking runs",
                registry
            )?,
            ranking_runs_failed: register_counter_with_registry!(
                "issue_ranker_runs_failed_total",
                "Total number of ranking runs that failed",
                registry
            )?,
            items_ranked: register_counter_with_registry!(
                "issue_ranker_items_total",
                "Total number of content items considered for ranking",
                registry
            )?,
            clusters_built: register_counter_with_registry!(
                "issue_ranker_clusters_built_total",
                "Total number of clusters built from content items",
                registry
            )?,
            clusters_filtered: register_counter_with_registry!(
                "issue_ranker_clusters_filtered_total",
                "Total number of clusters removed by the cluster filter",
                registry
            )?,
            clusters_excluded: register_counter_with_registry!(
                "issue_ranker_clusters_excluded_total",
                "Total number of clusters excluded as already published",
                registry
            )?,
            viral_clusters: register_counter_with_registry!(
                "issue_ranker_viral_clusters_total",
                "Total number of scored clusters classified as viral",
                registry
            )?,
            clusters_selected: register_counter_with_registry!(
                "issue_ranker_clusters_selected_total",
                "Total number of clusters selected into an issue",
                registry
            )?,
            ranking_duration: register_histogram_with_registry!(
                "issue_ranker_run_duration_seconds",
                "Duration of a ranking run in seconds",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
                registry
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn registers_every_metric_once() {
        let registry = Arc::new(Registry::new());
        let metrics = Metrics::new(Arc::clone(&registry)).expect("metrics register");

        metrics.ranking_runs.inc();
        metrics.ranking_duration.observe(0.02);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .expect("encode metrics");
        let rendered = String::from_utf8(buffer).expect("utf8 exposition");
        assert!(rendered.contains("issue_ranker_runs_total 1"));
        assert!(rendered.contains("issue_ranker_run_duration_seconds_count 1"));
        assert!(Metrics::new(registry).is_err());
    }
}
