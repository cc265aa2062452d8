//! Historical percentile index.
//!
//! Raw engagement and velocity numbers are not comparable across sources, so
//! they are normalized into `[0, 100]` against each source's recent
//! distribution. The index is rebuilt for every ranking run and never mutated
//! afterwards.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::history::HistoricalObservations;
use crate::model::ContentSource;

/// Percentile reported when a source has no observations.
pub const NEUTRAL_PERCENTILE: f64 = 50.0;

/// Sorted observations of one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalDistribution {
    sorted: Vec<f64>,
}

impl HistoricalDistribution {
    /// Non-finite observations are dropped.
    #[must_use]
    pub fn new(mut values: Vec<f64>) -> Self {
        values.retain(|value| value.is_finite());
        values.sort_by(f64::total_cmp);
        Self { sorted: values }
    }

    /// Share of observations strictly below `value`, scaled to `[0, 100]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentile(&self, value: f64) -> f64 {
        if self.sorted.is_empty() {
            return NEUTRAL_PERCENTILE;
        }
        let below = self.sorted.partition_point(|observed| *observed < value);
        (below as f64 / self.sorted.len() as f64 * 100.0).min(100.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

/// Per-source distributions of one metric.
#[derive(Debug, Clone, Default)]
pub struct PercentileIndex {
    distributions: FxHashMap<ContentSource, HistoricalDistribution>,
}

impl PercentileIndex {
    #[must_use]
    pub fn build(observations: &BTreeMap<ContentSource, Vec<f64>>) -> Self {
        let distributions = observations
            .iter()
            .map(|(source, values)| (*source, HistoricalDistribution::new(values.clone())))
            .collect();
        Self { distributions }
    }

    /// Percentile of `value` within `source`'s distribution, 50 when unknown.
    #[must_use]
    pub fn percentile(&self, source: ContentSource, value: f64) -> f64 {
        self.distributions
            .get(&source)
            .map_or(NEUTRAL_PERCENTILE, |distribution| distribution.percentile(value))
    }

    #[must_use]
    pub fn distribution(&self, source: ContentSource) -> Option<&HistoricalDistribution> {
        self.distributions.get(&source)
    }
}

/// Engagement and velocity indices for one ranking run.
#[derive(Debug, Clone, Default)]
pub struct HistoricalMetrics {
    engagement: PercentileIndex,
    velocity: PercentileIndex,
}

impl HistoricalMetrics {
    #[must_use]
    pub fn build(observations: &HistoricalObservations) -> Self {
        Self {
            engagement: PercentileIndex::build(&observations.engagement),
            velocity: PercentileIndex::build(&observations.velocity),
        }
    }

    #[must_use]
    pub fn engagement_percentile(&self, source: ContentSource, value: f64) -> f64 {
        self.engagement.percentile(source, value)
    }

    #[must_use]
    pub fn velocity_percentile(&self, source: ContentSource, value: f64) -> f64 {
        self.velocity.percentile(source, value)
    }

    #[must_use]
    pub fn engagement(&self) -> &PercentileIndex {
        &self.engagement
    }

    #[must_use]
    pub fn velocity(&self) -> &PercentileIndex {
        &self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn reddit_index() -> PercentileIndex {
        let values = (1..=10).map(|i| f64::from(i) * 10.0).collect();
        PercentileIndex::build(&BTreeMap::from([(ContentSource::Reddit, values)]))
    }

    #[rstest]
    #[case(50.0, 40.0)]
    #[case(150.0, 100.0)]
    #[case(5.0, 0.0)]
    #[case(10.0, 0.0)]
    #[case(100.0, 90.0)]
    #[case(100.5, 100.0)]
    fn reddit_scenario(#[case] value: f64, #[case] expected: f64) {
        let pctl = reddit_index().percentile(ContentSource::Reddit, value);
        assert!((pctl - expected).abs() < 1e-9, "value {value} -> {pctl}");
    }

    #[test]
    fn unknown_source_is_neutral() {
        let pctl = reddit_index().percentile(ContentSource::Youtube, 1_000_000.0);
        assert!((pctl - NEUTRAL_PERCENTILE).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_distribution_is_neutral() {
        let index = PercentileIndex::build(&BTreeMap::from([(ContentSource::X, Vec::new())]));
        assert!((index.percentile(ContentSource::X, 0.0) - 50.0).abs() < f64::EPSILON);
        assert!((index.percentile(ContentSource::X, 1e12) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unsorted_input_is_sorted_and_non_finite_dropped() {
        let distribution = HistoricalDistribution::new(vec![30.0, f64::NAN, 10.0, 20.0]);
        assert_eq!(distribution.len(), 3);
        assert!((distribution.percentile(25.0) - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn engagement_and_velocity_are_separate() {
        let observations = HistoricalObservations {
            engagement: BTreeMap::from([(ContentSource::Reddit, vec![1.0, 2.0])]),
            velocity: BTreeMap::new(),
        };
        let metrics = HistoricalMetrics::build(&observations);

        assert!((metrics.engagement_percentile(ContentSource::Reddit, 3.0) - 100.0).abs() < 1e-9);
        assert!(
            (metrics.velocity_percentile(ContentSource::Reddit, 3.0) - NEUTRAL_PERCENTILE).abs()
                < f64::EPSILON
        );
    }
}
