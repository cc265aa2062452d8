//! Multi-factor cluster scoring.
//!
//! ```text
//! base  = w_recency * recency
//!       + w_engagement * engagement_pctl / 100
//!       + w_velocity * velocity_pctl / 100
//!       + w_echo * ln(1 + echo)
//!       + practical_boost
//!       - already_seen_penalty
//! score = base * viral_multiplier   (viral)
//!       = base                      (otherwise)
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::echo::EchoIndex;
use super::engagement::{item_engagement, item_velocity};
use super::identity::CanonicalIdentity;
use super::percentile::HistoricalMetrics;
use super::ranking::RankingError;
use crate::config::RankingConfig;
use crate::model::ContentItem;
use crate::util::{text::KeywordMatcher, time::hours_between};

/// Every component of one cluster's score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Final score used for ranking.
    pub score: f64,
    /// Score before the viral multiplier.
    pub base_score: f64,
    pub recency: f64,
    pub engagement: f64,
    pub engagement_pctl: f64,
    pub velocity: f64,
    pub velocity_pctl: f64,
    /// Distinct social authors.
    pub echo: usize,
    pub echo_scaled: f64,
    pub practical_boost: f64,
    pub already_seen_penalty: f64,
    pub is_viral: bool,
}

/// Scores clusters against the indices of one ranking run.
///
/// Shares only immutable state, so one scorer serves every worker thread.
pub struct ClusterScorer<'a> {
    config: &'a RankingConfig,
    history: &'a HistoricalMetrics,
    echo: &'a EchoIndex,
    previous_issue: &'a BTreeSet<CanonicalIdentity>,
    practical_keywords: KeywordMatcher,
    now: DateTime<Utc>,
}

impl<'a> ClusterScorer<'a> {
    /// # Errors
    /// Returns [`RankingError::KeywordMatcher`] when the practical-boost
    /// keywords cannot be compiled.
    pub fn new(
        config: &'a RankingConfig,
        history: &'a HistoricalMetrics,
        echo: &'a EchoIndex,
        previous_issue: &'a BTreeSet<CanonicalIdentity>,
        now: DateTime<Utc>,
    ) -> Result<Self, RankingError> {
        let practical_keywords = KeywordMatcher::new(&config.practical_boost_keywords)?;
        Ok(Self {
            config,
            history,
            echo,
            previous_issue,
            practical_keywords,
            now,
        })
    }

    /// `exp(-age / half_life)`. Items dated in the future count as age zero.
    #[must_use]
    pub fn recency(&self, published_at: DateTime<Utc>) -> f64 {
        let age_hours = hours_between(self.now, published_at).max(0.0);
        (-age_hours / self.config.half_life_hours).exp()
    }

    /// Flat bonus when any item mentions a practical-engineering keyword.
    #[must_use]
    pub fn practical_boost(&self, items: &[ContentItem]) -> f64 {
        let hit = items
            .iter()
            .any(|item| self.practical_keywords.is_match(&item.searchable_text()));
        if hit { self.config.practical_boost_value } else { 0.0 }
    }

    #[must_use]
    pub fn already_seen_penalty(&self, identity: &CanonicalIdentity) -> f64 {
        if self.previous_issue.contains(identity) {
            self.config.already_seen_penalty
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn is_viral(&self, engagement_pctl: f64, velocity_pctl: f64, echo: usize) -> bool {
        let viral = &self.config.viral;
        engagement_pctl >= viral.engagement_pctl
            || velocity_pctl >= viral.velocity_pctl
            || echo >= viral.echo_accounts
    }

    /// Score one cluster. An empty cluster scores zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, identity: &CanonicalIdentity, items: &[ContentItem]) -> ScoreBreakdown {
        let Some((best, engagement)) = best_item(items) else {
            return ScoreBreakdown::default();
        };

        let recency = self.recency(best.published_at);
        let velocity = item_velocity(best);
        let engagement_pctl = self.history.engagement_percentile(best.source, engagement);
        let velocity_pctl = self.history.velocity_percentile(best.source, velocity);

        let echo = self.echo.echo_count(identity);
        let echo_scaled = (echo as f64).ln_1p();
        let practical_boost = self.practical_boost(items);
        let already_seen_penalty = self.already_seen_penalty(identity);

        let weights = &self.config.weights;
        let base_score = weights.recency * recency
            + weights.engagement * (engagement_pctl / 100.0)
            + weights.velocity * (velocity_pctl / 100.0)
            + weights.echo * echo_scaled
            + practical_boost
            - already_seen_penalty;

        let is_viral = self.is_viral(engagement_pctl, velocity_pctl, echo);
        let score = if is_viral {
            base_score * self.config.viral.multiplier
        } else {
            base_score
        };

        ScoreBreakdown {
            score,
            base_score,
            recency,
            engagement,
            engagement_pctl,
            velocity,
            velocity_pctl,
            echo,
            echo_scaled,
            practical_boost,
            already_seen_penalty,
            is_viral,
        }
    }
}

/// First item with the maximum engagement, with that engagement.
fn best_item(items: &[ContentItem]) -> Option<(&ContentItem, f64)> {
    items
        .iter()
        .map(|item| (item, item_engagement(item)))
        .fold(None, |best, candidate| match best {
            Some((_, top)) if candidate.1 <= top => best,
            _ => Some(candidate),
        })
}
