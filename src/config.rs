use std::{
    env,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::text::KeywordMatcher;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// One year.
const MAX_ECHO_WINDOW_HOURS: u32 = 8760;
/// Ten years.
const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Top-level configuration of a ranking run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ranking: RankingConfig,
    pub filters: FilterConfig,
}

/// Every tunable of the scoring and ranking core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Recency decay constant in hours: `recency = exp(-age / half_life_hours)`.
    pub half_life_hours: f64,
    pub weights: RankingWeights,
    /// Trailing window for social items feeding the echo index.
    pub echo_window_hours: u32,
    pub viral: ViralConfig,
    pub practical_boost_keywords: Vec<String>,
    pub practical_boost_value: f64,
    /// Soft penalty for identities that were in the previous issue.
    pub already_seen_penalty: f64,
    /// Number of clusters in an issue (top-N).
    pub max_items: usize,
    /// Items kept per cluster (top-K by engagement).
    pub cluster_max_items: usize,
    pub history: HistoryConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 18.0,
            weights: RankingWeights::default(),
            echo_window_hours: 12,
            viral: ViralConfig::default(),
            practical_boost_keywords: ["release", "changelog", "benchmark", "postmortem"]
                .into_iter()
                .map(String::from)
                .collect(),
            practical_boost_value: 0.15,
            already_seen_penalty: 0.30,
            max_items: 10,
            cluster_max_items: 5,
            history: HistoryConfig::default(),
        }
    }
}

/// Per-factor weights of the base score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub recency: f64,
    pub engagement: f64,
    pub velocity: f64,
    pub echo: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recency: 0.30,
            engagement: 0.20,
            velocity: 0.25,
            echo: 0.25,
        }
    }
}

/// Viral classification thresholds. Any one of them being met is enough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViralConfig {
    pub engagement_pctl: f64,
    pub velocity_pctl: f64,
    pub echo_accounts: usize,
    pub multiplier: f64,
}

impl Default for ViralConfig {
    fn default() -> Self {
        Self {
            engagement_pctl: 90.0,
            velocity_pctl: 90.0,
            echo_accounts: 3,
            multiplier: 1.35,
        }
    }
}

/// Lookback used when collecting historical observations from stored items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub lookback_days: u32,
    pub sample_cap_per_source: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            sample_cap_per_source: 1000,
        }
    }
}

/// Political-content filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub exclude_politics: bool,
    pub politics_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_politics: true,
            politics_keywords: ["election", "senate", "parliament", "candidate"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から設定を読み込み、検証する。
    ///
    /// `ISSUE_RANKER_CONFIG_PATH` が設定されていれば YAML を読み込み、その上に
    /// 個別の環境変数を上書きする。
    ///
    /// # Errors
    /// ファイルの読み込み・パース、または各値の検証に失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var("ISSUE_RANKER_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(path.trim()))?,
            _ => Self::default(),
        };

        config.ranking.apply_env()?;
        config.filters.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Yaml`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// # Errors
    /// Returns [`ConfigError::Yaml`] when the document does not match the schema.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// # Errors
    /// See [`RankingConfig::validate`] and [`FilterConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ranking.validate()?;
        self.filters.validate()
    }
}

impl RankingConfig {
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.half_life_hours = parse_f64("RANKING_HALF_LIFE_HOURS", self.half_life_hours)?;
        self.weights.recency = parse_f64("RANKING_WEIGHT_RECENCY", self.weights.recency)?;
        self.weights.engagement =
            parse_f64("RANKING_WEIGHT_ENGAGEMENT", self.weights.engagement)?;
        self.weights.velocity = parse_f64("RANKING_WEIGHT_VELOCITY", self.weights.velocity)?;
        self.weights.echo = parse_f64("RANKING_WEIGHT_ECHO", self.weights.echo)?;
        self.echo_window_hours = parse_u32("RANKING_ECHO_WINDOW_HOURS", self.echo_window_hours)?;
        self.viral.engagement_pctl =
            parse_f64("RANKING_VIRAL_ENGAGEMENT_PCTL", self.viral.engagement_pctl)?;
        self.viral.velocity_pctl =
            parse_f64("RANKING_VIRAL_VELOCITY_PCTL", self.viral.velocity_pctl)?;
        self.viral.echo_accounts =
            parse_usize("RANKING_VIRAL_ECHO_ACCOUNTS", self.viral.echo_accounts)?;
        self.viral.multiplier = parse_f64("RANKING_VIRAL_MULTIPLIER", self.viral.multiplier)?;
        if let Some(keywords) = parse_csv("RANKING_PRACTICAL_BOOST_KEYWORDS") {
            self.practical_boost_keywords = keywords;
        }
        self.practical_boost_value =
            parse_f64("RANKING_PRACTICAL_BOOST_VALUE", self.practical_boost_value)?;
        self.already_seen_penalty =
            parse_f64("RANKING_ALREADY_SEEN_PENALTY", self.already_seen_penalty)?;
        self.max_items = parse_usize("RANKING_MAX_ITEMS", self.max_items)?;
        self.cluster_max_items = parse_usize("RANKING_CLUSTER_MAX_ITEMS", self.cluster_max_items)?;
        self.history.lookback_days = parse_u32("HISTORY_LOOKBACK_DAYS", self.history.lookback_days)?;
        self.history.sample_cap_per_source =
            parse_usize("HISTORY_SAMPLE_CAP", self.history.sample_cap_per_source)?;
        Ok(())
    }

    /// Check that every tunable is usable by the scorer.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            "half_life_hours",
            self.half_life_hours.is_finite() && self.half_life_hours > 0.0,
            "must be a positive number of hours",
        )?;
        for (name, weight) in [
            ("weights.recency", self.weights.recency),
            ("weights.engagement", self.weights.engagement),
            ("weights.velocity", self.weights.velocity),
            ("weights.echo", self.weights.echo),
        ] {
            ensure(
                name,
                weight.is_finite() && weight >= 0.0,
                "must be a finite non-negative weight",
            )?;
        }
        for (name, pctl) in [
            ("viral.engagement_pctl", self.viral.engagement_pctl),
            ("viral.velocity_pctl", self.viral.velocity_pctl),
        ] {
            ensure(
                name,
                (0.0..=100.0).contains(&pctl),
                "must be a percentile between 0 and 100",
            )?;
        }
        ensure(
            "viral.multiplier",
            self.viral.multiplier.is_finite() && self.viral.multiplier > 0.0,
            "must be a positive multiplier",
        )?;
        ensure(
            "practical_boost_value",
            self.practical_boost_value.is_finite(),
            "must be finite",
        )?;
        ensure(
            "already_seen_penalty",
            self.already_seen_penalty.is_finite(),
            "must be finite",
        )?;
        ensure(
            "echo_window_hours",
            self.echo_window_hours <= MAX_ECHO_WINDOW_HOURS,
            "must be at most 8760 hours",
        )?;
        ensure(
            "history.lookback_days",
            self.history.lookback_days <= MAX_LOOKBACK_DAYS,
            "must be at most 3650 days",
        )?;
        ensure("max_items", self.max_items > 0, "must be greater than zero")?;
        ensure(
            "cluster_max_items",
            self.cluster_max_items > 0,
            "must be greater than zero",
        )?;
        KeywordMatcher::new(&self.practical_boost_keywords).map_err(|error| {
            ConfigError::Invalid {
                name: "practical_boost_keywords",
                source: anyhow::Error::new(error),
            }
        })?;
        Ok(())
    }
}

impl FilterConfig {
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.exclude_politics = parse_bool("FILTER_EXCLUDE_POLITICS", self.exclude_politics)?;
        if let Some(keywords) = parse_csv("FILTER_POLITICS_KEYWORDS") {
            self.politics_keywords = keywords;
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the keyword automaton cannot be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        KeywordMatcher::new(&self.politics_keywords).map_err(|error| ConfigError::Invalid {
            name: "politics_keywords",
            source: anyhow::Error::new(error),
        })?;
        Ok(())
    }
}

fn ensure(name: &'static str, condition: bool, message: &'static str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!(message),
        })
    }
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_csv(name: &'static str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    Some(
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
