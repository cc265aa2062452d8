use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{debug, info};

use issue_ranker::{
    config::Config,
    observability::Telemetry,
    replay::{ReplayConfig, replay_issue},
};

/// Rank one day of collected content into an issue.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ranking snapshot exported from storage (JSON)
    #[arg(long, env = "ISSUE_RANKER_SNAPSHOT")]
    snapshot: PathBuf,

    /// Reference time of the run (RFC3339). Defaults to the current time
    #[arg(long, env = "ISSUE_RANKER_NOW", value_parser = parse_rfc3339)]
    now: Option<DateTime<Utc>>,

    /// Number of clusters in the issue (overrides ranking.max_items)
    #[arg(long, env = "ISSUE_RANKER_TOP_N")]
    top_n: Option<usize>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

impl From<Cli> for ReplayConfig {
    fn from(cli: Cli) -> Self {
        Self {
            snapshot: cli.snapshot,
            now: cli.now,
            top_n: cli.top_n,
            pretty: cli.pretty,
        }
    }
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|parsed| parsed.with_timezone(&Utc))
}

#[tokio::main]
async fn main() -> Result<()> {
    let replay = ReplayConfig::from(Cli::parse());

    let telemetry = Telemetry::new().context("failed to initialize telemetry")?;
    let config = Config::from_env().context("failed to load configuration")?;

    let report = replay_issue(&replay, config, Some(telemetry.metrics())).await?;
    println!("{}", report.to_json(replay.pretty)?);

    info!(returned = report.stats.returned, "issue ranking finished");
    debug!(metrics = %telemetry.render_prometheus(), "final metrics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "issue-ranker",
            "--snapshot",
            "day.json",
            "--now",
            "2025-06-02T15:00:00+09:00",
            "--top-n",
            "5",
            "--pretty",
        ])
        .expect("arguments parse");

        let replay = ReplayConfig::from(cli);

        assert_eq!(replay.snapshot, PathBuf::from("day.json"));
        assert_eq!(
            replay.now,
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap())
        );
        assert_eq!(replay.top_n, Some(5));
        assert!(replay.pretty);
    }

    #[test]
    fn rejects_bad_timestamps_and_counts() {
        let bad_now = ["issue-ranker", "--snapshot", "a.json", "--now", "yesterday"];
        let bad_top_n = ["issue-ranker", "--snapshot", "a.json", "--top-n", "ten"];

        assert!(Cli::try_parse_from(bad_now).is_err());
        assert!(Cli::try_parse_from(bad_top_n).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
