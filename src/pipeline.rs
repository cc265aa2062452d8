//! Daily issue ranking pipeline.
//!
//! The stages run leaf to root:
//!
//! 1. **Identity** - every item resolves to a [`identity::CanonicalIdentity`].
//! 2. **Cluster** - items sharing an identity are grouped and trimmed to the
//!    most engaged representatives.
//! 3. **Filter** - the political-content collaborator may drop clusters.
//! 4. **Indices** - historical percentile and echo indices are built once per run.
//! 5. **Score / Rank** - every surviving cluster is scored and the top-N are
//!    returned, never including an identity that was already published.
//!
//! [`issue::rank_daily_clusters`] runs stages 1, 2, 4 and 5 synchronously;
//! [`issue::DefaultIssueStage`] wraps it with the filter collaborator and
//! telemetry.

pub mod cluster;
pub mod echo;
pub mod engagement;
pub mod filters;
pub mod history;
pub mod identity;
pub mod issue;
pub mod percentile;
pub mod ranking;
pub mod scoring;
pub mod topics;

pub use cluster::{ClusterBuilder, ClusterMap};
pub use identity::CanonicalIdentity;
pub use issue::{DailyRankingInput, DefaultIssueStage, IssueStage, rank_daily_clusters};
pub use ranking::{PublishedIdentitySet, RankedCluster, RankingError, RankingResult, RankingStats};
pub use scoring::ScoreBreakdown;
