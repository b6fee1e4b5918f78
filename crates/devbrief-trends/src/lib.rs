//! Trend analysis for tracked repositories.
//!
//! - [`store`]: append-only snapshot history keyed by (entity, date)
//! - [`classifier`]: snapshot series → [`Verdict`] plus growth metrics
//! - [`linker`]: forum and social items → entity mentions
//! - [`report`]: classified entities grouped into the daily trend report

pub mod classifier;
pub mod error;
pub mod linker;
pub mod report;
pub mod store;

pub use classifier::{classify, ClassifierPolicy, TrendMetrics, Verdict};
pub use error::DataIntegrityError;
pub use linker::{
    extract_github_repo, link, mention_counts, CatalogEntry, EntityCatalog, MentionCounts,
};
pub use report::{
    build_trend_report, EntityProfile, LanguageTrend, ReportRow, SkippedEntity, SummaryStats,
    TopicCount, TrendReport,
};
pub use store::{AppendOutcome, SnapshotStore};
