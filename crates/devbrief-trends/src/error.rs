use chrono::NaiveDate;
use devbrief_core::EntityId;
use thiserror::Error;

/// A snapshot series that cannot be classified as given.
///
/// Never repaired automatically; the caller decides whether to skip the
/// entity or fix the underlying history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("snapshot for {found} found in the series of {expected}")]
    ForeignSnapshot { expected: EntityId, found: EntityId },

    #[error("snapshots for {entity} are not strictly ordered by date: {previous} then {next}")]
    NonMonotonicDates {
        entity: EntityId,
        previous: NaiveDate,
        next: NaiveDate,
    },

    #[error("snapshot for {entity} on {captured_on} has negative {metric}: {value}")]
    NegativeMetric {
        entity: EntityId,
        captured_on: NaiveDate,
        metric: &'static str,
        value: i64,
    },
}
