//! Database operations for `entity_snapshots`.
//!
//! Snapshots are append-only: one row per entity per day, never updated.

use chrono::NaiveDate;
use devbrief_core::{EntityId, Snapshot};
use devbrief_trends::AppendOutcome;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRecord {
    entity_key: String,
    captured_on: NaiveDate,
    stars: i64,
    forks: i64,
    open_issues: Option<i64>,
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        Snapshot {
            entity: EntityId::new(&record.entity_key),
            captured_on: record.captured_on,
            stars: record.stars,
            forks: record.forks,
            open_issues: record.open_issues,
        }
    }
}

/// Records `snapshot` for the entity with internal id `entity_id`.
///
/// A second snapshot for the same entity and day is ignored and reported as
/// [`AppendOutcome::Duplicate`]; the first reading of the day stands.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a negative
/// metric rejected by the table's check constraints).
pub async fn append_snapshot(
    pool: &PgPool,
    entity_id: i64,
    snapshot: &Snapshot,
    collection_run_id: Option<i64>,
) -> Result<AppendOutcome, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO entity_snapshots \
             (entity_id, collection_run_id, captured_on, stars, forks, open_issues) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (entity_id, captured_on) DO NOTHING",
    )
    .bind(entity_id)
    .bind(collection_run_id)
    .bind(snapshot.captured_on)
    .bind(snapshot.stars)
    .bind(snapshot.forks)
    .bind(snapshot.open_issues)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(if rows_affected > 0 {
        AppendOutcome::Inserted
    } else {
        AppendOutcome::Duplicate
    })
}

/// One entity's snapshots captured on or after `since`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entity_snapshots(
    pool: &PgPool,
    entity: &EntityId,
    since: NaiveDate,
) -> Result<Vec<Snapshot>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRecord>(
        "SELECT e.entity_key, s.captured_on, s.stars, s.forks, s.open_issues \
         FROM entity_snapshots s \
         JOIN entities e ON e.id = s.entity_id \
         WHERE e.entity_key = $1 AND s.captured_on >= $2 \
         ORDER BY s.captured_on",
    )
    .bind(entity.as_str())
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Snapshot::from).collect())
}

/// Every snapshot captured on or after `since`, grouped by entity key and
/// oldest first within each entity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_snapshots_since(
    pool: &PgPool,
    since: NaiveDate,
) -> Result<Vec<Snapshot>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRecord>(
        "SELECT e.entity_key, s.captured_on, s.stars, s.forks, s.open_issues \
         FROM entity_snapshots s \
         JOIN entities e ON e.id = s.entity_id \
         WHERE s.captured_on >= $1 \
         ORDER BY e.entity_key, s.captured_on",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Snapshot::from).collect())
}
