//! Database operations for `briefings`, `briefing_attempts` and
//! `briefing_entities`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `briefings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BriefingRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `in_progress`, `approved`, `exhausted` or `aborted`.
    pub status: String,
    pub approval_threshold: Decimal,
    pub max_attempts: i32,
    pub final_draft: Option<String>,
    pub final_score: Option<Decimal>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `briefing_attempts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BriefingAttemptRow {
    pub id: i64,
    pub briefing_id: i64,
    pub attempt: i32,
    pub draft: String,
    pub score: Decimal,
    /// JSON array of `{area, description}` objects.
    pub issues: serde_json::Value,
    pub feedback_from: Option<i32>,
    pub completed_at: DateTime<Utc>,
}

/// Number of briefings that featured an entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeatureCountRow {
    pub entity_key: String,
    pub times_featured: i64,
}

/// One scored attempt to store.
#[derive(Debug, Clone, Copy)]
pub struct NewBriefingAttempt<'a> {
    pub attempt: i32,
    pub draft: &'a str,
    pub score: f64,
    pub issues: &'a serde_json::Value,
    pub feedback_from: Option<i32>,
    pub completed_at: DateTime<Utc>,
}

/// Terminal state written when a run ends.
#[derive(Debug, Clone, Copy)]
pub struct FinishBriefing<'a> {
    pub status: &'a str,
    pub final_draft: Option<&'a str>,
    pub final_score: Option<f64>,
    pub error_message: Option<&'a str>,
}

const BRIEFING_COLUMNS: &str = "id, public_id, status, approval_threshold, max_attempts, \
                                final_draft, final_score, error_message, started_at, \
                                completed_at, created_at";

// ---------------------------------------------------------------------------
// briefings operations
// ---------------------------------------------------------------------------

/// Creates a briefing in `in_progress` status.
///
/// The threshold is bound as `f64` and stored as `NUMERIC(4,2)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_briefing(
    pool: &PgPool,
    public_id: Uuid,
    approval_threshold: f64,
    max_attempts: i32,
    started_at: DateTime<Utc>,
) -> Result<BriefingRow, DbError> {
    let row = sqlx::query_as::<_, BriefingRow>(&format!(
        "INSERT INTO briefings (public_id, status, approval_threshold, max_attempts, started_at) \
         VALUES ($1, 'in_progress', $2::numeric(4,2), $3, $4) \
         RETURNING {BRIEFING_COLUMNS}"
    ))
    .bind(public_id)
    .bind(approval_threshold)
    .bind(max_attempts)
    .bind(started_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Appends one attempt to a briefing. Returns the attempt row's `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including when the attempt
/// number was already recorded for this briefing.
pub async fn record_briefing_attempt(
    pool: &PgPool,
    briefing_id: i64,
    attempt: &NewBriefingAttempt<'_>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO briefing_attempts \
             (briefing_id, attempt, draft, score, issues, feedback_from, completed_at) \
         VALUES ($1, $2, $3, $4::numeric(4,2), $5::jsonb, $6, $7) \
         RETURNING id",
    )
    .bind(briefing_id)
    .bind(attempt.attempt)
    .bind(attempt.draft)
    .bind(attempt.score)
    .bind(attempt.issues)
    .bind(attempt.feedback_from)
    .bind(attempt.completed_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Moves an in-progress briefing to its terminal status.
///
/// # Errors
///
/// Returns [`DbError::BriefingAlreadyFinished`] if the briefing is not in
/// progress, or [`DbError::Sqlx`] if the update fails.
pub async fn finish_briefing(
    pool: &PgPool,
    id: i64,
    finish: &FinishBriefing<'_>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE briefings \
         SET status = $1, final_draft = $2, final_score = $3::numeric(4,2), \
             error_message = $4, completed_at = NOW() \
         WHERE id = $5 AND status = 'in_progress'",
    )
    .bind(finish.status)
    .bind(finish.final_draft)
    .bind(finish.final_score)
    .bind(finish.error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::BriefingAlreadyFinished { id });
    }

    Ok(())
}

/// The most recently started briefing, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_briefing(pool: &PgPool) -> Result<Option<BriefingRow>, DbError> {
    let row = sqlx::query_as::<_, BriefingRow>(&format!(
        "SELECT {BRIEFING_COLUMNS} FROM briefings \
         ORDER BY started_at DESC, id DESC \
         LIMIT 1"
    ))
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// A briefing's attempts in attempt order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_briefing_attempts(
    pool: &PgPool,
    briefing_id: i64,
) -> Result<Vec<BriefingAttemptRow>, DbError> {
    let rows = sqlx::query_as::<_, BriefingAttemptRow>(
        "SELECT id, briefing_id, attempt, draft, score, issues, feedback_from, completed_at \
         FROM briefing_attempts \
         WHERE briefing_id = $1 \
         ORDER BY attempt",
    )
    .bind(briefing_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// briefing_entities operations
// ---------------------------------------------------------------------------

/// Records the entities a briefing featured. Keys with no matching entity are
/// skipped. Returns the number of links stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn mark_featured(
    pool: &PgPool,
    briefing_id: i64,
    entity_keys: &[String],
    featured_on: NaiveDate,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "INSERT INTO briefing_entities (briefing_id, entity_id, featured_on) \
         SELECT $1, e.id, $3 FROM entities e WHERE e.entity_key = ANY($2) \
         ON CONFLICT (briefing_id, entity_id) DO NOTHING",
    )
    .bind(briefing_id)
    .bind(entity_keys)
    .bind(featured_on)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Keys of entities featured by a delivered briefing on or after `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_previously_featured_since(
    pool: &PgPool,
    since: NaiveDate,
) -> Result<Vec<String>, DbError> {
    let keys = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT e.entity_key \
         FROM briefing_entities be \
         JOIN briefings b ON b.id = be.briefing_id \
         JOIN entities e ON e.id = be.entity_id \
         WHERE be.featured_on >= $1 AND b.status IN ('approved', 'exhausted') \
         ORDER BY e.entity_key",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// How many delivered briefings featured each entity, all time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn feature_counts(pool: &PgPool) -> Result<Vec<FeatureCountRow>, DbError> {
    let rows = sqlx::query_as::<_, FeatureCountRow>(
        "SELECT e.entity_key, COUNT(*) AS times_featured \
         FROM briefing_entities be \
         JOIN briefings b ON b.id = be.briefing_id \
         JOIN entities e ON e.id = be.entity_id \
         WHERE b.status IN ('approved', 'exhausted') \
         GROUP BY e.entity_key \
         ORDER BY e.entity_key",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
