//! Database operations for `entities`.

use chrono::{DateTime, NaiveDate, Utc};
use devbrief_core::{Entity, EntityId};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `entities` table. `stars`, `forks` and `open_issues` mirror
/// the most recent observation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityRow {
    pub id: i64,
    pub entity_key: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: Option<i64>,
    pub readme_excerpt: Option<String>,
    pub first_seen_on: NaiveDate,
    pub last_seen_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRow {
    #[must_use]
    pub fn into_entity(self) -> Entity {
        Entity {
            id: EntityId::new(&self.entity_key),
            full_name: self.full_name,
            description: self.description,
            url: self.url,
            language: self.language,
            topics: self.topics,
            stars: self.stars,
            forks: self.forks,
            open_issues: self.open_issues,
            readme_excerpt: self.readme_excerpt,
            first_seen_on: Some(self.first_seen_on),
        }
    }
}

const ENTITY_COLUMNS: &str = "id, entity_key, full_name, description, url, language, topics, \
                              stars, forks, open_issues, readme_excerpt, first_seen_on, \
                              last_seen_on, created_at, updated_at";

/// Inserts or refreshes an entity observed on `seen_on`.
///
/// Conflicts on `entity_key` update the descriptive fields and current
/// metrics; `first_seen_on` keeps its original value. A `NULL` README excerpt
/// does not overwrite one fetched earlier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_entity(
    pool: &PgPool,
    entity: &Entity,
    seen_on: NaiveDate,
) -> Result<EntityRow, DbError> {
    let row = sqlx::query_as::<_, EntityRow>(&format!(
        "INSERT INTO entities \
             (entity_key, full_name, description, url, language, topics, \
              stars, forks, open_issues, readme_excerpt, first_seen_on, last_seen_on) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
         ON CONFLICT (entity_key) DO UPDATE SET \
             full_name      = EXCLUDED.full_name, \
             description    = EXCLUDED.description, \
             url            = EXCLUDED.url, \
             language       = EXCLUDED.language, \
             topics         = EXCLUDED.topics, \
             stars          = EXCLUDED.stars, \
             forks          = EXCLUDED.forks, \
             open_issues    = EXCLUDED.open_issues, \
             readme_excerpt = COALESCE(EXCLUDED.readme_excerpt, entities.readme_excerpt), \
             last_seen_on   = GREATEST(entities.last_seen_on, EXCLUDED.last_seen_on), \
             updated_at     = NOW() \
         RETURNING {ENTITY_COLUMNS}"
    ))
    .bind(entity.id.as_str())
    .bind(&entity.full_name)
    .bind(&entity.description)
    .bind(&entity.url)
    .bind(&entity.language)
    .bind(&entity.topics)
    .bind(entity.stars)
    .bind(entity.forks)
    .bind(entity.open_issues)
    .bind(&entity.readme_excerpt)
    .bind(seen_on)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_entity_by_key(
    pool: &PgPool,
    entity: &EntityId,
) -> Result<Option<EntityRow>, DbError> {
    let row = sqlx::query_as::<_, EntityRow>(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_key = $1"
    ))
    .bind(entity.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Entities observed on or after `since`, ordered by key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entities_seen_since(
    pool: &PgPool,
    since: NaiveDate,
) -> Result<Vec<EntityRow>, DbError> {
    let rows = sqlx::query_as::<_, EntityRow>(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities \
         WHERE last_seen_on >= $1 \
         ORDER BY entity_key"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
