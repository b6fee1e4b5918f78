//! Database operations for `mentions`.

use chrono::{DateTime, Utc};
use devbrief_core::{ContentSource, EntityId, ItemKey, MatchBasis, Mention};
use sqlx::PgPool;

use crate::DbError;

/// Mentions of one entity on one source.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MentionCountRow {
    pub entity_key: String,
    pub source: String,
    pub mentions: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MentionRecord {
    entity_key: String,
    source: String,
    external_id: String,
    match_basis: String,
}

impl TryFrom<MentionRecord> for Mention {
    type Error = DbError;

    fn try_from(record: MentionRecord) -> Result<Self, Self::Error> {
        let source: ContentSource = record
            .source
            .parse()
            .map_err(|_| DbError::UnexpectedValue {
                column: "content_items.source",
                value: record.source.clone(),
            })?;
        let basis = match record.match_basis.as_str() {
            "url" => MatchBasis::Url,
            "name" => MatchBasis::Name,
            _ => {
                return Err(DbError::UnexpectedValue {
                    column: "mentions.match_basis",
                    value: record.match_basis,
                })
            }
        };
        Ok(Mention {
            entity: EntityId::new(&record.entity_key),
            item: ItemKey {
                source,
                external_id: record.external_id,
            },
            basis,
        })
    }
}

/// Links an entity to a content item, both identified by their natural keys.
///
/// Returns `true` when a new link was stored and `false` when the pair was
/// already linked or either side is not in the database.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_mention(pool: &PgPool, mention: &Mention) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "INSERT INTO mentions (entity_id, content_item_id, match_basis) \
         SELECT e.id, c.id, $4 \
         FROM entities e, content_items c \
         WHERE e.entity_key = $1 AND c.source = $2 AND c.external_id = $3 \
         ON CONFLICT (entity_id, content_item_id) DO NOTHING",
    )
    .bind(mention.entity.as_str())
    .bind(mention.item.source.as_str())
    .bind(&mention.item.external_id)
    .bind(mention.basis.as_str())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Mentions per entity and source for items seen on or after `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn mention_counts_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<MentionCountRow>, DbError> {
    let rows = sqlx::query_as::<_, MentionCountRow>(
        "SELECT e.entity_key, c.source, COUNT(*) AS mentions \
         FROM mentions m \
         JOIN entities e ON e.id = m.entity_id \
         JOIN content_items c ON c.id = m.content_item_id \
         WHERE c.last_captured_at >= $1 \
         GROUP BY e.entity_key, c.source \
         ORDER BY e.entity_key, c.source",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every mention whose item was seen on or after `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::UnexpectedValue`] for a row with an unknown source or basis.
pub async fn list_mentions_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<Mention>, DbError> {
    let rows = sqlx::query_as::<_, MentionRecord>(
        "SELECT e.entity_key, c.source, c.external_id, m.match_basis \
         FROM mentions m \
         JOIN entities e ON e.id = m.entity_id \
         JOIN content_items c ON c.id = m.content_item_id \
         WHERE c.last_captured_at >= $1 \
         ORDER BY e.entity_key, c.source, c.external_id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Mention::try_from).collect()
}
