//! Database operations for `content_items`.

use chrono::{DateTime, Utc};
use devbrief_core::{ContentItem, ContentSource};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub author: Option<String>,
    pub channel: Option<String>,
    pub score: i64,
    pub comment_count: i64,
    pub first_captured_at: DateTime<Utc>,
    pub last_captured_at: DateTime<Utc>,
}

impl ContentItemRow {
    /// # Errors
    ///
    /// Returns [`DbError::UnexpectedValue`] if `source` is not a known
    /// content source.
    pub fn into_content_item(self) -> Result<ContentItem, DbError> {
        let source: ContentSource =
            self.source
                .parse()
                .map_err(|_| DbError::UnexpectedValue {
                    column: "content_items.source",
                    value: self.source.clone(),
                })?;
        Ok(ContentItem {
            source,
            external_id: self.external_id,
            title: self.title,
            body: self.body,
            url: self.url,
            permalink: self.permalink,
            author: self.author,
            channel: self.channel,
            score: self.score,
            comment_count: self.comment_count,
            captured_at: self.last_captured_at,
        })
    }
}

/// Inserts a content item or refreshes its engagement.
///
/// Conflicts on `(source, external_id)` update the title, body, score and
/// comment count and advance `last_captured_at`. Returns the internal `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_content_item(pool: &PgPool, item: &ContentItem) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO content_items \
             (source, external_id, title, body, url, permalink, author, channel, \
              score, comment_count, first_captured_at, last_captured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
         ON CONFLICT (source, external_id) DO UPDATE SET \
             title            = EXCLUDED.title, \
             body             = EXCLUDED.body, \
             url              = EXCLUDED.url, \
             score            = EXCLUDED.score, \
             comment_count    = EXCLUDED.comment_count, \
             last_captured_at = GREATEST(content_items.last_captured_at, EXCLUDED.last_captured_at) \
         RETURNING id",
    )
    .bind(item.source.as_str())
    .bind(&item.external_id)
    .bind(&item.title)
    .bind(&item.body)
    .bind(&item.url)
    .bind(&item.permalink)
    .bind(&item.author)
    .bind(&item.channel)
    .bind(item.score)
    .bind(item.comment_count)
    .bind(item.captured_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Items seen on or after `since`, highest score first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::UnexpectedValue`] for a row with an unknown source.
pub async fn list_content_items_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<ContentItem>, DbError> {
    let rows = sqlx::query_as::<_, ContentItemRow>(
        "SELECT id, source, external_id, title, body, url, permalink, author, channel, \
                score, comment_count, first_captured_at, last_captured_at \
         FROM content_items \
         WHERE last_captured_at >= $1 \
         ORDER BY score DESC, id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ContentItemRow::into_content_item).collect()
}
