//! Hacker News adapter over the Firebase item API.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use devbrief_core::{ContentItem, ContentSource};
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::http::{build_client, fetch_json, join, parse_base_url, HttpSettings};

const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0/";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct HnItem {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    by: Option<String>,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    descendants: i64,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

impl HnItem {
    fn is_live_story(&self) -> bool {
        self.kind.as_deref() == Some("story") && !self.dead && !self.deleted && self.title.is_some()
    }

    fn into_content_item(self, captured_at: DateTime<Utc>) -> ContentItem {
        ContentItem {
            source: ContentSource::HackerNews,
            external_id: self.id.to_string(),
            title: self.title.unwrap_or_default(),
            body: self.text.as_deref().map(strip_html).unwrap_or_default(),
            url: self.url,
            permalink: Some(format!("https://news.ycombinator.com/item?id={}", self.id)),
            author: self.by,
            channel: None,
            score: self.score,
            comment_count: self.descendants,
            captured_at,
        }
    }
}

/// Plain text from Hacker News' HTML-ish `text` field.
fn strip_html(html: &str) -> String {
    let with_breaks = html.replace("<p>", "\n");
    TAG_RE
        .replace_all(&with_breaks, "")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

pub struct HackerNewsClient {
    client: Client,
    base_url: Url,
    settings: HttpSettings,
}

impl HackerNewsClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, SourceError> {
        Self::with_base_url(settings, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(settings: &HttpSettings, base_url: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: parse_base_url(base_url)?,
            settings: settings.clone(),
        })
    }

    /// Ids on the front page, in rank order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] or [`SourceError::Deserialize`] when the
    /// listing cannot be fetched.
    pub async fn top_story_ids(&self) -> Result<Vec<u64>, SourceError> {
        let url = join(&self.base_url, "topstories.json")?;
        fetch_json(&self.settings, "HN topstories", || self.client.get(url.clone())).await
    }

    /// One item; `None` when the API returns `null` for an unknown id.
    async fn fetch_item(&self, id: u64) -> Result<Option<HnItem>, SourceError> {
        let url = join(&self.base_url, &format!("item/{id}.json"))?;
        fetch_json(&self.settings, &format!("HN item {id}"), || {
            self.client.get(url.clone())
        })
        .await
    }

    /// The first `limit` front-page stories, highest score first.
    ///
    /// Items are fetched with at most `max_concurrency` requests in flight.
    /// Jobs, polls, dead and deleted items are dropped; an item that fails to
    /// load is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the front-page listing itself fails.
    pub async fn fetch_top_stories(&self, limit: usize) -> Result<Vec<ContentItem>, SourceError> {
        let ids = self.top_story_ids().await?;
        let captured_at = Utc::now();

        let results: Vec<(u64, Result<Option<HnItem>, SourceError>)> =
            stream::iter(ids.into_iter().take(limit))
                .map(|id| async move { (id, self.fetch_item(id).await) })
                .buffer_unordered(self.settings.max_concurrency.max(1))
                .collect()
                .await;

        let mut stories: Vec<ContentItem> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(source = "hacker_news", item = id, error = %e, "item fetch failed");
                    None
                }
            })
            .filter(HnItem::is_live_story)
            .map(|item| item.into_content_item(captured_at))
            .collect();

        stories.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.external_id.cmp(&b.external_id)));
        tracing::debug!(count = stories.len(), "collected Hacker News stories");
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> HnItem {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn only_live_stories_are_kept() {
        assert!(item(serde_json::json!({"id": 1, "type": "story", "title": "t"})).is_live_story());
        assert!(!item(serde_json::json!({"id": 2, "type": "job", "title": "t"})).is_live_story());
        assert!(!item(serde_json::json!({"id": 3, "type": "story", "title": "t", "dead": true})).is_live_story());
        assert!(!item(serde_json::json!({"id": 4, "type": "story", "deleted": true})).is_live_story());
    }

    #[test]
    fn story_maps_to_content_item() {
        let now = Utc::now();
        let content = item(serde_json::json!({
            "id": 42,
            "type": "story",
            "by": "pg",
            "title": "Show HN: uv is fast",
            "url": "https://github.com/astral-sh/uv",
            "score": 321,
            "descendants": 88,
            "time": 1_700_000_000
        }))
        .into_content_item(now);

        assert_eq!(content.source, ContentSource::HackerNews);
        assert_eq!(content.external_id, "42");
        assert_eq!(content.permalink.as_deref(), Some("https://news.ycombinator.com/item?id=42"));
        assert_eq!(content.score, 321);
        assert_eq!(content.comment_count, 88);
        assert!(content.body.is_empty());
        assert_eq!(content.captured_at, now);
    }

    #[test]
    fn html_is_stripped_from_text() {
        assert_eq!(
            strip_html("I built <i>this</i> in Rust.<p>See <a href=\"x\">here</a> &amp; enjoy"),
            "I built this in Rust.\nSee here & enjoy"
        );
    }
}
