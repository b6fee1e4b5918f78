//! One collection pass across every source.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use devbrief_core::{AppConfig, ContentItem, Entity, WatchlistFile};

use crate::error::SourceError;
use crate::github::GithubClient;
use crate::hacker_news::HackerNewsClient;
use crate::http::HttpSettings;
use crate::reddit::{RedditClient, RedditCredentials};

/// How much to pull from each source in one pass.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub trending_window_days: u32,
    pub trending_limit: u32,
    pub hn_story_limit: usize,
    pub reddit_subreddits: Vec<String>,
    pub reddit_post_limit: u32,
}

impl CollectionPlan {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            trending_window_days: config.trending_window_days,
            trending_limit: config.trending_limit,
            hn_story_limit: config.hn_story_limit,
            reddit_subreddits: config.reddit_subreddits.clone(),
            reddit_post_limit: config.reddit_post_limit,
        }
    }

    /// Repositories created after this date count as trending on `today`.
    #[must_use]
    pub fn created_after(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(self.trending_window_days))
    }
}

/// Ready-to-use clients for every source.
pub struct SourceClients {
    pub github: GithubClient,
    pub hacker_news: HackerNewsClient,
    /// `None` when Reddit could not be reached at start-up.
    pub reddit: Option<RedditClient>,
}

impl SourceClients {
    /// Build every client from configuration.
    ///
    /// A Reddit connection failure (for example rejected credentials) is
    /// logged and leaves `reddit` unset so the other sources still run.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if an HTTP client cannot be constructed.
    pub async fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let settings = HttpSettings::from_config(config);
        let github = GithubClient::new(config.github_token.as_deref(), &settings)?;
        let hacker_news = HackerNewsClient::new(&settings)?;

        let credentials = RedditCredentials::from_parts(
            config.reddit_client_id.as_deref(),
            config.reddit_client_secret.as_deref(),
        );
        let reddit = match RedditClient::connect(credentials.as_ref(), &settings).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(source = "reddit", error = %e, "Reddit client unavailable");
                None
            }
        };

        Ok(Self {
            github,
            hacker_news,
            reddit,
        })
    }
}

/// Everything gathered by one pass.
#[derive(Debug, Default)]
pub struct Collected {
    pub entities: Vec<Entity>,
    pub items: Vec<ContentItem>,
}

/// Hacker News stories followed by Reddit posts, de-duplicated by item key.
///
/// A failing source contributes nothing; the failure is logged.
pub async fn collect_content(
    hacker_news: &HackerNewsClient,
    reddit: Option<&RedditClient>,
    plan: &CollectionPlan,
) -> Vec<ContentItem> {
    let hn = async {
        match hacker_news.fetch_top_stories(plan.hn_story_limit).await {
            Ok(stories) => stories,
            Err(e) => {
                tracing::warn!(source = "hacker_news", error = %e, "Hacker News fetch failed");
                Vec::new()
            }
        }
    };
    let posts = async {
        match reddit {
            Some(client) => {
                client
                    .fetch_subreddits(&plan.reddit_subreddits, plan.reddit_post_limit)
                    .await
            }
            None => Vec::new(),
        }
    };

    let (mut items, posts) = tokio::join!(hn, posts);
    items.extend(posts);
    dedup_items(items)
}

/// Entities from GitHub and content from the forums, fetched concurrently.
pub async fn collect_all(
    clients: &SourceClients,
    watchlist: &WatchlistFile,
    plan: &CollectionPlan,
    today: NaiveDate,
) -> Collected {
    let (entities, items) = tokio::join!(
        clients
            .github
            .collect_entities(watchlist, plan.created_after(today), plan.trending_limit),
        collect_content(&clients.hacker_news, clients.reddit.as_ref(), plan),
    );
    tracing::info!(
        entities = entities.len(),
        items = items.len(),
        "collection pass complete"
    );
    Collected { entities, items }
}

/// Keep the first occurrence of each `(source, external_id)`.
#[must_use]
pub fn dedup_items(mut items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.key()));
    items
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use devbrief_core::ContentSource;

    use super::*;

    fn item(source: ContentSource, id: &str, title: &str) -> ContentItem {
        ContentItem {
            source,
            external_id: id.to_string(),
            title: title.to_string(),
            body: String::new(),
            url: None,
            permalink: None,
            author: None,
            channel: None,
            score: 1,
            comment_count: 0,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_per_source_and_id() {
        let items = vec![
            item(ContentSource::HackerNews, "1", "first"),
            item(ContentSource::Reddit, "1", "same id, other source"),
            item(ContentSource::HackerNews, "1", "duplicate"),
        ];
        let deduped = dedup_items(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].source, ContentSource::Reddit);
    }

    #[test]
    fn created_after_subtracts_window() {
        let plan = CollectionPlan {
            trending_window_days: 7,
            trending_limit: 10,
            hn_story_limit: 50,
            reddit_subreddits: vec![],
            reddit_post_limit: 10,
        };
        assert_eq!(
            plan.created_after(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }
}
