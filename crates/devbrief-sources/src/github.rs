//! GitHub REST adapter: trending search, per-repo metrics, topics and README
//! excerpts.

use chrono::NaiveDate;
use devbrief_core::{Entity, EntityId, WatchlistFile};
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::http::{build_client, fetch_json, join, parse_base_url, truncate_chars, HttpSettings};
use crate::retry::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const README_MAX_CHARS: usize = 2000;
const SEARCH_MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoPayload>,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    full_name: String,
    description: Option<String>,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    stargazers_count: i64,
    forks_count: i64,
    open_issues_count: Option<i64>,
}

impl RepoPayload {
    fn into_entity(self) -> Entity {
        Entity {
            id: EntityId::new(&self.full_name),
            full_name: self.full_name,
            description: self.description.filter(|d| !d.trim().is_empty()),
            url: self.html_url,
            language: self.language,
            topics: self.topics,
            stars: self.stargazers_count,
            forks: self.forks_count,
            open_issues: self.open_issues_count,
            readme_excerpt: None,
            first_seen_on: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    #[serde(default)]
    names: Vec<String>,
}

/// Client for the GitHub REST API.
///
/// Sends a bearer token when one is configured; unauthenticated requests work
/// but hit the much lower anonymous rate limit.
pub struct GithubClient {
    client: Client,
    token: Option<String>,
    base_url: Url,
    settings: HttpSettings,
}

impl GithubClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(token: Option<&str>, settings: &HttpSettings) -> Result<Self, SourceError> {
        Self::with_base_url(token, settings, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`SourceError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        token: Option<&str>,
        settings: &HttpSettings,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(settings)?,
            token: token.map(str::to_owned),
            base_url: parse_base_url(base_url)?,
            settings: settings.clone(),
        })
    }

    fn request(&self, url: &Url, accept: &'static str) -> RequestBuilder {
        let builder = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn search_url(&self, created_after: NaiveDate, limit: u32) -> Result<Url, SourceError> {
        let mut url = join(&self.base_url, "search/repositories")?;
        url.query_pairs_mut()
            .append_pair("q", &format!("created:>{}", created_after.format("%Y-%m-%d")))
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &limit.clamp(1, SEARCH_MAX_PER_PAGE).to_string());
        Ok(url)
    }

    /// Most-starred repositories created after `created_after`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] on network failure or a non-2xx status
    /// and [`SourceError::Deserialize`] if the body is not a search result.
    pub async fn search_trending(
        &self,
        created_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Entity>, SourceError> {
        let url = self.search_url(created_after, limit)?;
        let response: SearchResponse = fetch_json(&self.settings, "GitHub search", || {
            self.request(&url, "application/vnd.github+json")
        })
        .await?;

        Ok(response
            .items
            .into_iter()
            .take(limit as usize)
            .map(RepoPayload::into_entity)
            .collect())
    }

    /// Current metrics for one repository.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] on network failure or a non-2xx status
    /// (including 404 for a renamed or deleted repository) and
    /// [`SourceError::Deserialize`] on an unexpected body.
    pub async fn fetch_repo(&self, full_name: &str) -> Result<Entity, SourceError> {
        let url = join(&self.base_url, &format!("repos/{full_name}"))?;
        let repo: RepoPayload = fetch_json(&self.settings, &format!("repo {full_name}"), || {
            self.request(&url, "application/vnd.github+json")
        })
        .await?;
        Ok(repo.into_entity())
    }

    /// # Errors
    ///
    /// Same as [`GithubClient::fetch_repo`].
    pub async fn fetch_topics(&self, full_name: &str) -> Result<Vec<String>, SourceError> {
        let url = join(&self.base_url, &format!("repos/{full_name}/topics"))?;
        let topics: TopicsResponse =
            fetch_json(&self.settings, &format!("topics {full_name}"), || {
                self.request(&url, "application/vnd.github+json")
            })
            .await?;
        Ok(topics.names)
    }

    /// First [`README_MAX_CHARS`] characters of the README, or `None` when the
    /// repository has none.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] on network failure or a non-2xx status
    /// other than 404.
    pub async fn fetch_readme(&self, full_name: &str) -> Result<Option<String>, SourceError> {
        let url = join(&self.base_url, &format!("repos/{full_name}/readme"))?;
        let url = &url;
        retry_with_backoff(self.settings.max_retries, self.settings.backoff_base_ms, || async move {
            let response = self.request(url, "application/vnd.github.raw+json").send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let text = response.error_for_status()?.text().await?;
            Ok::<_, SourceError>(Some(truncate_chars(&text, README_MAX_CHARS)))
        })
        .await
    }

    /// Trending repositories plus every watchlist repository, enriched with
    /// topics and a README excerpt.
    ///
    /// Trending results come first in search order, followed by watchlist
    /// repositories that were not already among them. A failed search or a
    /// failed watchlist lookup is logged and skipped; so is a failed
    /// enrichment call, which leaves that field empty.
    pub async fn collect_entities(
        &self,
        watchlist: &WatchlistFile,
        created_after: NaiveDate,
        limit: u32,
    ) -> Vec<Entity> {
        let mut entities = match self.search_trending(created_after, limit).await {
            Ok(found) => {
                tracing::info!(count = found.len(), %created_after, "fetched trending repositories");
                found
            }
            Err(e) => {
                tracing::warn!(source = "github", error = %e, "trending search failed");
                Vec::new()
            }
        };

        let missing: Vec<&str> = watchlist
            .repos
            .iter()
            .filter(|repo| !entities.iter().any(|e| e.id == repo.entity_id()))
            .map(|repo| repo.name.as_str())
            .collect();

        let lookups: Vec<_> = missing
            .into_iter()
            .map(|name| {
                async move {
                    self.fetch_repo(name)
                        .await
                        .map_err(|e| (name.to_string(), e))
                }
                .boxed()
            })
            .collect();
        let watched: Vec<Result<Entity, (String, SourceError)>> = stream::iter(lookups)
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        for result in watched {
            match result {
                Ok(entity) => entities.push(entity),
                Err((name, e)) => {
                    tracing::warn!(repo = %name, error = %e, "watchlist repository lookup failed");
                }
            }
        }

        stream::iter(entities)
            .map(|entity| self.enrich(entity))
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn enrich(&self, mut entity: Entity) -> Entity {
        if entity.topics.is_empty() {
            match self.fetch_topics(&entity.full_name).await {
                Ok(topics) => entity.topics = topics,
                Err(e) => tracing::debug!(entity = %entity.id, error = %e, "topics fetch failed"),
            }
        }
        match self.fetch_readme(&entity.full_name).await {
            Ok(readme) => entity.readme_excerpt = readme,
            Err(e) => tracing::warn!(entity = %entity.id, error = %e, "README fetch failed"),
        }
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GithubClient {
        GithubClient::with_base_url(None, &HttpSettings::default(), "https://api.github.com")
            .expect("client construction should not fail")
    }

    #[test]
    fn search_url_encodes_created_filter() {
        let url = test_client()
            .search_url(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 10)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/search/repositories?q=created%3A%3E2025-03-01&sort=stars&order=desc&per_page=10"
        );
    }

    #[test]
    fn search_url_caps_page_size() {
        let url = test_client()
            .search_url(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 500)
            .unwrap();
        assert!(url.as_str().ends_with("per_page=100"));
    }

    #[test]
    fn payload_maps_to_entity_with_normalised_id() {
        let payload: RepoPayload = serde_json::from_value(serde_json::json!({
            "full_name": "Tokio-RS/Tokio",
            "description": "  ",
            "html_url": "https://github.com/tokio-rs/tokio",
            "language": "Rust",
            "stargazers_count": 27000,
            "forks_count": 2500,
            "open_issues_count": 300
        }))
        .unwrap();
        let entity = payload.into_entity();
        assert_eq!(entity.id.as_str(), "tokio-rs/tokio");
        assert_eq!(entity.full_name, "Tokio-RS/Tokio");
        assert!(entity.description.is_none());
        assert!(entity.topics.is_empty());
        assert_eq!(entity.stars, 27000);
    }
}
