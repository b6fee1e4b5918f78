//! Reddit adapter: hot listings per subreddit.
//!
//! With client credentials the adapter exchanges them for an app-only OAuth
//! token and reads from `oauth.reddit.com`; without them it falls back to the
//! public `.json` listings, which are more aggressively rate limited.

use chrono::{DateTime, Utc};
use devbrief_core::{ContentItem, ContentSource};
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::http::{build_client, fetch_json, join, parse_base_url, truncate_chars, HttpSettings};

const PUBLIC_BASE_URL: &str = "https://www.reddit.com/";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com/";
const SELFTEXT_MAX_CHARS: usize = 1500;

/// App credentials for the client-credentials grant.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl RedditCredentials {
    /// Credentials when both halves are configured.
    #[must_use]
    pub fn from_parts(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        Some(Self {
            client_id: client_id?.to_owned(),
            client_secret: client_secret?.to_owned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    url: Option<String>,
    permalink: Option<String>,
    author: Option<String>,
    subreddit: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    is_self: bool,
}

impl PostData {
    fn into_content_item(self, fallback_channel: &str, captured_at: DateTime<Utc>) -> ContentItem {
        ContentItem {
            source: ContentSource::Reddit,
            external_id: self.id,
            title: self.title,
            body: truncate_chars(self.selftext.trim(), SELFTEXT_MAX_CHARS),
            url: if self.is_self { None } else { self.url },
            permalink: self.permalink.map(|p| format!("https://reddit.com{p}")),
            author: self.author.filter(|a| a != "[deleted]"),
            channel: Some(self.subreddit.unwrap_or_else(|| fallback_channel.to_string())),
            score: self.score,
            comment_count: self.num_comments,
            captured_at,
        }
    }
}

pub struct RedditClient {
    client: Client,
    listing_base: Url,
    token: Option<String>,
    settings: HttpSettings,
}

impl RedditClient {
    /// Connect to Reddit, authenticating when `credentials` are given.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::RedditAuth`] if the token exchange is rejected
    /// and [`SourceError::Http`] on network failure.
    pub async fn connect(
        credentials: Option<&RedditCredentials>,
        settings: &HttpSettings,
    ) -> Result<Self, SourceError> {
        let listing_base = if credentials.is_some() {
            OAUTH_BASE_URL
        } else {
            PUBLIC_BASE_URL
        };
        Self::connect_with_base_urls(credentials, settings, listing_base, PUBLIC_BASE_URL).await
    }

    /// Like [`RedditClient::connect`] with explicit listing and token
    /// endpoints (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Same as [`RedditClient::connect`], plus [`SourceError::InvalidBaseUrl`].
    pub async fn connect_with_base_urls(
        credentials: Option<&RedditCredentials>,
        settings: &HttpSettings,
        listing_base: &str,
        auth_base: &str,
    ) -> Result<Self, SourceError> {
        let client = build_client(settings)?;
        let listing_base = parse_base_url(listing_base)?;
        let auth_base = parse_base_url(auth_base)?;

        let token = match credentials {
            Some(credentials) => Some(fetch_token(&client, &auth_base, credentials).await?),
            None => {
                tracing::debug!("no Reddit credentials configured; using public listings");
                None
            }
        };

        Ok(Self {
            client,
            listing_base,
            token,
            settings: settings.clone(),
        })
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn hot_url(&self, subreddit: &str, limit: u32) -> Result<Url, SourceError> {
        let path = if self.is_authenticated() {
            format!("r/{subreddit}/hot")
        } else {
            format!("r/{subreddit}/hot.json")
        };
        let mut url = join(&self.listing_base, &path)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("raw_json", "1");
        Ok(url)
    }

    fn request(&self, url: &Url) -> RequestBuilder {
        let builder = self.client.get(url.clone());
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Non-stickied posts from the subreddit's hot listing.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] or [`SourceError::Deserialize`] when the
    /// listing cannot be read.
    pub async fn fetch_hot(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, SourceError> {
        let url = self.hot_url(subreddit, limit)?;
        let listing: Listing = fetch_json(&self.settings, &format!("r/{subreddit} hot"), || {
            self.request(&url)
        })
        .await?;

        let captured_at = Utc::now();
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.stickied)
            .map(|post| post.into_content_item(subreddit, captured_at))
            .collect())
    }

    /// Hot posts from every subreddit in order. A subreddit that fails is
    /// logged and skipped.
    pub async fn fetch_subreddits(&self, subreddits: &[String], limit: u32) -> Vec<ContentItem> {
        let mut posts = Vec::new();
        for subreddit in subreddits {
            match self.fetch_hot(subreddit, limit).await {
                Ok(found) => {
                    tracing::debug!(subreddit = %subreddit, count = found.len(), "collected Reddit posts");
                    posts.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        source = "reddit",
                        subreddit = %subreddit,
                        error = %e,
                        "subreddit fetch failed"
                    );
                }
            }
        }
        posts
    }
}

async fn fetch_token(
    client: &Client,
    auth_base: &Url,
    credentials: &RedditCredentials,
) -> Result<String, SourceError> {
    let url = join(auth_base, "api/v1/access_token")?;
    let response = client
        .post(url)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(SourceError::RedditAuth(format!(
            "token exchange failed with status {}",
            response.status()
        )));
    }

    let body = response.text().await?;
    let token: TokenResponse =
        serde_json::from_str(&body).map_err(|e| SourceError::RedditAuth(format!("token parse error: {e}")))?;
    Ok(token.access_token)
}
