//! Shared HTTP plumbing for the source adapters.

use std::time::Duration;

use devbrief_core::AppConfig;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;

/// Client construction and retry settings shared by every adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Upper bound on in-flight requests when an adapter fans out.
    pub max_concurrency: usize,
}

impl HttpSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_secs: config.request_timeout_secs,
            max_retries: config.fetch_max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
            max_concurrency: config.max_concurrent_fetches.max(1),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "devbrief/0.1 (daily-briefing)".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1_000,
            max_concurrency: 8,
        }
    }
}

pub(crate) fn build_client(settings: &HttpSettings) -> Result<Client, SourceError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(&settings.user_agent)
        .build()?)
}

/// Parse a base URL, normalised to end with exactly one slash so that
/// [`Url::join`] appends to it rather than replacing its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, SourceError> {
    base.join(path).map_err(|e| SourceError::InvalidBaseUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

/// Send the request built by `build` (rebuilt for every retry), require a
/// 2xx status and parse the body as `T`.
pub(crate) async fn fetch_json<T, F>(
    settings: &HttpSettings,
    context: &str,
    build: F,
) -> Result<T, SourceError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder + Sync,
{
    let build = &build;
    let body = retry_with_backoff(settings.max_retries, settings.backoff_base_ms, || async move {
        let response = build().send().await?.error_for_status()?;
        Ok::<_, SourceError>(response.text().await?)
    })
    .await?;

    serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Truncate `text` to at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
