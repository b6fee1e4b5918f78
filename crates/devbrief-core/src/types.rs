use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stable external key of a tracked repository: `owner/name`, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Normalise a GitHub full name into an entity key.
    #[must_use]
    pub fn new(full_name: &str) -> Self {
        Self(full_name.trim().trim_matches('/').to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The owner segment, or the whole key when it has no `/`.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(owner, _)| owner)
    }

    /// The repository segment, or the whole key when it has no `/`.
    #[must_use]
    pub fn repo(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, repo)| repo)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A tracked repository as observed by the most recent collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Full name with the original casing, e.g. `"tokio-rs/tokio"`.
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: Option<i64>,
    /// First ~2000 characters of the README, when fetched.
    pub readme_excerpt: Option<String>,
    /// Set once the entity has been persisted.
    pub first_seen_on: Option<NaiveDate>,
}

impl Entity {
    /// Point-in-time reading of this entity's current metrics.
    #[must_use]
    pub fn snapshot(&self, captured_on: NaiveDate) -> Snapshot {
        Snapshot {
            entity: self.id.clone(),
            captured_on,
            stars: self.stars,
            forks: self.forks,
            open_issues: self.open_issues,
        }
    }
}

/// One dated popularity reading for an entity. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity: EntityId,
    pub captured_on: NaiveDate,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    HackerNews,
    Reddit,
}

impl ContentSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentSource::HackerNews => "hacker_news",
            ContentSource::Reddit => "reddit",
        }
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hacker_news" => Ok(ContentSource::HackerNews),
            "reddit" => Ok(ContentSource::Reddit),
            other => Err(format!("unknown content source '{other}'")),
        }
    }
}

/// Identity of a content item: the platform plus the platform's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub source: ContentSource,
    pub external_id: String,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.external_id)
    }
}

/// A forum story or social post captured during a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub source: ContentSource,
    pub external_id: String,
    pub title: String,
    /// Self text / story text. Empty for plain link posts.
    pub body: String,
    pub url: Option<String>,
    /// Link to the discussion thread on the source platform.
    pub permalink: Option<String>,
    pub author: Option<String>,
    /// Subreddit for Reddit posts; `None` for Hacker News.
    pub channel: Option<String>,
    pub score: i64,
    pub comment_count: i64,
    pub captured_at: DateTime<Utc>,
}

impl ContentItem {
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            source: self.source,
            external_id: self.external_id.clone(),
        }
    }

    /// Title and body joined, the text scanned for entity names.
    #[must_use]
    pub fn text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}

/// How a mention was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    /// The item links to `github.com/<owner>/<name>`.
    Url,
    /// A cataloged name occurs in the item text on word boundaries.
    Name,
}

impl MatchBasis {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchBasis::Url => "url",
            MatchBasis::Name => "name",
        }
    }
}

impl fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association between a content item and an entity it references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub entity: EntityId,
    pub item: ItemKey,
    pub basis: MatchBasis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_is_normalised() {
        let id = EntityId::new(" Tokio-RS/Tokio/ ");
        assert_eq!(id.as_str(), "tokio-rs/tokio");
        assert_eq!(id.owner(), "tokio-rs");
        assert_eq!(id.repo(), "tokio");
    }

    #[test]
    fn entity_id_without_owner() {
        let id = EntityId::new("serde");
        assert_eq!(id.owner(), "serde");
        assert_eq!(id.repo(), "serde");
    }

    #[test]
    fn content_source_round_trips_through_str() {
        for source in [ContentSource::HackerNews, ContentSource::Reddit] {
            assert_eq!(source.as_str().parse::<ContentSource>().unwrap(), source);
        }
        assert!("twitter".parse::<ContentSource>().is_err());
    }

    #[test]
    fn item_text_skips_empty_body() {
        let item = ContentItem {
            source: ContentSource::HackerNews,
            external_id: "1".to_string(),
            title: "Show HN: a thing".to_string(),
            body: String::new(),
            url: None,
            permalink: None,
            author: None,
            channel: None,
            score: 10,
            comment_count: 2,
            captured_at: Utc::now(),
        };
        assert_eq!(item.text(), "Show HN: a thing");
        assert_eq!(item.key().to_string(), "hacker_news:1");
    }
}
