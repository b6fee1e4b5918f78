use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use devbrief_core::{ContentItem, ContentSource, Entity, EntityId, ItemKey, MatchBasis, Mention, WatchlistFile};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

static GITHUB_REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)github\.com/([a-z0-9_.-]+/[a-z0-9_.-]+)").expect("valid github repo regex")
});

/// Names by which one entity can be recognised in free text.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: EntityId,
    /// Lower-cased, de-duplicated, in insertion order.
    pub names: Vec<String>,
}

impl CatalogEntry {
    /// Entry matching the full `owner/name` and the bare repository name.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        let full_name = id.as_str().to_string();
        let repo = id.repo().to_string();
        let mut entry = Self {
            id,
            names: Vec::new(),
        };
        entry.add_name(&full_name);
        entry.add_name(&repo);
        entry
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            self.add_name(alias.as_ref());
        }
        self
    }

    fn add_name(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !self.names.contains(&name) {
            self.names.push(name);
        }
    }
}

/// Read-only set of entities the linker can attribute mentions to.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<EntityId, usize>,
}

impl EntityCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from tracked entities, attaching watchlist aliases.
    #[must_use]
    pub fn from_entities(entities: &[Entity], watchlist: &WatchlistFile) -> Self {
        let mut catalog = Self::new();
        for entity in entities {
            catalog.insert(
                CatalogEntry::new(entity.id.clone()).with_aliases(watchlist.aliases_for(&entity.id)),
            );
        }
        catalog
    }

    /// Add an entry. Names of an entity already present are merged into it.
    pub fn insert(&mut self, entry: CatalogEntry) {
        if let Some(&pos) = self.index.get(&entry.id) {
            let existing = &mut self.entries[pos];
            for name in entry.names {
                existing.add_name(&name);
            }
            return;
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Associate content items with the cataloged entities they reference.
///
/// Each distinct (entity, item) pair yields one [`Mention`]. A
/// `github.com/owner/name` link gives basis [`MatchBasis::Url`]; otherwise a
/// name occurring on word boundaries in the title or body gives
/// [`MatchBasis::Name`]. Output follows item order, then catalog order.
#[must_use]
pub fn link(items: &[ContentItem], catalog: &EntityCatalog) -> Vec<Mention> {
    let per_item: Vec<Vec<Mention>> = items
        .par_iter()
        .map(|item| link_item(item, catalog))
        .collect();

    let mut mentions: Vec<Mention> = Vec::new();
    let mut seen: HashMap<(EntityId, ItemKey), usize> = HashMap::new();
    for mention in per_item.into_iter().flatten() {
        let key = (mention.entity.clone(), mention.item.clone());
        match seen.get(&key) {
            Some(&pos) => {
                if mention.basis == MatchBasis::Url {
                    mentions[pos].basis = MatchBasis::Url;
                }
            }
            None => {
                seen.insert(key, mentions.len());
                mentions.push(mention);
            }
        }
    }
    mentions
}

fn link_item(item: &ContentItem, catalog: &EntityCatalog) -> Vec<Mention> {
    let text = item.text();
    let haystack = text.to_lowercase();

    let linked_repos: HashSet<EntityId> = item
        .url
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(text.as_str()))
        .flat_map(github_repos_in)
        .collect();

    let key = item.key();
    catalog
        .entries
        .iter()
        .filter_map(|entry| {
            let basis = if linked_repos.contains(&entry.id) {
                MatchBasis::Url
            } else if entry.names.iter().any(|name| contains_word(&haystack, name)) {
                MatchBasis::Name
            } else {
                return None;
            };
            Some(Mention {
                entity: entry.id.clone(),
                item: key.clone(),
                basis,
            })
        })
        .collect()
}

fn github_repos_in(text: &str) -> Vec<EntityId> {
    GITHUB_REPO_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| normalize_repo_path(m.as_str())))
        .collect()
}

/// Extract `owner/name` from a GitHub URL, if it points at a repository.
///
/// Trailing `.git`, `.md` and `.html` suffixes are stripped.
#[must_use]
pub fn extract_github_repo(url: &str) -> Option<EntityId> {
    GITHUB_REPO_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalize_repo_path(m.as_str()))
}

fn normalize_repo_path(path: &str) -> Option<EntityId> {
    let mut path = path.trim_end_matches('.');
    for suffix in [".git", ".md", ".html"] {
        if let Some(stripped) = path.strip_suffix(suffix) {
            path = stripped;
        }
    }
    let (owner, name) = path.split_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(EntityId::new(path))
}

/// True when `needle` occurs in `haystack` with no word character directly
/// before or after it. Both arguments must already be lower-cased.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Mention totals for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MentionCounts {
    pub hacker_news: u32,
    pub reddit: u32,
}

impl MentionCounts {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.hacker_news + self.reddit
    }

    pub fn record(&mut self, source: ContentSource) {
        match source {
            ContentSource::HackerNews => self.hacker_news += 1,
            ContentSource::Reddit => self.reddit += 1,
        }
    }
}

/// Fold mentions into per-entity, per-source counts.
#[must_use]
pub fn mention_counts(mentions: &[Mention]) -> BTreeMap<EntityId, MentionCounts> {
    let mut counts: BTreeMap<EntityId, MentionCounts> = BTreeMap::new();
    for mention in mentions {
        counts
            .entry(mention.entity.clone())
            .or_default()
            .record(mention.item.source);
    }
    counts
}

#[cfg(test)]
#[path = "linker_test.rs"]
mod tests;
