use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::EntityId;
use crate::ConfigError;

/// A repository tracked on every run regardless of whether it is trending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedRepo {
    /// `owner/name` as it appears on GitHub.
    pub name: String,
    /// Extra names the repository goes by in discussions, e.g. `"bun"` for
    /// `oven-sh/bun`.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub notes: Option<String>,
}

impl WatchedRepo {
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        EntityId::new(&self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WatchlistFile {
    #[serde(default)]
    pub repos: Vec<WatchedRepo>,
}

impl WatchlistFile {
    /// Aliases declared for `id`, empty when the repo is not watched.
    #[must_use]
    pub fn aliases_for(&self, id: &EntityId) -> &[String] {
        self.repos
            .iter()
            .find(|r| &r.entity_id() == id)
            .map_or(&[], |r| r.aliases.as_slice())
    }
}

/// Load and validate the watchlist from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_watchlist(path: &Path) -> Result<WatchlistFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::WatchlistFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_watchlist(&content)
}

/// Parse and validate watchlist YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the document cannot be parsed or fails validation.
pub fn parse_watchlist(content: &str) -> Result<WatchlistFile, ConfigError> {
    let watchlist: WatchlistFile =
        serde_yaml::from_str(content).map_err(ConfigError::WatchlistFileParse)?;

    validate_watchlist(&watchlist)?;

    Ok(watchlist)
}

fn validate_watchlist(watchlist: &WatchlistFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for repo in &watchlist.repos {
        let name = repo.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "repo name must be non-empty".to_string(),
            ));
        }

        let well_formed = name
            .split_once('/')
            .is_some_and(|(owner, rest)| !owner.is_empty() && !rest.is_empty() && !rest.contains('/'));
        if !well_formed {
            return Err(ConfigError::Validation(format!(
                "repo '{name}' must have the form owner/name"
            )));
        }

        if repo.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "repo '{name}' has an empty alias"
            )));
        }

        if !seen.insert(repo.entity_id()) {
            return Err(ConfigError::Validation(format!(
                "duplicate repo: '{name}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "watchlist_test.rs"]
mod tests;
