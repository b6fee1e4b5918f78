use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;
use devbrief_core::{EntityId, Snapshot};
use serde::Serialize;

/// Result of offering a snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    Inserted,
    /// A snapshot for the same (entity, date) already exists; the stored one
    /// is kept unchanged.
    Duplicate,
}

impl AppendOutcome {
    #[must_use]
    pub fn is_inserted(self) -> bool {
        matches!(self, AppendOutcome::Inserted)
    }
}

/// In-process snapshot history.
///
/// Appends from many threads are serialised behind a lock. The first snapshot
/// recorded for an (entity, date) pair wins; later ones are reported as
/// [`AppendOutcome::Duplicate`] and dropped.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    series: RwLock<HashMap<EntityId, BTreeMap<NaiveDate, Snapshot>>>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, snapshot: Snapshot) -> AppendOutcome {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        let history = series.entry(snapshot.entity.clone()).or_default();
        if history.contains_key(&snapshot.captured_on) {
            return AppendOutcome::Duplicate;
        }
        history.insert(snapshot.captured_on, snapshot);
        AppendOutcome::Inserted
    }

    /// Full history of one entity, oldest first.
    #[must_use]
    pub fn series(&self, entity: &EntityId) -> Vec<Snapshot> {
        self.collect(entity, |_| true)
    }

    /// History of one entity captured on or after `since`, oldest first.
    #[must_use]
    pub fn series_since(&self, entity: &EntityId, since: NaiveDate) -> Vec<Snapshot> {
        self.collect(entity, |date| date >= since)
    }

    #[must_use]
    pub fn latest(&self, entity: &EntityId) -> Option<Snapshot> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(entity)
            .and_then(|history| history.values().next_back().cloned())
    }

    /// Every entity with at least one snapshot, sorted by id.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<EntityId> = series.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, entity: &EntityId, keep: impl Fn(NaiveDate) -> bool) -> Vec<Snapshot> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.get(entity).map_or_else(Vec::new, |history| {
            history
                .values()
                .filter(|s| keep(s.captured_on))
                .cloned()
                .collect()
        })
    }
}
