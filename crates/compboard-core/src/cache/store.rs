use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::snapshot::{truncate_to_millis, PersistedSnapshot};
use super::{Catalogue, CategoryErrors, LocalStorage, Snapshot};
use crate::models::ResultRow;
use crate::utils::format_age;

/// Durable key holding the full snapshot
pub const CACHE_KEY: &str = "school_competition_cache";

/// Durable key holding only the version tag, for cheap invalidation checks
pub const VERSION_KEY: &str = "school_competition_cache_version";

/// Owner of the process-wide snapshot and its durable mirror.
///
/// Constructed once by the composition root and handed to the manager; no
/// ambient global.
pub struct CacheStore {
    snapshot: Snapshot,
    ttl: Duration,
    version: String,
    storage: Option<LocalStorage>,
}

impl CacheStore {
    pub fn new(storage: LocalStorage, ttl: Duration, version: impl Into<String>) -> Self {
        Self {
            snapshot: Snapshot::default(),
            ttl,
            version: version.into(),
            storage: Some(storage),
        }
    }

    /// A store without a durable mirror; `persist` and `restore` are no-ops.
    pub fn in_memory(ttl: Duration, version: impl Into<String>) -> Self {
        Self {
            snapshot: Snapshot::default(),
            ttl,
            version: version.into(),
            storage: None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Loaded, and younger than the TTL at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot.loaded
            && self
                .snapshot
                .last_updated
                .map(|updated| now - updated < self.ttl)
                .unwrap_or(false)
    }

    /// Overwrite the whole snapshot and mark it loaded.
    pub fn replace_all(
        &mut self,
        catalogue: Catalogue,
        results: HashMap<String, Vec<ResultRow>>,
        timestamp: DateTime<Utc>,
    ) {
        self.snapshot = Snapshot {
            catalogue: Some(catalogue),
            results,
            last_updated: Some(truncate_to_millis(timestamp)),
            loaded: true,
        };
    }

    /// Record a preload in which every catalogue failed.
    ///
    /// Previously loaded data stays readable, but the snapshot stops counting
    /// as valid so the next initialization goes back to the network.
    pub fn mark_failed(&mut self, errors: CategoryErrors) {
        let catalogue = self.snapshot.catalogue.get_or_insert_with(Catalogue::default);
        catalogue.errors = errors;
        self.snapshot.loaded = false;
    }

    /// Cache one competition's rows fetched on demand.
    pub fn insert_results(&mut self, competition_id: &str, rows: Vec<ResultRow>) {
        self.snapshot.results.insert(competition_id.to_string(), rows);
    }

    /// Drop cached result rows, keeping the catalogue.
    pub fn clear_results(&mut self) {
        self.snapshot.results.clear();
    }

    /// Null every field and unset loaded.
    pub fn clear(&mut self) {
        self.snapshot = Snapshot::default();
    }

    /// Write the snapshot to durable storage. Failures are logged, never returned.
    pub fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let (Some(catalogue), Some(last_updated)) =
            (&self.snapshot.catalogue, self.snapshot.last_updated)
        else {
            debug!("Nothing to persist, snapshot is empty");
            return;
        };

        let persisted = PersistedSnapshot {
            competitions: catalogue.clone(),
            results: self
                .snapshot
                .results
                .iter()
                .map(|(id, rows)| (id.clone(), rows.clone()))
                .collect(),
            last_updated,
            version: self.version.clone(),
        };

        if let Err(e) = storage.set(CACHE_KEY, &persisted) {
            warn!(error = %e, "Failed to persist snapshot");
            return;
        }
        if let Err(e) = storage.set(VERSION_KEY, &self.version) {
            warn!(error = %e, "Failed to persist cache version");
            return;
        }
        debug!(competitions = catalogue.len(), "Snapshot persisted");
    }

    /// Repopulate memory from durable storage.
    ///
    /// Returns false ("not found") when nothing is stored, the version tag
    /// differs from ours, the stored copy is older than the TTL, or it cannot
    /// be read. Memory is only touched on success.
    pub fn restore(&mut self) -> bool {
        self.restore_at(Utc::now())
    }

    pub fn restore_at(&mut self, now: DateTime<Utc>) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };

        match storage.get::<String>(VERSION_KEY) {
            Ok(Some(version)) if version == self.version => {}
            Ok(Some(version)) => {
                debug!(stored = %version, current = %self.version, "Durable cache version mismatch");
                return false;
            }
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read cache version");
                return false;
            }
        }

        let persisted = match storage.get::<PersistedSnapshot>(CACHE_KEY) {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read durable snapshot");
                return false;
            }
        };

        if persisted.version != self.version {
            debug!(stored = %persisted.version, "Durable snapshot version mismatch");
            return false;
        }
        if now - persisted.last_updated >= self.ttl {
            debug!(last_updated = %persisted.last_updated, "Durable snapshot expired");
            return false;
        }

        self.snapshot = Snapshot {
            catalogue: Some(persisted.competitions),
            results: persisted.results.into_iter().collect(),
            last_updated: Some(persisted.last_updated),
            loaded: true,
        };
        info!("Snapshot restored from durable storage");
        true
    }

    /// Clear memory and delete the durable copy.
    pub fn purge(&mut self) {
        self.clear();
        if let Some(storage) = &self.storage {
            for key in [CACHE_KEY, VERSION_KEY] {
                if let Err(e) = storage.remove(key) {
                    warn!(key, error = %e, "Failed to remove durable cache entry");
                }
            }
        }
    }

    /// "5m ago" style age of the snapshot, or "never".
    pub fn age_display(&self) -> String {
        match self.snapshot.last_updated {
            Some(updated) => format_age((Utc::now() - updated).num_minutes()),
            None => "never".to_string(),
        }
    }
}
