//! Competition data orchestration.
//!
//! `CompetitionManager` decides between cached and fresh data, runs the bulk
//! preload, and serves normalized views to the presentation layer. All
//! snapshot mutation goes through it; readers get owned copies.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::{ApiError, CompetitionSource};
use crate::cache::{CacheStore, Catalogue, CategoryErrors};
use crate::models::{
    group_by_level, normalize_competitions, normalize_results, Category, Competition,
    LevelSection, ResultRow,
};
use crate::stats::Statistics;
use crate::utils::contains_ignore_case;

/// The cache store as shared between the composition root and the manager.
pub type SharedStore = Arc<RwLock<CacheStore>>;

/// Where `initialize` got its data from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitSource {
    /// The in-memory snapshot was still valid
    Memory,
    /// Restored from durable storage
    Durable,
    /// A network preload ran (or was already running)
    Preloaded(PreloadOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadOutcome {
    Completed(PreloadSummary),
    AlreadyInProgress,
}

/// Per-competition result of a preload's result fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsOutcome {
    Loaded(usize),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub competitions: usize,
    pub outcomes: BTreeMap<String, ResultsOutcome>,
    pub errors: CategoryErrors,
}

impl PreloadSummary {
    pub fn results_loaded(&self) -> usize {
        self.outcomes
            .values()
            .map(|o| match o {
                ResultsOutcome::Loaded(n) => *n,
                ResultsOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failed_competitions(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ResultsOutcome::Failed(_)))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Both catalogues failed
    pub fn is_total_failure(&self) -> bool {
        self.errors.failed().len() == Category::ALL.len()
    }
}

/// Overall load state, for choosing between a warning and a blocking error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Complete,
    Partial(Vec<Category>),
    Failed,
}

/// Resets the preloading flag however the preload exits.
struct PreloadGuard<'a>(&'a AtomicBool);

impl Drop for PreloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CompetitionManager<S> {
    source: S,
    store: SharedStore,
    preloading: AtomicBool,
    stagger: Duration,
}

impl<S: CompetitionSource> CompetitionManager<S> {
    pub fn new(source: S, store: SharedStore, stagger: Duration) -> Self {
        Self {
            source,
            store,
            preloading: AtomicBool::new(false),
            stagger,
        }
    }

    fn read_store(&self) -> RwLockReadGuard<'_, CacheStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, CacheStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading.load(Ordering::Acquire)
    }

    // =========================================================================
    // Initialization and preload
    // =========================================================================

    /// Fetch-or-use-cache entry point: valid memory, then durable storage,
    /// then a full network preload.
    pub async fn initialize(&self) -> InitSource {
        if self.read_store().is_valid() {
            debug!("Using in-memory snapshot");
            return InitSource::Memory;
        }

        if self.write_store().restore() {
            return InitSource::Durable;
        }

        InitSource::Preloaded(self.preload_all().await)
    }

    /// Fetch every catalogue and every competition's results, then replace
    /// and persist the snapshot.
    pub async fn preload_all(&self) -> PreloadOutcome {
        if self.preloading.swap(true, Ordering::AcqRel) {
            warn!("Preload already in progress");
            return PreloadOutcome::AlreadyInProgress;
        }
        let _guard = PreloadGuard(&self.preloading);
        info!("Starting preload of all competitions");

        // Both catalogues settle before any result request goes out
        let mut fetch = self.source.fetch_all_categories().await;
        let mut catalogue = Catalogue::default();
        for category in Category::ALL {
            match fetch.take(category) {
                Ok(raw) => catalogue.set(category, normalize_competitions(&raw, category)),
                Err(e) => catalogue.errors.set(category, Some(e.to_string())),
            }
        }

        let targets: Vec<(String, Category)> = catalogue
            .iter()
            .map(|c| (c.id.clone(), c.category))
            .collect();
        let source = &self.source;
        let stagger = self.stagger;

        // All requests run concurrently; the k-th one starts k staggers after dispatch
        let fetches = targets.iter().enumerate().map(|(index, (id, category))| async move {
            if index > 0 {
                tokio::time::sleep(stagger * index as u32).await;
            }
            (id.as_str(), source.fetch_competition_results(id, *category).await)
        });
        let fetched = join_all(fetches).await;

        let mut summary = PreloadSummary {
            competitions: catalogue.len(),
            outcomes: BTreeMap::new(),
            errors: catalogue.errors.clone(),
        };
        let mut results: HashMap<String, Vec<ResultRow>> = HashMap::new();
        for (id, outcome) in fetched {
            let rows = match outcome {
                Ok(raw) => {
                    let rows = normalize_results(id, &raw);
                    summary
                        .outcomes
                        .insert(id.to_string(), ResultsOutcome::Loaded(rows.len()));
                    rows
                }
                Err(e) => {
                    summary
                        .outcomes
                        .insert(id.to_string(), ResultsOutcome::Failed(e.to_string()));
                    Vec::new()
                }
            };
            results.insert(id.to_string(), rows);
        }

        {
            let mut store = self.write_store();
            if summary.is_total_failure() {
                warn!("Both catalogues failed to load; snapshot left invalid");
                store.mark_failed(catalogue.errors);
            } else {
                store.replace_all(catalogue, results, Utc::now());
                store.persist();
            }
        }

        info!(
            competitions = summary.competitions,
            results = summary.results_loaded(),
            failed = summary.failed_competitions().len(),
            "Preload complete"
        );
        PreloadOutcome::Completed(summary)
    }

    /// Manual refresh: drop cached results and preload again.
    pub async fn refresh(&self) -> PreloadOutcome {
        if self.is_preloading() {
            return PreloadOutcome::AlreadyInProgress;
        }
        self.write_store().clear_results();
        self.preload_all().await
    }

    /// Manual cache busting: wipe durable and in-memory state. The next
    /// `initialize` runs a fresh preload.
    pub fn reset_cache(&self) {
        info!("Clearing cached competition data");
        self.write_store().purge();
    }

    // =========================================================================
    // Read API
    // =========================================================================

    pub fn all_competitions(&self) -> Vec<Competition> {
        self.read_store()
            .snapshot()
            .catalogue
            .as_ref()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn competitions_by_category(&self, category: Category) -> Vec<Competition> {
        self.read_store()
            .snapshot()
            .catalogue
            .as_ref()
            .map(|c| c.get(category).to_vec())
            .unwrap_or_default()
    }

    pub fn competition(&self, id: &str) -> Result<Competition, ApiError> {
        self.read_store()
            .snapshot()
            .catalogue
            .as_ref()
            .and_then(|c| c.find(id).cloned())
            .ok_or_else(|| ApiError::NotFound(format!("competition {}", id)))
    }

    /// Normalized results for a competition, fetching them if not cached.
    pub async fn results(&self, competition_id: &str) -> Result<Vec<ResultRow>, ApiError> {
        let category = {
            let store = self.read_store();
            if let Some(rows) = store.snapshot().results.get(competition_id) {
                return Ok(rows.clone());
            }
            store
                .snapshot()
                .catalogue
                .as_ref()
                .and_then(|c| c.find(competition_id))
                .map(|c| c.category)
        };
        let category =
            category.ok_or_else(|| ApiError::NotFound(format!("competition {}", competition_id)))?;

        let raw = self
            .source
            .fetch_competition_results(competition_id, category)
            .await?;
        let rows = normalize_results(competition_id, &raw);

        {
            let mut store = self.write_store();
            store.insert_results(competition_id, rows.clone());
            store.persist();
        }
        Ok(rows)
    }

    /// Results grouped into level sections for table display.
    pub async fn results_table(&self, competition_id: &str) -> Result<Vec<LevelSection>, ApiError> {
        let rows = self.results(competition_id).await?;
        Ok(group_by_level(&rows))
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_snapshot(self.read_store().snapshot())
    }

    /// Case-insensitive search over id, name, level and status, optionally
    /// limited to one category. A blank query matches everything.
    pub fn search(&self, query: &str, category: Option<Category>) -> Vec<Competition> {
        let query = query.trim();
        self.all_competitions()
            .into_iter()
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .filter(|c| {
                contains_ignore_case(&c.name, query)
                    || contains_ignore_case(&c.id, query)
                    || contains_ignore_case(&c.level, query)
                    || contains_ignore_case(&c.status, query)
            })
            .collect()
    }

    pub fn errors(&self) -> CategoryErrors {
        self.read_store()
            .snapshot()
            .catalogue
            .as_ref()
            .map(|c| c.errors.clone())
            .unwrap_or_default()
    }

    pub fn load_state(&self) -> LoadState {
        let store = self.read_store();
        let snapshot = store.snapshot();
        let Some(catalogue) = snapshot.catalogue.as_ref() else {
            return LoadState::NotLoaded;
        };

        let failed = catalogue.errors.failed();
        if failed.is_empty() {
            LoadState::Complete
        } else if failed.len() == Category::ALL.len() {
            LoadState::Failed
        } else {
            LoadState::Partial(failed)
        }
    }

    pub fn cache_age(&self) -> String {
        self.read_store().age_display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CategoryFetch;
    use crate::cache::LocalStorage;
    use crate::models::{LevelGroup, RawRecord};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::time::Instant;

    fn records(values: serde_json::Value) -> Vec<RawRecord> {
        serde_json::from_value(values).unwrap()
    }

    struct FakeSource {
        science: Result<Vec<RawRecord>, String>,
        gem: Result<Vec<RawRecord>, String>,
        results: HashMap<String, Result<Vec<RawRecord>, String>>,
        catalogue_delay: Duration,
        catalogue_calls: AtomicUsize,
        results_calls: AtomicUsize,
        result_starts: std::sync::Mutex<Vec<(String, Instant)>>,
    }

    impl Default for FakeSource {
        fn default() -> Self {
            Self {
                science: Ok(Vec::new()),
                gem: Ok(Vec::new()),
                results: HashMap::new(),
                catalogue_delay: Duration::ZERO,
                catalogue_calls: AtomicUsize::new(0),
                results_calls: AtomicUsize::new(0),
                result_starts: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl CompetitionSource for FakeSource {
        async fn fetch_all_categories(&self) -> CategoryFetch {
            self.catalogue_calls.fetch_add(1, Ordering::SeqCst);
            if !self.catalogue_delay.is_zero() {
                tokio::time::sleep(self.catalogue_delay).await;
            }
            CategoryFetch {
                science: self.science.clone().map_err(ApiError::Remote),
                gem: self.gem.clone().map_err(ApiError::Remote),
            }
        }

        async fn fetch_competition_results(
            &self,
            competition_id: &str,
            _category: Category,
        ) -> Result<Vec<RawRecord>, ApiError> {
            self.results_calls.fetch_add(1, Ordering::SeqCst);
            self.result_starts
                .lock()
                .unwrap()
                .push((competition_id.to_string(), Instant::now()));
            match self.results.get(competition_id) {
                Some(outcome) => outcome.clone().map_err(ApiError::Remote),
                None => Ok(Vec::new()),
            }
        }
    }

    fn store() -> SharedStore {
        Arc::new(RwLock::new(CacheStore::in_memory(chrono::Duration::minutes(60), "test")))
    }

    fn durable_store(dir: &TempDir) -> SharedStore {
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();
        Arc::new(RwLock::new(CacheStore::new(
            storage,
            chrono::Duration::minutes(60),
            "test",
        )))
    }

    fn manager(source: FakeSource, store: SharedStore) -> CompetitionManager<FakeSource> {
        CompetitionManager::new(source, store, Duration::ZERO)
    }

    fn full_source() -> FakeSource {
        let mut results = HashMap::new();
        results.insert(
            "s1".to_string(),
            Ok(records(json!([
                { "rank": 2, "level": "ม.1-3", "school": "Beta", "award": "รองชนะเลิศอันดับ 1" },
                { "rank": 1, "level": "ม.1-3", "school": "Alpha", "award": "ชนะเลิศ" },
                { "rank": 1, "level": "ป.4-6", "school": "Gamma", "award": "ชนะเลิศ" }
            ]))),
        );
        results.insert("s2".to_string(), Err("sheet locked".to_string()));
        FakeSource {
            science: Ok(records(json!([
                { "id": "s1", "name": "Science Project", "level": "ม.1-3", "participants": 30 },
                { "id": "s2", "name": "Robot Contest", "status": "upcoming" },
                { "name": "no id" }
            ]))),
            gem: Ok(records(json!([{ "id": "g1", "name": "คณิตศาสตร์" }]))),
            results,
            ..Default::default()
        }
    }

    fn summary(outcome: InitSource) -> PreloadSummary {
        match outcome {
            InitSource::Preloaded(PreloadOutcome::Completed(summary)) => summary,
            other => panic!("expected a completed preload, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initialize_preloads_once() {
        let manager = manager(full_source(), store());

        let first = summary(manager.initialize().await);
        assert_eq!(first.competitions, 3);
        assert_eq!(manager.initialize().await, InitSource::Memory);
        assert_eq!(manager.source.catalogue_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preload_degrades_failed_results() {
        let manager = manager(full_source(), store());
        let summary = summary(manager.initialize().await);

        assert_eq!(summary.outcomes.get("s1"), Some(&ResultsOutcome::Loaded(3)));
        assert_eq!(summary.failed_competitions(), vec!["s2"]);
        assert_eq!(summary.results_loaded(), 3);
        assert!(!summary.is_total_failure());

        // The failed competition is cached as empty, so no refetch on demand
        assert!(manager.results("s2").await.unwrap().is_empty());
        assert_eq!(manager.source.results_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_competitions_excluded() {
        let manager = manager(full_source(), store());
        manager.initialize().await;

        let ids: Vec<String> = manager.all_competitions().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["s1", "s2", "g1"]);
        assert_eq!(manager.competitions_by_category(Category::Gem).len(), 1);
        assert_eq!(manager.statistics().total_competitions, 3);
    }

    #[tokio::test]
    async fn test_empty_science_one_gem() {
        let mut results = HashMap::new();
        results.insert(
            "g1".to_string(),
            Ok(records(json!([{ "school": "Solo", "award": "ชนะเลิศ", "rank": 1 }]))),
        );
        let source = FakeSource {
            gem: Ok(records(json!([{ "id": "g1", "name": "Math" }]))),
            results,
            ..Default::default()
        };
        let manager = manager(source, store());
        manager.initialize().await;

        assert!(manager.competitions_by_category(Category::Science).is_empty());
        assert_eq!(manager.all_competitions().len(), 1);
        assert_eq!(manager.errors(), CategoryErrors::default());
        assert_eq!(manager.load_state(), LoadState::Complete);
        assert_eq!(manager.results("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_category() {
        let source = FakeSource {
            science: Err("quota exceeded".to_string()),
            gem: Ok(records(json!([{ "id": "g1", "name": "Math" }]))),
            ..Default::default()
        };
        let manager = manager(source, store());
        manager.initialize().await;

        assert_eq!(manager.load_state(), LoadState::Partial(vec![Category::Science]));
        assert!(manager.errors().science.unwrap().contains("quota exceeded"));
        assert_eq!(manager.all_competitions().len(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_is_retried_and_not_persisted() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource {
            science: Err("down".to_string()),
            gem: Err("down".to_string()),
            ..Default::default()
        };
        let manager = manager(source, durable_store(&dir));
        let summary = summary(manager.initialize().await);

        assert!(summary.is_total_failure());
        assert_eq!(manager.load_state(), LoadState::Failed);

        // Nothing valid was cached, so the next start tries the network again
        assert!(matches!(manager.initialize().await, InitSource::Preloaded(_)));
        assert_eq!(manager.source.catalogue_calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.load_state(), LoadState::Failed);

        let fresh = durable_store(&dir);
        assert!(!fresh.write().unwrap().restore());
    }

    #[tokio::test]
    async fn test_restart_restores_from_durable_storage() {
        let dir = TempDir::new().unwrap();
        let first = manager(full_source(), durable_store(&dir));
        first.initialize().await;

        let second = manager(FakeSource::default(), durable_store(&dir));
        assert_eq!(second.initialize().await, InitSource::Durable);
        assert_eq!(second.source.catalogue_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.all_competitions(), first.all_competitions());
        assert_eq!(second.results("s1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_preload_is_rejected() {
        let source = FakeSource {
            catalogue_delay: Duration::from_millis(50),
            ..full_source()
        };
        let manager = manager(source, store());

        let (a, b) = tokio::join!(manager.preload_all(), manager.preload_all());
        let rejected = [a, b]
            .iter()
            .filter(|o| **o == PreloadOutcome::AlreadyInProgress)
            .count();
        assert_eq!(rejected, 1);
        assert_eq!(manager.source.catalogue_calls.load(Ordering::SeqCst), 1);
        assert!(!manager.is_preloading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_requests_are_staggered() {
        let stagger = Duration::from_millis(200);
        let manager = CompetitionManager::new(full_source(), store(), stagger);

        let start = Instant::now();
        manager.preload_all().await;

        let offsets: HashMap<String, u128> = manager
            .source
            .result_starts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, at)| (id.clone(), (*at - start).as_millis()))
            .collect();
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets["s1"], 0);
        assert_eq!(offsets["s2"], 200);
        assert_eq!(offsets["g1"], 400);
    }

    #[tokio::test]
    async fn test_results_fetched_on_demand_then_cached() {
        let source = full_source();
        let shared = store();
        let mut catalogue = Catalogue::default();
        catalogue.set(
            Category::Science,
            normalize_competitions(
                &records(json!([{ "id": "s1", "name": "Science Project" }])),
                Category::Science,
            ),
        );
        shared
            .write()
            .unwrap()
            .replace_all(catalogue, HashMap::new(), Utc::now());
        let manager = manager(source, shared);

        let rows = manager.results("s1").await.unwrap();
        let schools: Vec<&str> = rows.iter().map(|r| r.school.as_str()).collect();
        assert_eq!(schools, vec!["Alpha", "Gamma", "Beta"]);

        manager.results("s1").await.unwrap();
        assert_eq!(manager.source.results_calls.load(Ordering::SeqCst), 1);

        let err = manager.results("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_results_table_groups_levels() {
        let manager = manager(full_source(), store());
        manager.initialize().await;

        let sections = manager.results_table("s1").await.unwrap();
        let groups: Vec<LevelGroup> = sections.iter().map(|s| s.group).collect();
        assert_eq!(groups, vec![LevelGroup::PrimaryLow, LevelGroup::Junior]);
        let junior: Vec<&str> = sections[1].rows.iter().map(|r| r.school.as_str()).collect();
        assert_eq!(junior, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_search_and_lookup() {
        let manager = manager(full_source(), store());
        manager.initialize().await;

        let hits: Vec<String> = manager.search("ROBOT", None).into_iter().map(|c| c.id).collect();
        assert_eq!(hits, vec!["s2"]);
        assert_eq!(manager.search("upcoming", None).len(), 1);
        assert!(manager.search("robot", Some(Category::Gem)).is_empty());
        assert_eq!(manager.search("  ", Some(Category::Science)).len(), 2);

        assert_eq!(manager.competition("g1").unwrap().name, "คณิตศาสตร์");
        assert!(matches!(manager.competition("nope"), Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_refetches_everything() {
        let manager = manager(full_source(), store());
        manager.initialize().await;

        let outcome = manager.refresh().await;
        assert!(matches!(outcome, PreloadOutcome::Completed(_)));
        assert_eq!(manager.source.catalogue_calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.source.results_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_reset_forces_fresh_preload() {
        let dir = TempDir::new().unwrap();
        let manager = manager(full_source(), durable_store(&dir));
        manager.initialize().await;

        manager.reset_cache();
        assert_eq!(manager.load_state(), LoadState::NotLoaded);
        assert_eq!(manager.cache_age(), "never");

        assert!(matches!(manager.initialize().await, InitSource::Preloaded(_)));
        assert_eq!(manager.source.catalogue_calls.load(Ordering::SeqCst), 2);
    }
}
