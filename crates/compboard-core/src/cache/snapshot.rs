use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Competition, ResultRow};

/// Per-category fetch error slot; `None` means the category loaded (possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryErrors {
    pub science: Option<String>,
    pub gem: Option<String>,
}

impl CategoryErrors {
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Science => self.science.as_deref(),
            Category::Gem => self.gem.as_deref(),
        }
    }

    pub fn set(&mut self, category: Category, error: Option<String>) {
        match category {
            Category::Science => self.science = error,
            Category::Gem => self.gem = error,
        }
    }

    pub fn failed(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_some())
            .collect()
    }
}

/// The competition catalogue, partitioned by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalogue {
    #[serde(default)]
    pub science: Vec<Competition>,
    #[serde(default)]
    pub gem: Vec<Competition>,
    #[serde(default)]
    pub errors: CategoryErrors,
}

impl Catalogue {
    pub fn get(&self, category: Category) -> &[Competition] {
        match category {
            Category::Science => &self.science,
            Category::Gem => &self.gem,
        }
    }

    pub fn set(&mut self, category: Category, competitions: Vec<Competition>) {
        match category {
            Category::Science => self.science = competitions,
            Category::Gem => self.gem = competitions,
        }
    }

    /// All competitions, science first, each in source order
    pub fn iter(&self) -> impl Iterator<Item = &Competition> {
        self.science.iter().chain(self.gem.iter())
    }

    pub fn len(&self) -> usize {
        self.science.len() + self.gem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, id: &str) -> Option<&Competition> {
        self.iter().find(|c| c.id == id)
    }
}

/// The complete in-memory dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub catalogue: Option<Catalogue>,
    pub results: HashMap<String, Vec<ResultRow>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub loaded: bool,
}

/// Durable form of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedSnapshot {
    pub competitions: Catalogue,
    pub results: BTreeMap<String, Vec<ResultRow>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

/// Drop sub-millisecond precision so timestamps survive the epoch-ms round trip.
pub(crate) fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawRecord, ALL_LEVELS};
    use serde_json::json;

    fn competition(id: &str, category: Category) -> Competition {
        let raw: RawRecord = serde_json::from_value(json!({ "id": id, "name": id })).unwrap();
        Competition::from_raw(&raw, category, 0).unwrap()
    }

    #[test]
    fn test_catalogue_lookup_spans_categories() {
        let mut catalogue = Catalogue::default();
        catalogue.set(Category::Science, vec![competition("s1", Category::Science)]);
        catalogue.set(Category::Gem, vec![competition("g1", Category::Gem)]);

        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue.find("g1").map(|c| c.category), Some(Category::Gem));
        assert_eq!(catalogue.find("g1").map(|c| c.level.as_str()), Some(ALL_LEVELS));
        assert!(catalogue.find("zz").is_none());
    }

    #[test]
    fn test_category_errors_failed() {
        let mut errors = CategoryErrors::default();
        assert!(errors.failed().is_empty());
        errors.set(Category::Gem, Some("timeout".to_string()));
        assert_eq!(errors.failed(), vec![Category::Gem]);
        assert_eq!(errors.get(Category::Gem), Some("timeout"));
    }

    #[test]
    fn test_persisted_snapshot_wire_shape() {
        let persisted = PersistedSnapshot {
            competitions: Catalogue::default(),
            results: BTreeMap::new(),
            last_updated: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            version: "1.0.0".to_string(),
        };
        let value = serde_json::to_value(&persisted).unwrap();
        assert_eq!(value["lastUpdated"], json!(1_700_000_000_123_i64));
        assert_eq!(value["version"], json!("1.0.0"));
        assert!(value["competitions"]["errors"].is_object());
    }
}
