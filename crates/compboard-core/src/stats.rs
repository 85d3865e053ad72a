//! Aggregate statistics over the cached snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::Snapshot;
use crate::models::{detect_category, AwardTier, Category};
use crate::utils::compare_names;

/// How many schools the leaderboard keeps
pub const TOP_SCHOOLS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolTally {
    pub school: String,
    /// Rows in the top four award tiers
    pub placings: usize,
    pub champions: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_competitions: usize,
    pub total_participants: u64,
    pub total_results: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_level: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub awards: BTreeMap<AwardTier, usize>,
    pub awards_by_category: BTreeMap<Category, BTreeMap<AwardTier, usize>>,
    pub certificates: usize,
    pub top_schools: Vec<SchoolTally>,
}

impl Statistics {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut stats = Statistics::default();
        for category in Category::ALL {
            stats.by_category.insert(category, 0);
        }

        if let Some(catalogue) = &snapshot.catalogue {
            for competition in catalogue.iter() {
                stats.total_competitions += 1;
                stats.total_participants += u64::from(competition.participants);
                *stats.by_category.entry(competition.category).or_default() += 1;
                *stats.by_level.entry(competition.level.clone()).or_default() += 1;
                *stats.by_status.entry(competition.status.clone()).or_default() += 1;
            }
        }

        let mut schools: BTreeMap<String, SchoolTally> = BTreeMap::new();
        for (competition_id, rows) in &snapshot.results {
            let known_category = snapshot
                .catalogue
                .as_ref()
                .and_then(|c| c.find(competition_id))
                .map(|c| c.category);

            for row in rows {
                stats.total_results += 1;
                if row.has_certificate() {
                    stats.certificates += 1;
                }

                if let Some(tier) = row.tier {
                    *stats.awards.entry(tier).or_default() += 1;
                    // Rows whose competition left the catalogue are classified by division text
                    let category = known_category.unwrap_or_else(|| detect_category(&row.division));
                    *stats
                        .awards_by_category
                        .entry(category)
                        .or_default()
                        .entry(tier)
                        .or_default() += 1;
                }

                if row.school.is_empty() {
                    continue;
                }
                let tally = schools.entry(row.school.clone()).or_insert_with(|| SchoolTally {
                    school: row.school.clone(),
                    placings: 0,
                    champions: 0,
                    entries: 0,
                });
                tally.entries += 1;
                if row.tier.is_some_and(|t| t.is_placing()) {
                    tally.placings += 1;
                }
                if row.tier == Some(AwardTier::Champion) {
                    tally.champions += 1;
                }
            }
        }

        let mut top: Vec<SchoolTally> = schools
            .into_values()
            .filter(|t| t.placings > 0)
            .collect();
        top.sort_by(|a, b| {
            b.placings
                .cmp(&a.placings)
                .then_with(|| b.champions.cmp(&a.champions))
                .then_with(|| compare_names(&a.school, &b.school))
        });
        top.truncate(TOP_SCHOOLS_LIMIT);
        stats.top_schools = top;

        stats
    }

    pub fn count_for(&self, category: Category) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}
