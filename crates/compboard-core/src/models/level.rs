use serde::{Deserialize, Serialize};

use super::result::{cmp_rank, ResultRow};
use crate::utils::parse_leading_u32;

/// Prefixes followed by a secondary grade number ("ม.2", "มัธยมศึกษาปีที่ 5")
const SECONDARY_GRADE_MARKERS: &[&str] = &["มัธยมศึกษาปีที่", "ม."];

/// Canonical level clusters, in table display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelGroup {
    PrimaryLow,
    Junior,
    Senior,
    General,
    /// Anything unrecognized; sorts last, keeping sheet order
    Other,
}

impl LevelGroup {
    /// Classify a free-text education level such as "ม.1-3" or "ประถมศึกษา".
    pub fn classify(level: &str) -> Self {
        let key: String = level
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let matches = |needles: &[&str]| needles.iter().any(|n| key.contains(n));

        // Secondary markers before the broad primary ones
        if matches(&["ม.ต้น", "มัธยมศึกษาตอนต้น", "มัธยมต้น", "junior", "lowersecondary"]) {
            return LevelGroup::Junior;
        }
        if matches(&["ม.ปลาย", "มัธยมศึกษาตอนปลาย", "มัธยมปลาย", "senior", "uppersecondary"]) {
            return LevelGroup::Senior;
        }
        // A range such as "ม.4-6" is placed by its first grade
        match secondary_grade(&key) {
            Some(1..=3) => return LevelGroup::Junior,
            Some(4..=6) => return LevelGroup::Senior,
            _ => {}
        }

        if matches(&["ป.", "ประถม", "primary", "elementary"]) {
            LevelGroup::PrimaryLow
        } else if matches(&["ทั่วไป", "general", "open", "ประชาชน"]) {
            LevelGroup::General
        } else {
            LevelGroup::Other
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LevelGroup::PrimaryLow => "Primary",
            LevelGroup::Junior => "Lower secondary",
            LevelGroup::Senior => "Upper secondary",
            LevelGroup::General => "General",
            LevelGroup::Other => "Other",
        }
    }
}

/// First grade number written after a secondary marker in a whitespace-free key.
fn secondary_grade(key: &str) -> Option<u32> {
    SECONDARY_GRADE_MARKERS.iter().find_map(|marker| {
        key.match_indices(marker)
            .find_map(|(start, m)| parse_leading_u32(&key[start + m.len()..]))
    })
}

/// One level's block of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSection {
    /// Level text as first seen in the sheet
    pub level: String,
    pub group: LevelGroup,
    pub rows: Vec<ResultRow>,
}

/// Partition rows into level sections for the results table.
///
/// Sections follow the canonical cluster order; levels sharing a cluster and
/// unrecognized levels keep their first-appearance order. Inside a section
/// rows are ordered by the sheet's rank column, missing ranks last, with ties
/// kept in sheet order.
pub fn group_by_level(rows: &[ResultRow]) -> Vec<LevelSection> {
    let mut source: Vec<&ResultRow> = rows.iter().collect();
    source.sort_by_key(|r| r.order);

    let mut sections: Vec<LevelSection> = Vec::new();
    for row in source {
        match sections.iter_mut().find(|s| s.level == row.level) {
            Some(section) => section.rows.push(row.clone()),
            None => sections.push(LevelSection {
                level: row.level.clone(),
                group: LevelGroup::classify(&row.level),
                rows: vec![row.clone()],
            }),
        }
    }

    // Stable sorts keep first-appearance order within a cluster
    sections.sort_by_key(|s| s.group);
    for section in &mut sections {
        section.rows.sort_by(|a, b| cmp_rank(a.rank, b.rank));
    }
    sections
}
