use serde::{Deserialize, Serialize};
use tracing::debug;

use super::record::competition_fields as fields;
use super::{Category, RawRecord, ValidationError};
use crate::utils::{format_date, parse_leading_u32};

/// Level sentinel for competitions open to every grade ("all levels").
pub const ALL_LEVELS: &str = "ทุกระดับ";

/// Status assumed when the sheet leaves it blank.
pub const DEFAULT_STATUS: &str = "completed";

/// A catalogue entry, normalized from a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub level: String,
    pub status: String,
    pub participants: u32,
    pub icon: String,
    pub date: Option<String>,
    /// Position in the source listing, used to keep sheet order on ties
    pub order: usize,
}

impl Competition {
    /// Normalize a raw record fetched from `category`'s endpoint.
    ///
    /// Any category the record itself claims is ignored; the endpoint decides.
    pub fn from_raw(
        raw: &RawRecord,
        category: Category,
        order: usize,
    ) -> Result<Self, ValidationError> {
        let id = raw.text(fields::ID).ok_or(ValidationError::MissingField("id"))?;
        let name = raw
            .text(fields::NAME)
            .ok_or(ValidationError::MissingField("name"))?;

        Ok(Self {
            id,
            name,
            category,
            level: raw
                .text(fields::LEVEL)
                .unwrap_or_else(|| ALL_LEVELS.to_string()),
            status: raw
                .text(fields::STATUS)
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            participants: raw
                .text(fields::PARTICIPANTS)
                .and_then(|p| parse_leading_u32(&p))
                .unwrap_or(0),
            icon: raw
                .text(fields::ICON)
                .unwrap_or_else(|| category.default_icon().to_string()),
            date: raw.text(fields::DATE),
            order,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case(DEFAULT_STATUS)
    }

    pub fn formatted_date(&self) -> String {
        match &self.date {
            Some(date) => format_date(date),
            None => "TBD".to_string(),
        }
    }
}

/// Validate and normalize one category's catalogue, dropping invalid records.
pub fn normalize_competitions(raw: &[RawRecord], category: Category) -> Vec<Competition> {
    raw.iter()
        .enumerate()
        .filter_map(|(order, record)| match Competition::from_raw(record, category, order) {
            Ok(competition) => Some(competition),
            Err(e) => {
                debug!(category = %category, order, error = %e, "Dropping invalid competition record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_raw_applies_defaults() {
        let raw = record(json!({ "id": " sci-01 ", "name": "โครงงานวิทยาศาสตร์" }));
        let comp = Competition::from_raw(&raw, Category::Science, 4).unwrap();
        assert_eq!(comp.id, "sci-01");
        assert_eq!(comp.level, ALL_LEVELS);
        assert_eq!(comp.status, DEFAULT_STATUS);
        assert_eq!(comp.participants, 0);
        assert_eq!(comp.icon, "🔬");
        assert_eq!(comp.date, None);
        assert_eq!(comp.order, 4);
        assert!(comp.is_completed());
    }

    #[test]
    fn test_from_raw_category_comes_from_context() {
        let raw = record(json!({ "id": "1", "name": "Math", "category": "science" }));
        let comp = Competition::from_raw(&raw, Category::Gem, 0).unwrap();
        assert_eq!(comp.category, Category::Gem);
        assert_eq!(comp.icon, "📚");
    }

    #[test]
    fn test_from_raw_lenient_participants() {
        let raw = record(json!({ "id": "1", "name": "A", "participants": "25 คน" }));
        assert_eq!(Competition::from_raw(&raw, Category::Gem, 0).unwrap().participants, 25);

        let raw = record(json!({ "id": "1", "name": "A", "participants": "many" }));
        assert_eq!(Competition::from_raw(&raw, Category::Gem, 0).unwrap().participants, 0);

        let raw = record(json!({ "id": 7, "name": "A", "participants": 12 }));
        let comp = Competition::from_raw(&raw, Category::Gem, 0).unwrap();
        assert_eq!(comp.id, "7");
        assert_eq!(comp.participants, 12);
    }

    #[test]
    fn test_from_raw_rejects_missing_id_or_name() {
        let raw = record(json!({ "name": "No id" }));
        assert_eq!(
            Competition::from_raw(&raw, Category::Science, 0),
            Err(ValidationError::MissingField("id"))
        );

        let raw = record(json!({ "id": "x", "name": "   " }));
        assert_eq!(
            Competition::from_raw(&raw, Category::Science, 0),
            Err(ValidationError::MissingField("name"))
        );
    }

    #[test]
    fn test_normalize_competitions_drops_invalid_and_keeps_source_order() {
        let raw = vec![
            record(json!({ "id": "a", "name": "First" })),
            record(json!({ "id": "", "name": "Blank id" })),
            record(json!({ "id": "c", "name": "Third" })),
        ];
        let comps = normalize_competitions(&raw, Category::Science);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].order, 0);
        assert_eq!(comps[1].id, "c");
        assert_eq!(comps[1].order, 2);
    }

    #[test]
    fn test_formatted_date() {
        let raw = record(json!({ "id": "1", "name": "A", "date": "2024-02-15" }));
        let comp = Competition::from_raw(&raw, Category::Science, 0).unwrap();
        assert_eq!(comp.formatted_date(), "Feb 15, 2024");
    }
}
