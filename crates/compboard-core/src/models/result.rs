use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::record::result_fields as fields;
use super::{AwardTier, RawRecord, ValidationError};
use crate::utils::{compare_names, is_placeholder, parse_leading_u32, PLACEHOLDER};

/// One row of a competition's result sheet.
///
/// `competition_id` is a loose reference to the owning `Competition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub competition_id: String,
    pub rank: Option<u32>,
    pub level: String,
    pub division: String,
    pub award: String,
    pub tier: Option<AwardTier>,
    pub school: String,
    pub certificate_url: Option<String>,
    pub participants: String,
    pub coach: String,
    pub project: String,
    pub notes: String,
    pub order: usize,
}

impl ResultRow {
    pub fn from_raw(
        raw: &RawRecord,
        competition_id: &str,
        order: usize,
    ) -> Result<Self, ValidationError> {
        let school = raw.text_or_empty(fields::SCHOOL);
        let award = raw.text_or_empty(fields::AWARD);
        if school.is_empty() && award.is_empty() {
            return Err(ValidationError::EmptyResult {
                competition_id: competition_id.to_string(),
            });
        }

        Ok(Self {
            competition_id: competition_id.to_string(),
            rank: raw.text(fields::RANK).and_then(|r| parse_leading_u32(&r)),
            level: raw.text_or_empty(fields::LEVEL),
            division: raw.text_or_empty(fields::DIVISION),
            tier: AwardTier::parse(&award),
            award,
            school,
            certificate_url: raw.text(fields::CERTIFICATE).filter(|url| !is_placeholder(url)),
            // The sheet does not publish these yet; keep the placeholder
            participants: raw
                .text(fields::PARTICIPANTS)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            coach: raw
                .text(fields::COACH)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            project: raw.text_or_empty(fields::PROJECT),
            notes: raw.text_or_empty(fields::NOTES),
            order,
        })
    }

    pub fn has_certificate(&self) -> bool {
        self.certificate_url.is_some()
    }

    /// Award label for display: the recognized tier's label, else the raw text
    pub fn award_label(&self) -> &str {
        match self.tier {
            Some(tier) => tier.label(),
            None => self.award.as_str(),
        }
    }
}

/// Normalized result ordering: rank ascending with missing ranks last, then
/// award tier, then school name in Thai dictionary order.
pub fn compare_results(a: &ResultRow, b: &ResultRow) -> Ordering {
    cmp_rank(a.rank, b.rank)
        .then_with(|| AwardTier::sort_key(a.tier).cmp(&AwardTier::sort_key(b.tier)))
        .then_with(|| compare_names(&a.school, &b.school))
}

/// Missing ranks sort after every present rank.
pub(crate) fn cmp_rank(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Validate, normalize and sort a competition's raw result rows.
pub fn normalize_results(competition_id: &str, raw: &[RawRecord]) -> Vec<ResultRow> {
    let mut rows: Vec<ResultRow> = raw
        .iter()
        .enumerate()
        .filter_map(|(order, record)| match ResultRow::from_raw(record, competition_id, order) {
            Ok(row) => Some(row),
            Err(e) => {
                debug!(order, error = %e, "Dropping invalid result record");
                None
            }
        })
        .collect();

    // Stable: full ties keep sheet order
    rows.sort_by(compare_results);
    rows
}
