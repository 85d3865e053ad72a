//! Plain-text rendering of competitions, result tables and statistics.

use std::fmt::Write;

use compboard_core::cache::CategoryErrors;
use compboard_core::utils::{format_date, format_optional, truncate_string, NOT_AVAILABLE};
use compboard_core::{
    AwardTier, Category, Competition, LevelSection, PreloadSummary, ResultRow, Statistics,
};

// ============================================================================
// Constants
// ============================================================================

const NAME_WIDTH: usize = 40;
const LEVEL_WIDTH: usize = 14;
const SCHOOL_WIDTH: usize = 32;
const AWARD_WIDTH: usize = 24;

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count().max(8)));
}

fn padded(text: &str, width: usize) -> String {
    let text = truncate_string(text, width);
    let pad = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(pad))
}

/// One line per competition, grouped under category headings.
pub fn competition_list(competitions: &[Competition]) -> String {
    if competitions.is_empty() {
        return "No competitions found\n".to_string();
    }

    let mut out = String::new();
    for category in Category::ALL {
        let rows: Vec<&Competition> = competitions
            .iter()
            .filter(|c| c.category == category)
            .collect();
        if rows.is_empty() {
            continue;
        }

        heading(
            &mut out,
            &format!("{} {} ({})", category.default_icon(), category.display_name(), rows.len()),
        );
        for c in rows {
            let _ = writeln!(
                out,
                "{} {}  {}  {}  {:>4}  {}  [{}]",
                c.icon,
                padded(&c.name, NAME_WIDTH),
                padded(&c.level, LEVEL_WIDTH),
                padded(&c.status, 10),
                c.participants,
                c.formatted_date(),
                c.id
            );
        }
        out.push('\n');
    }
    out
}

fn result_line(row: &ResultRow) -> String {
    let rank = row
        .rank
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    let tier_icon = row.tier.map(|t| t.icon()).unwrap_or(" ");
    let certificate = row.certificate_url.as_deref().unwrap_or(NOT_AVAILABLE);

    format!(
        "  {:>4}  {} {}  {}  coach: {}  certificate: {}",
        rank,
        tier_icon,
        padded(row.award_label(), AWARD_WIDTH),
        padded(&format_optional(Some(&row.school)), SCHOOL_WIDTH),
        format_optional(Some(&row.coach)),
        certificate
    )
}

/// Competition header followed by its results table, one block per level.
pub fn competition_detail(competition: &Competition, sections: &[LevelSection]) -> String {
    let mut out = String::new();
    heading(&mut out, &format!("{} {}", competition.icon, competition.name));
    let _ = writeln!(out, "Category:     {}", competition.category.display_name());
    let _ = writeln!(out, "Level:        {}", competition.level);
    let _ = writeln!(out, "Status:       {}", competition.status);
    let _ = writeln!(out, "Participants: {}", competition.participants);
    let _ = writeln!(
        out,
        "Date:         {}",
        competition
            .date
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    );
    out.push('\n');

    if sections.is_empty() {
        out.push_str("No results published yet\n");
        return out;
    }

    for section in sections {
        let _ = writeln!(out, "{} ({})", section.level, section.group.display_name());
        for row in &section.rows {
            let _ = writeln!(out, "{}", result_line(row));
            if !row.project.trim().is_empty() {
                let _ = writeln!(out, "        project: {}", row.project.trim());
            }
        }
        out.push('\n');
    }
    out
}

/// Aggregate counts, award distribution and the school leaderboard.
pub fn statistics(stats: &Statistics) -> String {
    let mut out = String::new();
    heading(&mut out, "Statistics");
    let _ = writeln!(out, "Competitions: {}", stats.total_competitions);
    let _ = writeln!(out, "Participants: {}", stats.total_participants);
    let _ = writeln!(out, "Results:      {}", stats.total_results);
    let _ = writeln!(out, "Certificates: {}", stats.certificates);
    out.push('\n');

    let _ = writeln!(out, "By category");
    for (category, count) in &stats.by_category {
        let _ = writeln!(out, "  {} {:<16} {}", category.default_icon(), category.display_name(), count);
    }

    let _ = writeln!(out, "By level");
    for (level, count) in &stats.by_level {
        let _ = writeln!(out, "  {} {}", padded(level, LEVEL_WIDTH), count);
    }

    let _ = writeln!(out, "By status");
    for (status, count) in &stats.by_status {
        let _ = writeln!(out, "  {} {}", padded(status, LEVEL_WIDTH), count);
    }
    out.push('\n');

    let _ = writeln!(out, "Awards");
    for tier in AwardTier::ALL {
        let total = stats.awards.get(&tier).copied().unwrap_or(0);
        let per_category: Vec<String> = Category::ALL
            .iter()
            .map(|c| {
                let n = stats
                    .awards_by_category
                    .get(c)
                    .and_then(|m| m.get(&tier))
                    .copied()
                    .unwrap_or(0);
                format!("{} {}", c.as_str(), n)
            })
            .collect();
        let _ = writeln!(
            out,
            "  {} {} {:>4}  ({})",
            tier.icon(),
            padded(tier.label(), AWARD_WIDTH),
            total,
            per_category.join(", ")
        );
    }

    if !stats.top_schools.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Top schools");
        for (i, tally) in stats.top_schools.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:>2}. {} placings {:>3}  champions {:>3}  entries {:>3}",
                i + 1,
                padded(&tally.school, SCHOOL_WIDTH),
                tally.placings,
                tally.champions,
                tally.entries
            );
        }
    }
    out
}

/// One-paragraph report of a completed preload.
pub fn preload_summary(summary: &PreloadSummary) -> String {
    let mut out = format!(
        "Loaded {} competitions and {} results\n",
        summary.competitions,
        summary.results_loaded()
    );
    let failed = summary.failed_competitions();
    if !failed.is_empty() {
        let _ = writeln!(out, "Results unavailable for: {}", failed.join(", "));
    }
    out
}

/// "category: message" lines for every failed category.
pub fn load_errors(errors: &CategoryErrors) -> Vec<String> {
    errors
        .failed()
        .into_iter()
        .map(|c| {
            format!(
                "could not load {} competitions: {}",
                c.display_name(),
                errors.get(c).unwrap_or(NOT_AVAILABLE)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use compboard_core::models::{group_by_level, normalize_competitions, normalize_results, RawRecord};
    use serde_json::json;

    fn records(values: serde_json::Value) -> Vec<RawRecord> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_list_groups_by_category() {
        let mut competitions = normalize_competitions(
            &records(json!([{ "id": "g1", "name": "Math" }])),
            Category::Gem,
        );
        competitions.extend(normalize_competitions(
            &records(json!([{ "id": "s1", "name": "Robots" }])),
            Category::Science,
        ));

        let text = competition_list(&competitions);
        let science = text.find(Category::Science.display_name()).unwrap();
        let gem = text.find(Category::Gem.display_name()).unwrap();
        assert!(science < gem);
        assert!(text.contains("[s1]"));
        assert_eq!(competition_list(&[]), "No competitions found\n");
    }

    #[test]
    fn test_missing_certificate_prints_not_available() {
        let competition = normalize_competitions(
            &records(json!([{ "id": "s1", "name": "Robots" }])),
            Category::Science,
        )
        .remove(0);
        let rows = normalize_results(
            "s1",
            &records(json!([{ "rank": 1, "school": "Alpha", "award": "ชนะเลิศ", "certificate": "-" }])),
        );

        let text = competition_detail(&competition, &group_by_level(&rows));
        assert!(text.contains("Alpha"));
        assert!(text.contains("certificate: n/a"));
        assert!(text.contains("coach: n/a"));
        assert!(text.contains("Date:         n/a"));
    }

    #[test]
    fn test_load_errors_name_category() {
        let mut errors = CategoryErrors::default();
        errors.set(Category::Gem, Some("Request timed out".to_string()));
        let lines = load_errors(&errors);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(Category::Gem.display_name()));
        assert!(lines[0].contains("Request timed out"));
    }
}
