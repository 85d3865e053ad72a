//! Data models for competition catalogues and results.
//!
//! This module contains the data structures used to represent the
//! spreadsheet-backed data including:
//!
//! - `RawRecord`: loosely shaped remote rows read through alias tables
//! - `Category`: top-level competition domain (science / gem)
//! - `Competition`: a normalized catalogue entry
//! - `ResultRow`, `AwardTier`: normalized results and their ranking
//! - `LevelGroup`, `LevelSection`: canonical level grouping for tables

pub mod award;
pub mod category;
pub mod competition;
pub mod level;
pub mod record;
pub mod result;

use thiserror::Error;

pub use award::AwardTier;
pub use category::{detect_category, Category, UnknownCategory};
pub use competition::{normalize_competitions, Competition, ALL_LEVELS, DEFAULT_STATUS};
pub use level::{group_by_level, LevelGroup, LevelSection};
pub use record::RawRecord;
pub use result::{compare_results, normalize_results, ResultRow};

/// A remote record that failed the minimal-fields check.
///
/// These are logged and dropped during normalization, never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("competition record is missing {0}")]
    MissingField(&'static str),

    #[error("result record for competition {competition_id} has neither school nor award")]
    EmptyResult { competition_id: String },
}
