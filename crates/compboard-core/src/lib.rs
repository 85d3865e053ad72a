//! compboard-core - competition results fetching, caching and aggregation.
//!
//! This crate loads school-competition catalogues and results from the
//! spreadsheet-backed endpoints, keeps them in a TTL-bounded snapshot
//! mirrored to local storage, and serves normalized, sorted views to
//! front ends.

pub mod api;
pub mod cache;
pub mod config;
pub mod manager;
pub mod models;
pub mod stats;
pub mod utils;

pub use api::{ApiClient, ApiError, CompetitionSource};
pub use cache::{CacheStore, LocalStorage};
pub use config::Config;
pub use manager::{
    CompetitionManager, InitSource, LoadState, PreloadOutcome, PreloadSummary, ResultsOutcome,
    SharedStore,
};
pub use models::{AwardTier, Category, Competition, LevelGroup, LevelSection, ResultRow};
pub use stats::Statistics;
