//! Utility functions for string formatting, collation and lenient parsing.

pub mod collate;
pub mod format;

// Re-export commonly used functions at module level
pub use collate::compare_names;
pub use format::{
    cmp_ignore_case, contains_ignore_case, format_age, format_date, format_optional,
    is_placeholder, parse_leading_u32, truncate_string, NOT_AVAILABLE, PLACEHOLDER,
};
