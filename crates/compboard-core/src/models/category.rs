use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level competition domain. Each category is served by its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Science,
    #[serde(alias = "academic")]
    Gem,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

/// Keywords that mark a competition name as science, checked first.
const SCIENCE_KEYWORDS: &[&str] = &[
    "วิทยาศาสตร์",
    "science",
    "โครงงาน",
    "project",
    "ฟิสิกส์",
    "physics",
    "เคมี",
    "chemistry",
    "ชีววิทยา",
    "biology",
    "ดาราศาสตร์",
    "astronomy",
    "หุ่นยนต์",
    "robot",
    "สิ่งประดิษฐ์",
    "invention",
];

/// Keywords that mark a competition name as gem (academic).
const GEM_KEYWORDS: &[&str] = &[
    "คณิตศาสตร์",
    "math",
    "ภาษา",
    "language",
    "อังกฤษ",
    "english",
    "สังคม",
    "social",
    "วิชาการ",
    "academic",
    "gem",
    "เรียงความ",
    "essay",
    "สะกดคำ",
    "spelling",
    "ศิลปะ",
];

impl Category {
    pub const ALL: [Category; 2] = [Category::Science, Category::Gem];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Science => "science",
            Category::Gem => "gem",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Science => "Science",
            Category::Gem => "GEM",
        }
    }

    /// Icon used when a competition record does not carry its own
    pub fn default_icon(&self) -> &'static str {
        match self {
            Category::Science => "🔬",
            Category::Gem => "📚",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "science" => Ok(Category::Science),
            "gem" | "academic" => Ok(Category::Gem),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Classify a free-text competition name.
///
/// Science keywords are checked before gem keywords; the first hit wins and
/// names matching neither set fall back to science.
pub fn detect_category(name: &str) -> Category {
    let lower = name.to_lowercase();
    if SCIENCE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Category::Science
    } else if GEM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Category::Gem
    } else {
        Category::Science
    }
}
