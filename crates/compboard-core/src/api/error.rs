use thiserror::Error;

use crate::models::Category;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load {category} competitions: {source}")]
    LoadFailure {
        category: Category,
        source: Box<ApiError>,
    },

    #[error("Failed to load results for competition {competition_id}: {source}")]
    ResultsFailure {
        competition_id: String,
        source: Box<ApiError>,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Fallback when the server reports failure without a message
pub(crate) const GENERIC_REMOTE_ERROR: &str = "The server reported an unknown error";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Remote(format!("Status {}: {}", status, Self::truncate_body(body)))
    }

    /// Error from a `{ success: false }` payload.
    pub fn from_payload(message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_REMOTE_ERROR);
        ApiError::Remote(message.to_string())
    }

    /// The innermost error, looking through category and competition wrappers.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::LoadFailure { source, .. } | ApiError::ResultsFailure { source, .. } => {
                source.root()
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "ก".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 1200 total bytes"));
    }

    #[test]
    fn test_from_payload_falls_back_to_generic_message() {
        assert!(matches!(
            ApiError::from_payload(Some("Sheet not found")),
            ApiError::Remote(m) if m == "Sheet not found"
        ));
        assert!(matches!(
            ApiError::from_payload(Some("  ")),
            ApiError::Remote(m) if m == GENERIC_REMOTE_ERROR
        ));
        assert!(matches!(
            ApiError::from_payload(None),
            ApiError::Remote(m) if m == GENERIC_REMOTE_ERROR
        ));
    }

    #[test]
    fn test_load_failure_message_names_category() {
        let err = ApiError::LoadFailure {
            category: Category::Gem,
            source: Box::new(ApiError::Timeout(15_000)),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load gem competitions: Request timed out after 15000 ms"
        );
        assert!(matches!(err.root(), ApiError::Timeout(15_000)));
    }
}
