use std::future::Future;

use super::{ApiClient, ApiError, CategoryFetch};
use crate::models::{Category, RawRecord};

/// Where the manager gets raw competition data from.
///
/// `ApiClient` is the production implementation; tests substitute
/// in-process fakes.
pub trait CompetitionSource: Send + Sync {
    /// Fetch both category catalogues; each side succeeds or fails on its own.
    fn fetch_all_categories(&self) -> impl Future<Output = CategoryFetch> + Send;

    fn fetch_competition_results(
        &self,
        competition_id: &str,
        category: Category,
    ) -> impl Future<Output = Result<Vec<RawRecord>, ApiError>> + Send;
}

impl CompetitionSource for ApiClient {
    async fn fetch_all_categories(&self) -> CategoryFetch {
        ApiClient::fetch_all_categories(self).await
    }

    async fn fetch_competition_results(
        &self,
        competition_id: &str,
        category: Category,
    ) -> Result<Vec<RawRecord>, ApiError> {
        ApiClient::fetch_competition_results(self, competition_id, category).await
    }
}
