//! API client for the spreadsheet-backed competition endpoints.
//!
//! This module provides the `ApiClient` struct for fetching competition
//! catalogues and per-competition results, either from the two live
//! category endpoints or from a static JSON mirror.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::callback::{parse_invocation, CallbackPayload, CallbackRegistry, PendingRequest};
use super::ApiError;
use crate::config::Config;
use crate::models::{Category, RawRecord};

// ============================================================================
// Constants
// ============================================================================

/// Prefix for generated callback tokens
const CALLBACK_PREFIX: &str = "compboard_cb_";

/// Length of the random part of a callback token
const CALLBACK_TOKEN_LENGTH: usize = 12;

const ACTION_GET_COMPETITIONS: &str = "getCompetitions";
const ACTION_GET_RESULTS: &str = "getResults";

type TokenGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Outcome of fetching both category catalogues. Each side fails independently.
#[derive(Debug)]
pub struct CategoryFetch {
    pub science: Result<Vec<RawRecord>, ApiError>,
    pub gem: Result<Vec<RawRecord>, ApiError>,
}

impl CategoryFetch {
    /// Take one category's outcome, leaving an empty success in its place.
    pub fn take(&mut self, category: Category) -> Result<Vec<RawRecord>, ApiError> {
        let slot = match category {
            Category::Science => &mut self.science,
            Category::Gem => &mut self.gem,
        };
        std::mem::replace(slot, Ok(Vec::new()))
    }
}

#[derive(Clone)]
enum Endpoints {
    Live { science: Url, gem: Url },
    Mirror { base: Url },
}

/// API client for the competition endpoints.
/// Clone is cheap - reqwest::Client and the callback registry are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
    registry: CallbackRegistry,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    tokens: TokenGenerator,
}

impl ApiClient {
    /// Create a client from configuration.
    ///
    /// A configured mirror takes precedence; otherwise both category
    /// endpoints are required.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let endpoints = match config.mirror_url.as_deref() {
            Some(mirror) => Endpoints::Mirror {
                base: parse_base_url(mirror)?,
            },
            None => Endpoints::Live {
                science: parse_endpoint(config.science_url.as_deref(), Category::Science)?,
                gem: parse_endpoint(config.gem_url.as_deref(), Category::Gem)?,
            },
        };

        let client = Client::builder()
            .user_agent(concat!("compboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoints,
            registry: CallbackRegistry::new(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            tokens: Arc::new(random_token),
        })
    }

    /// Replace the callback token generator. Tokens must be unique per call.
    pub fn with_token_generator(
        mut self,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.tokens = Arc::new(generator);
        self
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn is_mirror(&self) -> bool {
        matches!(self.endpoints, Endpoints::Mirror { .. })
    }

    // ===== Callback request protocol =====

    fn build_url(base: &Url, action: &str, params: &[(&str, &str)], token: &str) -> Url {
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("callback", token);
            // Cache-buster
            query.append_pair("_", &Utc::now().timestamp_millis().to_string());
        }
        url
    }

    /// Issue one callback-style request and wait for its callback.
    async fn call(
        &self,
        base: &Url,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<CallbackPayload, ApiError> {
        let token = (self.tokens)();
        let url = Self::build_url(base, action, params, &token);
        debug!(action, callback = %token, "Dispatching callback request");

        let receiver = self.registry.register(&token);
        let artifact = tokio::spawn(Self::run_artifact(
            self.client.clone(),
            url,
            token.clone(),
            self.registry.clone(),
        ));
        // Cleanup on every exit path, including this future being dropped
        let _pending = PendingRequest::new(token.clone(), self.registry.clone(), artifact);

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::Network(format!(
                "callback {} was dropped before a response arrived",
                token
            ))),
            Err(_) => {
                warn!(action, callback = %token, timeout_ms = self.timeout_ms(), "Callback request timed out");
                Err(ApiError::Timeout(self.timeout_ms()))
            }
        }
    }

    /// Transport task for one call: performs the GET and hands the script
    /// body's callback invocation to the registry.
    async fn run_artifact(client: Client, url: Url, token: String, registry: CallbackRegistry) {
        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                registry.dispatch(&token, Err(e.into()));
                return;
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                registry.dispatch(&token, Err(e.into()));
                return;
            }
        };

        if !status.is_success() {
            registry.dispatch(&token, Err(ApiError::from_status(status, &body)));
            return;
        }

        // Without an invocation the caller simply waits out its deadline
        let Some((name, args)) = parse_invocation(&body) else {
            debug!(callback = %token, "Response did not invoke a callback");
            return;
        };

        // Only this request's own token may be answered from its body
        if name != token {
            warn!(callback = %token, invoked = %name, "Response invoked an unexpected callback, ignoring");
            return;
        }

        let result = serde_json::from_str::<CallbackPayload>(args).map_err(|e| {
            ApiError::InvalidFormat(format!("callback payload is not valid JSON: {}", e))
        });
        if !registry.dispatch(&token, result) {
            debug!(callback = %token, "Callback arrived with no listener, ignoring");
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    // ===== Mirror request path =====

    /// Plain GET of a JSON envelope, retried with linearly increasing delay.
    /// Surfaces the last error once every attempt has failed.
    pub async fn request(&self, url: &Url) -> Result<CallbackPayload, ApiError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.request_once(url).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    warn!(url = %url, attempt, max = self.max_retries, error = %e, "Mirror request failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Network("no request attempts were made".to_string())))
    }

    async fn request_once(&self, url: &Url) -> Result<CallbackPayload, ApiError> {
        let send = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(ApiError::from_status(status, &body));
            }
            serde_json::from_str::<CallbackPayload>(&body)
                .map_err(|e| ApiError::InvalidFormat(format!("mirror payload is not valid JSON: {}", e)))
        };

        tokio::time::timeout(self.timeout, send)
            .await
            .unwrap_or_else(|_| Err(ApiError::Timeout(self.timeout_ms())))
    }

    fn mirror_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Config(format!("mirror URL cannot be a base: {}", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ===== Data Fetching Methods =====

    async fn competitions_payload(&self, category: Category) -> Result<CallbackPayload, ApiError> {
        match &self.endpoints {
            Endpoints::Live { science, gem } => {
                let base = match category {
                    Category::Science => science,
                    Category::Gem => gem,
                };
                self.call(base, ACTION_GET_COMPETITIONS, &[]).await
            }
            Endpoints::Mirror { base } => {
                let file = format!("{}.json", category);
                let url = Self::mirror_url(base, &["competitions", &file])?;
                self.request(&url).await
            }
        }
    }

    async fn results_payload(
        &self,
        competition_id: &str,
        category: Category,
    ) -> Result<CallbackPayload, ApiError> {
        match &self.endpoints {
            Endpoints::Live { science, gem } => {
                let base = match category {
                    Category::Science => science,
                    Category::Gem => gem,
                };
                self.call(base, ACTION_GET_RESULTS, &[("id", competition_id)])
                    .await
            }
            Endpoints::Mirror { base } => {
                let file = format!("{}.json", competition_id);
                let url = Self::mirror_url(base, &["results", &file])?;
                self.request(&url).await
            }
        }
    }

    /// Fetch one category's competition catalogue as raw records.
    pub async fn fetch_category_competitions(
        &self,
        category: Category,
    ) -> Result<Vec<RawRecord>, ApiError> {
        let outcome = match self.competitions_payload(category).await {
            Ok(payload) => payload.into_records(),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(records) => {
                debug!(category = %category, count = records.len(), "Competitions fetched");
                Ok(records)
            }
            Err(e) => {
                warn!(category = %category, error = %e, "Failed to fetch competitions");
                Err(ApiError::LoadFailure {
                    category,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Fetch one competition's raw result rows.
    ///
    /// A payload whose data is not an array is logged and treated as empty.
    pub async fn fetch_competition_results(
        &self,
        competition_id: &str,
        category: Category,
    ) -> Result<Vec<RawRecord>, ApiError> {
        let outcome = match self.results_payload(competition_id, category).await {
            Ok(payload) => payload.into_records(),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(records) => {
                debug!(competition_id, count = records.len(), "Results fetched");
                Ok(records)
            }
            Err(ApiError::InvalidFormat(reason)) => {
                warn!(competition_id, reason = %reason, "Results payload has an invalid format, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(competition_id, error = %e, "Failed to fetch results");
                Err(ApiError::ResultsFailure {
                    competition_id: competition_id.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Fetch both category catalogues concurrently. Never fails as a whole.
    pub async fn fetch_all_categories(&self) -> CategoryFetch {
        let (science, gem) = tokio::join!(
            self.fetch_category_competitions(Category::Science),
            self.fetch_category_competitions(Category::Gem),
        );
        CategoryFetch { science, gem }
    }
}

fn random_token() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CALLBACK_TOKEN_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", CALLBACK_PREFIX, suffix)
}

fn parse_endpoint(url: Option<&str>, category: Category) -> Result<Url, ApiError> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Config(format!("no endpoint configured for {}", category)))?;
    Url::parse(url).map_err(|e| ApiError::Config(format!("invalid {} endpoint {}: {}", category, url, e)))
}

fn parse_base_url(url: &str) -> Result<Url, ApiError> {
    Url::parse(url.trim()).map_err(|e| ApiError::Config(format!("invalid mirror URL {}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> Config {
        Config {
            science_url: Some("https://script.example/science/exec".to_string()),
            gem_url: Some("https://script.example/gem/exec".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_random_tokens_are_unique_identifiers() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert!(a.starts_with(CALLBACK_PREFIX));
        assert!(parse_invocation(&format!("{}({{}})", a)).is_some());
    }

    #[test]
    fn test_build_url_carries_protocol_fields() {
        let base = Url::parse("https://script.example/exec?key=abc").unwrap();
        let url = ApiClient::build_url(&base, ACTION_GET_RESULTS, &[("id", "sci 01")], "cb_1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs[0], ("key".to_string(), "abc".to_string()));
        assert!(pairs.contains(&("action".to_string(), "getResults".to_string())));
        assert!(pairs.contains(&("id".to_string(), "sci 01".to_string())));
        assert!(pairs.contains(&("callback".to_string(), "cb_1".to_string())));
        assert!(pairs.iter().any(|(k, v)| k == "_" && v.parse::<i64>().is_ok()));
    }

    #[test]
    fn test_new_requires_both_endpoints_without_mirror() {
        let config = Config {
            gem_url: None,
            ..live_config()
        };
        assert!(matches!(ApiClient::new(&config), Err(ApiError::Config(_))));
        assert!(!ApiClient::new(&live_config()).unwrap().is_mirror());
    }

    #[test]
    fn test_mirror_takes_precedence() {
        let config = Config {
            mirror_url: Some("https://mirror.example/data/".to_string()),
            ..Config::default()
        };
        assert!(ApiClient::new(&config).unwrap().is_mirror());
    }

    #[test]
    fn test_mirror_url_encodes_ids() {
        let base = Url::parse("https://mirror.example/data/").unwrap();
        let url = ApiClient::mirror_url(&base, &["results", "a/b.json"]).unwrap();
        assert_eq!(url.as_str(), "https://mirror.example/data/results/a%2Fb.json");
    }

    #[test]
    fn test_category_fetch_take() {
        let mut fetch = CategoryFetch {
            science: Ok(vec![RawRecord::default()]),
            gem: Err(ApiError::Timeout(1)),
        };
        assert_eq!(fetch.take(Category::Science).unwrap().len(), 1);
        assert!(fetch.take(Category::Gem).is_err());
        assert!(fetch.take(Category::Gem).unwrap().is_empty());
    }
}
