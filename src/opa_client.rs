//! HTTP client for the Opa Suite API.
//!
//! This module provides the `OpaClient` struct for making authenticated
//! requests to the Opa Suite REST API and assembling the raw snapshot the
//! reconciliation engine consumes.
//!
//! # Retry Logic
//!
//! The client automatically retries transient failures:
//! - HTTP 429 (rate limit): Exponential backoff starting at 100ms
//! - HTTP 502/503/504: Single retry after 500ms
//! - Timeouts: Single retry
//!
//! Client errors (4xx except 429) are not retried.
//!
//! # Security
//!
//! The API token is never logged. All error messages are sanitized before
//! logging.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::MiranteError;
use crate::reconcile::RawSnapshot;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retry attempts for transient failures.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial delay for exponential backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Delay before retrying after server error (milliseconds).
const SERVER_ERROR_DELAY_MS: u64 = 500;

/// Maximum length for HTTP error response bodies to avoid leaking verbose
/// upstream internals.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Reference lists populated inline on ticket records.
const TICKET_POPULATE: &[&str] = &[
    "id_cliente",
    "id_atendente",
    "id_motivo_atendimento",
    "setor",
    "id_contato",
];

/// HTTP client for the Opa Suite API.
///
/// Handles authentication, LoopBack-style filter formatting, and response
/// parsing for the list endpoints the dashboard reads.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = OpaClient::new(&config)?;
///
/// let snapshot = client.fetch_snapshot().await;
/// ```
#[derive(Clone)]
pub struct OpaClient {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Base URL for the Opa API (e.g., `https://example.opasuite.com.br/api/v1`).
    base_url: String,

    /// API token for authentication.
    /// SECURITY: Never log this value!
    api_token: String,
}

impl OpaClient {
    /// Creates a new Opa client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `MiranteError::HttpClient` if the HTTP client fails to
    /// initialize.
    pub fn new(config: &Config) -> Result<Self, MiranteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(MiranteError::HttpClient)?;

        // Ensure base_url ends with /api/v1
        let base_url = Self::normalize_base_url(&config.base_url);

        Ok(Self {
            http,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    /// Normalizes the base URL to ensure it includes the API path.
    fn normalize_base_url(url: &str) -> String {
        let url = url.trim_end_matches('/');
        if url.ends_with("/api/v1") {
            url.to_string()
        } else if url.ends_with("/api") {
            format!("{}/v1", url)
        } else {
            format!("{}/api/v1", url)
        }
    }

    /// Tests connectivity to the Opa server.
    ///
    /// Makes a minimal list call to verify the server is reachable and
    /// authentication is working.
    ///
    /// # Errors
    ///
    /// Returns `MiranteError::ConnectionTest` if the connection fails,
    /// with details about the failure reason.
    pub async fn test_connection(&self) -> Result<(), MiranteError> {
        tracing::debug!("Testing connection to Opa server");

        let result = self
            .fetch_list("/usuario", ListQuery::new().with_limit(1))
            .await;

        match result {
            Ok(_) => {
                tracing::info!("Connection test successful");
                Ok(())
            }
            Err(MiranteError::Authentication) => Err(MiranteError::connection_test(
                "Authentication failed - verify OPA_API_TOKEN is correct",
            )),
            Err(MiranteError::Timeout { duration, .. }) => {
                Err(MiranteError::connection_test(format!(
                    "Connection timed out after {:?} - verify OPA_BASE_URL is correct and server is reachable",
                    duration
                )))
            }
            Err(MiranteError::Http(e)) => {
                let message = MiranteError::sanitize_message(&e.to_string(), &self.api_token);
                Err(MiranteError::connection_test(format!(
                    "HTTP error: {} - verify OPA_BASE_URL is correct",
                    message
                )))
            }
            Err(e) => {
                let message = MiranteError::sanitize_message(&e.to_string(), &self.api_token);
                Err(MiranteError::connection_test(message))
            }
        }
    }

    /// Fetches all raw record lists for one refresh cycle.
    ///
    /// Active and finished tickets, active users, clients, and contacts are
    /// fetched concurrently. A failed list degrades to an empty list (logged
    /// at WARN) so the dashboard shows partial data instead of crashing;
    /// this method itself never fails.
    pub async fn fetch_snapshot(&self) -> RawSnapshot {
        let populate: Vec<String> = TICKET_POPULATE.iter().map(|s| s.to_string()).collect();

        let active = self.fetch_list(
            "/atendimento",
            ListQuery::new()
                .with_where(json!({"status": {"neq": "F"}}))
                .with_limit(500)
                .with_include(populate.clone()),
        );
        let finished = self.fetch_list(
            "/atendimento",
            ListQuery::new()
                .with_where(json!({"status": "F"}))
                .with_limit(1000)
                .with_sort("-_id")
                .with_include(populate),
        );
        let users = self.fetch_list(
            "/usuario",
            ListQuery::new()
                .with_where(json!({"status": "A"}))
                .with_limit(200),
        );
        let clients = self.fetch_list("/cliente", ListQuery::new().with_limit(500).with_sort("-_id"));
        let contacts = self.fetch_list("/contato", ListQuery::new().with_limit(500).with_sort("-_id"));

        let (active, finished, users, clients, contacts) =
            tokio::join!(active, finished, users, clients, contacts);

        let mut tickets = self.unwrap_list(active, "active tickets");
        tickets.extend(self.unwrap_list(finished, "finished tickets"));

        RawSnapshot {
            tickets,
            attendants: self.unwrap_list(users, "attendants"),
            clients: self.unwrap_list(clients, "clients"),
            contacts: self.unwrap_list(contacts, "contacts"),
            ..RawSnapshot::default()
        }
    }

    /// Unwraps a list result, substituting an empty list on failure.
    fn unwrap_list(&self, result: Result<Vec<Value>, MiranteError>, name: &str) -> Vec<Value> {
        match result {
            Ok(list) => {
                tracing::debug!(list = name, count = list.len(), "Upstream list fetched");
                list
            }
            Err(e) => {
                tracing::warn!(
                    list = name,
                    error = %e.sanitized_display(&self.api_token),
                    "Upstream list failed, continuing with empty list"
                );
                Vec::new()
            }
        }
    }

    /// Executes an operation with retry logic for transient failures.
    ///
    /// Retries on:
    /// - HTTP 429 (rate limit) with exponential backoff
    /// - HTTP 502/503/504 with fixed delay
    /// - Timeouts with fixed delay
    ///
    /// Does not retry on client errors (4xx except 429).
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, MiranteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MiranteError>>,
    {
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempts < MAX_RETRY_ATTEMPTS => {
                    let actual_delay = if e.is_rate_limit() {
                        e.retry_after().unwrap_or(delay)
                    } else if matches!(e, MiranteError::ServiceUnavailable { .. }) {
                        Duration::from_millis(SERVER_ERROR_DELAY_MS)
                    } else {
                        delay
                    };

                    tracing::debug!(
                        operation = operation,
                        attempt = attempts,
                        max_attempts = MAX_RETRY_ATTEMPTS,
                        delay_ms = actual_delay.as_millis() as u64,
                        error = %e.sanitized_display(&self.api_token),
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(actual_delay).await;

                    if e.is_rate_limit() {
                        delay *= 2;
                    }
                }
                Err(e) => {
                    if attempts > 1 {
                        tracing::debug!(
                            operation = operation,
                            attempts = attempts,
                            "All retry attempts exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Fetches one record list with automatic retry for transient failures.
    async fn fetch_list(&self, path: &str, query: ListQuery) -> Result<Vec<Value>, MiranteError> {
        let operation = format!("GET {}", path);
        self.with_retry(&operation, || self.fetch_list_inner(path, query.clone()))
            .await
    }

    /// Makes one list request without retry logic.
    async fn fetch_list_inner(
        &self,
        path: &str,
        query: ListQuery,
    ) -> Result<Vec<Value>, MiranteError> {
        let url = format!("{}{}", self.base_url, path);
        let filter = serde_json::to_string(&query.to_filter_value())?;

        tracing::debug!(path = %path, "Making Opa API request");

        let response = self
            .http
            .get(&url)
            .query(&[("filter", filter.as_str())])
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    return MiranteError::timeout(
                        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                        format!("GET {}", path),
                    );
                }
                MiranteError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_http_error(status, response).await);
        }

        let body = response.text().await.map_err(MiranteError::Http)?;

        tracing::trace!(body = %body, "Opa API response");

        let parsed: Value = serde_json::from_str(&body)?;
        Self::extract_list(path, parsed)
    }

    /// Extracts the record array from a list response.
    ///
    /// The upstream answers either with a bare JSON array or with a
    /// `{"data": [...]}` envelope depending on API version.
    fn extract_list(path: &str, payload: Value) -> Result<Vec<Value>, MiranteError> {
        match payload {
            Value::Array(list) => Ok(list),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(list)) => Ok(list),
                Some(_) => Err(MiranteError::payload(path, "data field is not an array")),
                None => Err(MiranteError::payload(
                    path,
                    "expected an array or a data envelope",
                )),
            },
            _ => Err(MiranteError::payload(path, "expected an array")),
        }
    }

    /// Handles HTTP-level errors and converts to MiranteError.
    ///
    /// Classifies errors into specific types for proper retry handling.
    async fn handle_http_error(&self, status: StatusCode, response: reqwest::Response) -> MiranteError {
        // Try to extract retry-after header for rate limiting
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        // Sanitize the body to ensure no token leakage
        let body = MiranteError::sanitize_message(&body, &self.api_token);
        // Truncate to avoid leaking verbose upstream internals
        let body = if body.len() > MAX_ERROR_BODY_LEN {
            let mut end = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...[truncated]", &body[..end])
        } else {
            body
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MiranteError::Authentication,
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Rate limited by Opa server");
                MiranteError::RateLimited { retry_after }
            }
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                tracing::warn!(status = %status, "Opa server temporarily unavailable");
                MiranteError::ServiceUnavailable { status }
            }
            _ => MiranteError::HttpStatus { status, body },
        }
    }
}

/// LoopBack-style list query sent in the `filter` query parameter.
///
/// Use the builder methods to set the where clause, pagination, ordering,
/// and populated references.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Filter conditions.
    where_clause: Value,

    /// Maximum number of records to return.
    limit: u32,

    /// Number of records to skip.
    skip: u32,

    /// Sort shorthand (`field` ascending, `-field` descending).
    sort: Option<String>,

    /// Referenced records to populate inline.
    include: Vec<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            where_clause: json!({}),
            limit: 1000,
            skip: 0,
            sort: None,
            include: Vec::new(),
        }
    }
}

impl ListQuery {
    /// Creates an empty query (all records, default pagination).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the where clause.
    pub fn with_where(mut self, conditions: Value) -> Self {
        self.where_clause = conditions;
        self
    }

    /// Sets the maximum number of records to return.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of records to skip for pagination.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the sort shorthand (`field` ascending, `-field` descending).
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the referenced records to populate inline.
    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    /// Converts the query to the LoopBack filter JSON structure.
    fn to_filter_value(&self) -> Value {
        let order = match &self.sort {
            Some(sort) => match sort.strip_prefix('-') {
                Some(field) => format!("{} DESC", field),
                None => format!("{} ASC", sort),
            },
            None => "_id DESC".to_string(),
        };

        json!({
            "where": self.where_clause,
            "limit": self.limit,
            "skip": self.skip,
            "order": order,
            "include": self.include,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            OpaClient::normalize_base_url("https://example.com"),
            "https://example.com/api/v1"
        );
        assert_eq!(
            OpaClient::normalize_base_url("https://example.com/"),
            "https://example.com/api/v1"
        );
        assert_eq!(
            OpaClient::normalize_base_url("https://example.com/api/v1"),
            "https://example.com/api/v1"
        );
        assert_eq!(
            OpaClient::normalize_base_url("https://example.com/api/v1/"),
            "https://example.com/api/v1"
        );
        assert_eq!(
            OpaClient::normalize_base_url("https://example.com/api"),
            "https://example.com/api/v1"
        );
    }

    #[test]
    fn test_list_query_defaults() {
        let filter = ListQuery::new().to_filter_value();
        assert_eq!(filter["limit"], 1000);
        assert_eq!(filter["skip"], 0);
        assert_eq!(filter["order"], "_id DESC");
        assert!(filter["where"].as_object().unwrap().is_empty());
        assert!(filter["include"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_list_query_descending_sort_shorthand() {
        let filter = ListQuery::new().with_sort("-_id").to_filter_value();
        assert_eq!(filter["order"], "_id DESC");
        let filter = ListQuery::new().with_sort("nome").to_filter_value();
        assert_eq!(filter["order"], "nome ASC");
    }

    #[test]
    fn test_list_query_where_and_include() {
        let filter = ListQuery::new()
            .with_where(json!({"status": {"neq": "F"}}))
            .with_limit(500)
            .with_include(vec!["setor".to_string()])
            .to_filter_value();
        assert_eq!(filter["where"]["status"]["neq"], "F");
        assert_eq!(filter["limit"], 500);
        assert_eq!(filter["include"][0], "setor");
    }

    #[test]
    fn test_extract_list_bare_array() {
        let payload = json!([{"_id": "1"}]);
        let list = OpaClient::extract_list("/cliente", payload).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_extract_list_data_envelope() {
        let payload = json!({"data": [{"_id": "1"}, {"_id": "2"}]});
        let list = OpaClient::extract_list("/cliente", payload).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_extract_list_rejects_other_shapes() {
        assert!(OpaClient::extract_list("/cliente", json!({"error": "x"})).is_err());
        assert!(OpaClient::extract_list("/cliente", json!({"data": "x"})).is_err());
        assert!(OpaClient::extract_list("/cliente", json!("x")).is_err());
    }
}
