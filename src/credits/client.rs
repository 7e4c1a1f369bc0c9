//! Credit-service HTTP transport with request timing and safe logging.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;
use url::Url;

use crate::config::RunConfig;
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all credit-service requests.
const CLIENT_USER_AGENT: &str = "creditline-sweep/0.1.0";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// CreditsClient
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the remote credit service.
///
/// Cheap to clone; every worker holds a clone sharing the same underlying
/// connection pool.
///
/// # Logging
///
/// Requests are logged as method, URL path, status, and duration. Query
/// strings are never logged because they carry borrower identifiers.
#[derive(Clone)]
pub struct CreditsClient {
    http: reqwest::Client,
    loans_base: Url,
    credit_lines_base: Url,
    pub(crate) product: String,
    pub(crate) cancel_reason: String,
    pub(crate) caller_id: String,
    pub(crate) caller_scopes: String,
}

impl CreditsClient {
    /// Creates a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if a base URL cannot be parsed or the
    /// HTTP client fails to initialize.
    pub fn new(config: &RunConfig) -> Result<Self, AppError> {
        let loans_base = Url::parse(&config.loans_base_url)
            .map_err(|e| AppError::Internal(format!("invalid loans base URL: {}", e)))?;
        let credit_lines_base = Url::parse(&config.credit_lines_base_url)
            .map_err(|e| AppError::Internal(format!("invalid credit-lines base URL: {}", e)))?;

        Ok(Self {
            http: build_http_client()?,
            loans_base,
            credit_lines_base,
            product: config.product.clone(),
            cancel_reason: config.cancel_reason.clone(),
            caller_id: config.caller_id.clone(),
            caller_scopes: config.caller_scopes.clone(),
        })
    }

    /// Builds a URL under the loans base path.
    pub(crate) fn loans_url(&self, segment: &str) -> Result<Url, AppError> {
        join_segment(&self.loans_base, segment)
    }

    /// Builds a URL under the credit-lines base path.
    pub(crate) fn credit_lines_url(&self, segment: &str) -> Result<Url, AppError> {
        join_segment(&self.credit_lines_base, segment)
    }

    /// Executes a request with timing and sanitized logging.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` for transport failures. Non-success status
    /// codes are left for the caller to map with the response body in hand.
    pub(crate) async fn execute(
        &self,
        method: reqwest::Method,
        url: Url,
        body: Option<serde_json::Value>,
        headers: HeaderMap,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let path = url.path().to_string();

        let mut request = self.http.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                info!(
                    "[CREDITS] {} {} {} {}ms",
                    method,
                    path,
                    response.status().as_u16(),
                    duration_ms
                );
                Ok(response)
            }
            Err(_) => {
                info!("[CREDITS] {} {} FAILED {}ms", method, path, duration_ms);
                // The raw reqwest error can contain the full URL with query
                // values; return a sanitized message instead.
                Err(AppError::Remote(format!(
                    "connection to credit service failed: {} {}",
                    method, path
                )))
            }
        }
    }
}

/// Appends a path segment to a base URL, preserving the base path.
fn join_segment(base: &Url, segment: &str) -> Result<Url, AppError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::Internal(format!("base URL cannot have segments: {}", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

/// Builds the configured HTTP client.
fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))
}
