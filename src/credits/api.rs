//! The three credit-service operations the remediation depends on.
//!
//! Wire types mirror the remote JSON exactly. All operations map transport
//! failures, non-success statuses, and unparseable bodies to
//! `AppError::Remote`; only a cancel call whose response carries the wrong
//! status yields `AppError::Verification`.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;

use crate::credits::client::CreditsClient;
use crate::credits::{ACTIVE_CREDIT_LINE_STATUSES, ACTIVE_LOAN_STATUSES, CANCELLED_STATUS};
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match the credit-service JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

/// Paging metadata returned by search endpoints.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct WirePaging {
    total: i64,
    limit: i64,
    offset: i64,
}

/// A loan as returned by the loans search. Only its presence matters.
#[derive(Debug, Deserialize)]
struct WireLoan {
    #[allow(dead_code)]
    id: i64,
}

/// Loans search response page.
#[derive(Debug, Deserialize)]
struct WireLoanPage {
    #[allow(dead_code)]
    #[serde(default)]
    paging: Option<WirePaging>,
    #[serde(default)]
    results: Vec<WireLoan>,
}

/// A credit line as returned by search and update endpoints.
#[derive(Debug, Deserialize)]
struct WireCreditLine {
    id: i64,
    #[allow(dead_code)]
    #[serde(default)]
    borrower_id: i64,
    status: String,
}

/// Credit-lines search response page.
#[derive(Debug, Deserialize)]
struct WireCreditLinePage {
    #[serde(default)]
    results: Vec<WireCreditLine>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────────────────────────

impl CreditsClient {
    /// Returns true if at least one loan for this (borrower, credit line)
    /// pair is in an active status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` on transport error, non-success status, or
    /// a response body that fails to parse.
    pub async fn has_active_loans(
        &self,
        credit_line_id: &str,
        borrower_id: &str,
    ) -> Result<bool, AppError> {
        let mut url = self.loans_url("search")?;
        url.query_pairs_mut()
            .append_pair("offset", "0")
            .append_pair("limit", "100")
            .append_pair("sort", "date_created")
            .append_pair("status", ACTIVE_LOAN_STATUSES)
            .append_pair("borrower_id", borrower_id)
            .append_pair("credit_line_id", credit_line_id);

        let response = self
            .execute(Method::GET, url, None, self.caller_headers()?)
            .await?;

        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(AppError::Remote(format!(
                "loans search failed for credit line {}: HTTP {} - {}",
                credit_line_id,
                status.as_u16(),
                body
            )));
        }

        let page: WireLoanPage = serde_json::from_str(&body).map_err(|e| {
            AppError::Remote(format!("malformed loans search response: {}", e))
        })?;

        Ok(!page.results.is_empty())
    }

    /// Returns the IDs of the borrower's credit lines that are still active,
    /// in response order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` on transport error, non-success status, or
    /// a response body that fails to parse.
    pub async fn search_active_credit_lines(
        &self,
        borrower_id: &str,
    ) -> Result<Vec<i64>, AppError> {
        let mut url = self.credit_lines_url("search")?;
        url.query_pairs_mut()
            .append_pair("caller.id", borrower_id)
            .append_pair("borrower_id", borrower_id)
            .append_pair("product", &self.product)
            .append_pair("status", ACTIVE_CREDIT_LINE_STATUSES);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self.execute(Method::GET, url, None, headers).await?;

        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(AppError::Remote(format!(
                "credit-line search failed for borrower {}: HTTP {} - {}",
                borrower_id,
                status.as_u16(),
                body
            )));
        }

        let page: WireCreditLinePage = serde_json::from_str(&body).map_err(|e| {
            AppError::Remote(format!("malformed credit-line search response: {}", e))
        })?;

        Ok(page.results.into_iter().map(|line| line.id).collect())
    }

    /// Cancels one credit line and verifies the resulting status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` on transport/status/parse failure, or
    /// `AppError::Verification` if the update succeeded but the returned
    /// entity is not in `cancelled` status.
    pub async fn cancel_credit_line(
        &self,
        credit_line_id: i64,
        borrower_id: &str,
    ) -> Result<(), AppError> {
        let mut url = self.credit_lines_url(&credit_line_id.to_string())?;
        url.query_pairs_mut().append_pair("caller.id", borrower_id);

        let body = serde_json::json!({
            "status": CANCELLED_STATUS,
            "status_detail": self.cancel_reason,
        });

        let response = self
            .execute(Method::PUT, url, Some(body), HeaderMap::new())
            .await?;

        let status = response.status();
        let body = read_body(response).await?;
        if !status.is_success() {
            return Err(AppError::Remote(format!(
                "cancel failed for credit line {}: HTTP {} - {}",
                credit_line_id,
                status.as_u16(),
                body
            )));
        }

        let line: WireCreditLine = serde_json::from_str(&body).map_err(|e| {
            AppError::Remote(format!(
                "malformed cancel response for credit line {}: {}",
                credit_line_id, e
            ))
        })?;

        if line.status != CANCELLED_STATUS {
            return Err(AppError::Verification {
                credit_line_id,
                actual: line.status,
            });
        }

        Ok(())
    }

    /// Caller identity headers attached to loan-search requests.
    fn caller_headers(&self) -> Result<HeaderMap, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-caller-scopes",
            HeaderValue::from_str(&self.caller_scopes)
                .map_err(|e| AppError::Internal(format!("invalid caller scopes: {}", e)))?,
        );
        headers.insert(
            "x-caller-id",
            HeaderValue::from_str(&self.caller_id)
                .map_err(|e| AppError::Internal(format!("invalid caller id: {}", e)))?,
        );
        Ok(headers)
    }
}

/// Reads a response body, mapping read failures to `Remote`.
async fn read_body(response: reqwest::Response) -> Result<String, AppError> {
    response
        .text()
        .await
        .map_err(|e| AppError::Remote(format!("failed to read response body: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// CreditService Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The remote-service contract the pipeline depends on.
///
/// Lets the worker pool run against a fake service in tests. The real
/// implementation is [`CreditsClient`].
pub trait CreditService: Send + Sync {
    /// Does this (borrower, credit line) pair still have active loans?
    fn has_active_loans<'a>(
        &'a self,
        credit_line_id: &'a str,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AppError>> + Send + 'a>>;

    /// IDs of the borrower's currently active credit lines.
    fn search_active_credit_lines<'a>(
        &'a self,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<i64>, AppError>> + Send + 'a>>;

    /// Cancels one credit line, verifying the post-update status.
    fn cancel_credit_line<'a>(
        &'a self,
        credit_line_id: i64,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

impl CreditService for CreditsClient {
    fn has_active_loans<'a>(
        &'a self,
        credit_line_id: &'a str,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, AppError>> + Send + 'a>> {
        Box::pin(CreditsClient::has_active_loans(
            self,
            credit_line_id,
            borrower_id,
        ))
    }

    fn search_active_credit_lines<'a>(
        &'a self,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<i64>, AppError>> + Send + 'a>> {
        Box::pin(CreditsClient::search_active_credit_lines(self, borrower_id))
    }

    fn cancel_credit_line<'a>(
        &'a self,
        credit_line_id: i64,
        borrower_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(CreditsClient::cancel_credit_line(
            self,
            credit_line_id,
            borrower_id,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
