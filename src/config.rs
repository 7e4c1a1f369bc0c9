//! Run configuration with documented defaults.
//!
//! Pool size, remote base paths, the product and status-detail values sent to
//! the credit service, and the caller identity headers all live here with
//! their defaults spelled out.

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default worker-pool size.
pub const DEFAULT_WORKERS: usize = 8;

/// Default bound for both pipeline channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Default base path for the loans search API.
pub const DEFAULT_LOANS_BASE_URL: &str = "https://internal-api.mercadolibre.com/credits/loans";

/// Default base path for the credit-lines API.
pub const DEFAULT_CREDIT_LINES_BASE_URL: &str =
    "https://internal-api.mercadolibre.com/credits/credit_lines";

/// Default product filter for the active-credit-lines search.
pub const DEFAULT_PRODUCT: &str = "express_money";

/// Default `status_detail` sent with every cancel request.
pub const DEFAULT_CANCEL_REASON: &str = "proposal_mistake";

/// Default caller identity attached to loan-search requests.
pub const DEFAULT_CALLER_ID: &str = "credits-admin-api";

/// Default caller scope attached to loan-search requests.
pub const DEFAULT_CALLER_SCOPES: &str = "admin";

// ─────────────────────────────────────────────────────────────────────────────
// FailureMode
// ─────────────────────────────────────────────────────────────────────────────

/// How the pipeline reacts to a fatal remote error inside a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Abort the whole run on the first remote or verification error.
    /// Records not yet dispatched are never processed and no output file is
    /// produced.
    #[default]
    FailFast,

    /// Capture the error as a per-record failure outcome and keep going.
    /// The run completes and the summary reports the failure count.
    ContinueOnError,
}

// ─────────────────────────────────────────────────────────────────────────────
// RunConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for one remediation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent workers (bounds outbound HTTP load).
    pub workers: usize,
    /// Capacity of the input and output channels.
    pub channel_capacity: usize,
    /// Base URL for loan search.
    pub loans_base_url: String,
    /// Base URL for credit-line search and update.
    pub credit_lines_base_url: String,
    /// Product filter for the active-credit-lines search.
    pub product: String,
    /// `status_detail` sent with every cancel request.
    pub cancel_reason: String,
    /// Value of the `x-caller-id` header.
    pub caller_id: String,
    /// Value of the `x-caller-scopes` header.
    pub caller_scopes: String,
    /// Fail-fast (default) or continue-on-error.
    pub failure_mode: FailureMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            loans_base_url: DEFAULT_LOANS_BASE_URL.to_string(),
            credit_lines_base_url: DEFAULT_CREDIT_LINES_BASE_URL.to_string(),
            product: DEFAULT_PRODUCT.to_string(),
            cancel_reason: DEFAULT_CANCEL_REASON.to_string(),
            caller_id: DEFAULT_CALLER_ID.to_string(),
            caller_scopes: DEFAULT_CALLER_SCOPES.to_string(),
            failure_mode: FailureMode::FailFast,
        }
    }
}

impl RunConfig {
    /// Sets the worker-pool size.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Sets the loans base URL.
    pub fn loans_base_url(mut self, url: impl Into<String>) -> Self {
        self.loans_base_url = url.into();
        self
    }

    /// Sets the credit-lines base URL.
    pub fn credit_lines_base_url(mut self, url: impl Into<String>) -> Self {
        self.credit_lines_base_url = url.into();
        self
    }

    /// Sets the product filter.
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    /// Sets the `status_detail` sent with cancel requests.
    pub fn cancel_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancel_reason = reason.into();
        self
    }

    /// Sets the `x-caller-id` header value.
    pub fn caller_id(mut self, id: impl Into<String>) -> Self {
        self.caller_id = id.into();
        self
    }

    /// Sets the `x-caller-scopes` header value.
    pub fn caller_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.caller_scopes = scopes.into();
        self
    }

    /// Sets the failure mode.
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the worker count or channel capacity
    /// is zero.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.workers == 0 {
            return Err(AppError::Internal(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(AppError::Internal(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
