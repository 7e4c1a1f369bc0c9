//! HTTP client and API layer for the remote credit service.
//!
//! The pipeline depends on exactly three operations:
//!
//! - **loan search** - does a cancelled credit line still have active loans?
//! - **credit-line search** - which lines of a borrower are still active?
//! - **credit-line update** - cancel one line and verify the new status.
//!
//! All three are exposed behind the [`CreditService`] trait so the pipeline
//! can run against a fake in tests.

pub mod api;
pub mod client;

pub use api::CreditService;
pub use client::CreditsClient;

/// Loan statuses that count as "active" for the remediation check.
pub const ACTIVE_LOAN_STATUSES: &str = "CREDITED,APPROVED,ON_TIME,OVERDUE";

/// Credit-line statuses that count as "active" (eligible for cancellation).
pub const ACTIVE_CREDIT_LINE_STATUSES: &str = "PENDING,APPROVED,REJECTED";

/// Target status written by a cancel call and verified afterwards.
pub const CANCELLED_STATUS: &str = "cancelled";
