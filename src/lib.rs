//! Batch remediation for credit lines left active after a cancellation.
//!
//! Reads a CSV of already-cancelled credit lines, checks each one against the
//! remote credit service for loans that are still active, and for every hit
//! cancels all of the borrower's remaining active credit lines. Newly
//! cancelled lines are written to an output CSV.
//!
//! Processing runs on a bounded pipeline: one loader feeds a fixed pool of
//! workers over a channel, and a single collector writes result rows in
//! arrival order. By default the first remote error aborts the whole run and
//! leaves no partial output behind.

pub mod config;
pub mod credits;
pub mod error;
pub mod pipeline;
pub mod records;
