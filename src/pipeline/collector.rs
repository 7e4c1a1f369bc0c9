//! Collector: the single consumer that drains worker outcomes into the sink.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::pipeline::Outcome;
use crate::records::ResultSink;

/// Tally of one remediation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Input records handed to the pipeline.
    pub records: usize,
    /// Credit lines cancelled (result rows produced).
    pub cancelled: usize,
    /// Records dropped because the cancelled line had no active loans.
    pub skipped: usize,
    /// Records that failed in continue-on-error mode.
    pub failed: usize,
}

impl RunSummary {
    pub(crate) fn new(records: usize) -> Self {
        Self {
            records,
            cancelled: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Drains the output channel until it closes, writing each cancelled-line row
/// to the sink in arrival order.
///
/// A sink write failure is logged together with the row identifiers (so the
/// data is still recoverable from the logs) and the loop continues. After the
/// run has been cancelled, remaining outcomes are received and discarded so
/// that no worker blocks on a full channel during shutdown; nothing written
/// during a cancelled run is persisted anyway.
pub(crate) async fn collect(
    mut output: mpsc::Receiver<Outcome>,
    sink: &mut dyn ResultSink,
    cancel: &CancellationToken,
    records: usize,
) -> RunSummary {
    let mut summary = RunSummary::new(records);

    while let Some(outcome) = output.recv().await {
        if cancel.is_cancelled() {
            continue;
        }

        match outcome {
            Outcome::Cancelled(row) => {
                summary.cancelled += 1;
                if let Err(e) = sink.write_row(&row) {
                    warn!(
                        "[PIPELINE] dropped result row {};{}: {}",
                        row.credit_line_id, row.borrower_id, e
                    );
                }
            }
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed { record, reason } => {
                summary.failed += 1;
                warn!(
                    "[PIPELINE] record {};{} not remediated: {}",
                    record.credit_line_id, record.borrower_id, reason
                );
            }
        }
    }

    summary
}
