//! Worker pool: the per-record remediation logic.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FailureMode;
use crate::credits::CreditService;
use crate::error::AppError;
use crate::pipeline::Outcome;
use crate::records::{InputRecord, ResultRow};

/// One worker of the pool.
///
/// Competes with its peers for records on the shared input channel and pushes
/// outcomes onto the output channel. Returns when the input channel is
/// exhausted or the run is cancelled; the output channel closes once every
/// worker has returned and dropped its sender.
///
/// In fail-fast mode a remote or verification error is stored in the shared
/// first-error slot and cancels the whole run; peers abandon their in-flight
/// record without issuing further remote calls. In continue-on-error mode it
/// becomes a per-record failure outcome.
pub(crate) async fn run_worker(
    worker_id: usize,
    service: Arc<dyn CreditService>,
    input: Arc<Mutex<mpsc::Receiver<InputRecord>>>,
    output: mpsc::Sender<Outcome>,
    cancel: CancellationToken,
    failure_mode: FailureMode,
    first_error: Arc<Mutex<Option<AppError>>>,
) {
    debug!("[PIPELINE] worker {} started", worker_id);

    loop {
        // Hold the receiver lock only for the receive itself.
        let received = {
            let mut rx = input.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                record = rx.recv() => record,
            }
        };

        let Some(record) = received else {
            break; // input exhausted, loader is done
        };

        if let Err(e) = remediate(service.as_ref(), &record, &output, &cancel).await {
            match failure_mode {
                FailureMode::FailFast => {
                    // Store before cancelling so the slot always holds the
                    // failure that stopped the run.
                    {
                        let mut slot = first_error.lock().await;
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                    cancel.cancel();
                    return;
                }
                FailureMode::ContinueOnError => {
                    warn!(
                        "[PIPELINE] credit line {} (borrower {}) failed: {}",
                        record.credit_line_id, record.borrower_id, e
                    );
                    let reason = e.to_string();
                    if output.send(Outcome::Failed { record, reason }).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    debug!("[PIPELINE] worker {} finished", worker_id);
}

/// Remediates a single input record.
///
/// A record is only acted on when its cancelled credit line still has active
/// loans; in that case every active credit line of the borrower is cancelled
/// and reported as a result row.
///
/// Once the run is cancelled the record is abandoned: an in-flight search is
/// dropped and no further cancel call starts. A cancel call already sent to
/// the remote is allowed to finish so its row is still reported.
async fn remediate(
    service: &dyn CreditService,
    record: &InputRecord,
    output: &mpsc::Sender<Outcome>,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let has_active_loans = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = service.has_active_loans(&record.credit_line_id, &record.borrower_id) => result?,
    };

    info!(
        "[PIPELINE] credit line {} (borrower {}): active loans = {}",
        record.credit_line_id, record.borrower_id, has_active_loans
    );

    if !has_active_loans {
        output.send(Outcome::Skipped).await.ok();
        return Ok(());
    }

    let credit_lines = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = service.search_active_credit_lines(&record.borrower_id) => result?,
    };

    for credit_line_id in credit_lines {
        if cancel.is_cancelled() {
            return Ok(());
        }

        service
            .cancel_credit_line(credit_line_id, &record.borrower_id)
            .await?;

        let row = ResultRow {
            credit_line_id: credit_line_id.to_string(),
            borrower_id: record.borrower_id.clone(),
        };
        // A closed output channel means the run is tearing down; the row was
        // cancelled remotely, so stop before issuing more.
        if output.send(Outcome::Cancelled(row)).await.is_err() {
            return Ok(());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::FakeCreditService;

    async fn drain(mut rx: mpsc::Receiver<Outcome>) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn record_without_active_loans_is_skipped() {
        let service = FakeCreditService::new();
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);

        remediate(&service, &record, &tx, &CancellationToken::new())
            .await
            .unwrap();

        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Outcome::Skipped));
        assert!(service.cancelled().is_empty());
    }

    #[tokio::test]
    async fn active_record_cancels_every_discovered_line_in_order() {
        let service = FakeCreditService::new()
            .with_active_loans("100", "B1")
            .with_active_lines("B1", vec![101, 102, 103]);
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);

        remediate(&service, &record, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            service.cancelled(),
            vec![
                (101, "B1".to_string()),
                (102, "B1".to_string()),
                (103, "B1".to_string()),
            ]
        );

        let outcomes = drain(rx).await;
        let rows: Vec<&ResultRow> = outcomes
            .iter()
            .filter_map(|o| match o {
                Outcome::Cancelled(row) => Some(row),
                _ => None,
            })
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].credit_line_id, "101");
        assert_eq!(rows[2].credit_line_id, "103");
    }

    #[tokio::test]
    async fn cancel_failure_stops_before_remaining_lines() {
        let service = FakeCreditService::new()
            .with_active_loans("100", "B1")
            .with_active_lines("B1", vec![101, 102])
            .with_cancel_failure(101);
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);

        let err = remediate(&service, &record, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        // 102 was never attempted and no row was emitted
        assert!(service.cancelled().is_empty());
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn already_cancelled_run_makes_no_remote_calls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let service = FakeCreditService::new()
            .with_active_loans("100", "B1")
            .with_active_lines("B1", vec![101]);
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);

        remediate(&service, &record, &tx, &cancel).await.unwrap();

        assert!(service.loan_checks().is_empty());
        assert!(service.cancelled().is_empty());
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_the_next_cancel_call() {
        let cancel = CancellationToken::new();
        let service = FakeCreditService::new()
            .with_active_loans("100", "B1")
            .with_active_lines("B1", vec![101, 102, 103])
            .with_run_cancelled_during(101, cancel.clone());
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);

        remediate(&service, &record, &tx, &cancel).await.unwrap();

        // the in-flight cancel completed and was reported; 102 and 103 never
        // started
        assert_eq!(service.cancelled(), vec![(101, "B1".to_string())]);
        let outcomes = drain(rx).await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Outcome::Cancelled(row) => assert_eq!(row.credit_line_id, "101"),
            other => panic!("expected Cancelled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn closed_output_channel_ends_the_record_early() {
        let service = FakeCreditService::new()
            .with_active_loans("100", "B1")
            .with_active_lines("B1", vec![101, 102]);
        let record = InputRecord {
            credit_line_id: "100".into(),
            borrower_id: "B1".into(),
        };
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        remediate(&service, &record, &tx, &CancellationToken::new())
            .await
            .unwrap();

        // the first cancel's row could not be delivered, so no further line
        // was touched
        assert_eq!(service.cancelled(), vec![(101, "B1".to_string())]);
    }
}
