//! The remediation pipeline: loader, worker pool, and collector.
//!
//! One producer fans input records out to a fixed pool of workers over a
//! bounded channel; workers fan result rows back in to a single collector
//! over a second bounded channel. The output channel closes only after the
//! loader has finished and every worker has returned, so the collector
//! observes every outcome before the orchestrator returns.
//!
//! Fail-fast (the default) means the first remote or verification error
//! cancels the run: the loader stops dispatching, workers bail out at their
//! next receive, and nothing is persisted to the sink.

mod collector;
mod worker;

pub use collector::RunSummary;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RunConfig;
use crate::credits::CreditService;
use crate::error::AppError;
use crate::records::{InputRecord, ResultSink};

/// Message from a worker to the collector.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A credit line was cancelled and verified.
    Cancelled(crate::records::ResultRow),
    /// The record's cancelled line had no active loans; nothing to do.
    Skipped,
    /// Continue-on-error mode only: the record could not be remediated.
    Failed { record: InputRecord, reason: String },
}

/// Runs one remediation pass over the given records.
///
/// Spawns the loader and `config.workers` workers, then drains the collector
/// loop inline until the output channel closes. The sink is finalized only on
/// success; on a fatal error it is left unfinished so no partial output is
/// persisted.
///
/// # Errors
///
/// In fail-fast mode, returns the worker failure that cancelled the run: the
/// first fatal error is stored at the moment it occurs, so the result does
/// not depend on task join order. Also fails on configuration or
/// sink-finalization errors.
pub async fn run(
    config: &RunConfig,
    service: Arc<dyn CreditService>,
    records: Vec<InputRecord>,
    sink: &mut dyn ResultSink,
) -> Result<RunSummary, AppError> {
    config.validate()?;

    let total = records.len();
    info!(
        "[PIPELINE] starting run: {} records, {} workers",
        total, config.workers
    );

    let cancel = CancellationToken::new();
    let (input_tx, input_rx) = mpsc::channel::<InputRecord>(config.channel_capacity);
    let (output_tx, output_rx) = mpsc::channel::<Outcome>(config.channel_capacity);
    let shared_input = Arc::new(Mutex::new(input_rx));

    let loader = tokio::spawn(load(records, input_tx, cancel.clone()));

    let first_error = Arc::new(Mutex::new(None::<AppError>));
    let mut workers: JoinSet<()> = JoinSet::new();
    for worker_id in 0..config.workers {
        workers.spawn(worker::run_worker(
            worker_id,
            service.clone(),
            shared_input.clone(),
            output_tx.clone(),
            cancel.clone(),
            config.failure_mode,
            first_error.clone(),
        ));
    }
    // The collector sees end-of-stream only once every worker has dropped its
    // sender clone.
    drop(output_tx);

    let summary = collector::collect(output_rx, sink, &cancel, total).await;

    loader
        .await
        .map_err(|e| AppError::Internal(format!("loader task panicked: {}", e)))?;

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            let mut slot = first_error.lock().await;
            if slot.is_none() {
                *slot = Some(AppError::Internal(format!("worker task panicked: {}", e)));
            }
        }
    }

    let failure = first_error.lock().await.take();
    if let Some(e) = failure {
        return Err(e);
    }

    sink.finish()?;

    info!(
        "[PIPELINE] run complete: {} records, {} cancelled, {} skipped, {} failed",
        summary.records, summary.cancelled, summary.skipped, summary.failed
    );
    Ok(summary)
}

/// Single producer: emits every record onto the input channel in input order,
/// then closes the channel by dropping the sender. Stops early if the run is
/// cancelled.
async fn load(
    records: Vec<InputRecord>,
    input: mpsc::Sender<InputRecord>,
    cancel: CancellationToken,
) {
    for record in records {
        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = input.send(record) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
