//! Command-line entry point for the credit-line remediation run.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use creditline_sweep::config::{
    FailureMode, RunConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_WORKERS,
};
use creditline_sweep::credits::CreditsClient;
use creditline_sweep::error::AppError;
use creditline_sweep::pipeline;
use creditline_sweep::records::{read_input_records, CsvResultSink};

/// Cancels the remaining active credit lines of borrowers whose cancelled
/// line still has active loans.
#[derive(Parser, Debug)]
#[command(name = "creditline-sweep", version, about)]
struct Cli {
    /// Input CSV file, one `credit_line_id,borrower_id` row per line, no
    /// header.
    input: PathBuf,

    /// Output CSV file for newly cancelled credit lines.
    output: PathBuf,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Capacity of the pipeline channels.
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Keep going after a failed record instead of aborting the run.
    #[arg(long)]
    continue_on_error: bool,

    /// Override the loans API base URL.
    #[arg(long)]
    loans_base_url: Option<String>,

    /// Override the credit-lines API base URL.
    #[arg(long)]
    credit_lines_base_url: Option<String>,
}

impl Cli {
    fn into_config(self) -> (RunConfig, PathBuf, PathBuf) {
        let mut config = RunConfig::default()
            .workers(self.workers)
            .channel_capacity(self.channel_capacity);
        if self.continue_on_error {
            config = config.failure_mode(FailureMode::ContinueOnError);
        }
        if let Some(url) = self.loans_base_url {
            config = config.loans_base_url(url);
        }
        if let Some(url) = self.credit_lines_base_url {
            config = config.credit_lines_base_url(url);
        }
        (config, self.input, self.output)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("[MAIN] run aborted: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let (config, input_path, output_path) = cli.into_config();

    let records = read_input_records(&input_path).await?;
    info!(
        "[MAIN] loaded {} input records from {}",
        records.len(),
        input_path.display()
    );

    let client = CreditsClient::new(&config)?;
    let mut sink = CsvResultSink::new(&output_path)?;

    let summary = pipeline::run(&config, Arc::new(client), records, &mut sink).await?;

    info!(
        "[MAIN] wrote {} cancelled credit lines to {} ({} skipped, {} failed)",
        summary.cancelled,
        output_path.display(),
        summary.skipped,
        summary.failed
    );
    Ok(())
}
