//! Input and output record types plus their CSV source and sink.
//!
//! The input file is a headerless two-column CSV (`credit_line_id,
//! borrower_id`) read entirely into memory before processing starts. The
//! output sink writes one row per newly cancelled credit line to a temporary
//! file and atomically persists it on `finish()`; if the run aborts, the
//! temporary file is cleaned up and no partial output is left behind.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Record Types
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the input file: a cancelled credit line and its borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Identifier of the already-cancelled credit line.
    pub credit_line_id: String,
    /// Identifier of the borrower owning that line.
    pub borrower_id: String,
}

/// One row of the output file: a credit line newly cancelled by this run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultRow {
    /// Identifier of the credit line that was cancelled.
    pub credit_line_id: String,
    /// Identifier of the borrower owning that line.
    pub borrower_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Source
// ─────────────────────────────────────────────────────────────────────────────

/// Reads all input records from a headerless two-column CSV file.
///
/// The whole file is read before processing begins. Blocking CSV I/O runs on
/// the blocking thread pool.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be opened and
/// `AppError::CsvInvalid` for rows with fewer than two fields or other CSV
/// parse failures.
pub async fn read_input_records(path: &Path) -> Result<Vec<InputRecord>, AppError> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || read_input_records_blocking(&path))
        .await
        .map_err(|e| AppError::Internal(format!("input read task panicked: {}", e)))?
}

/// Blocking implementation of the input read.
fn read_input_records_blocking(path: &Path) -> Result<Vec<InputRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::Io(format!("failed to open {}: {}", path.display(), e)))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AppError::CsvInvalid(format!("row {}: {}", index + 1, e)))?;
        if record.len() < 2 {
            return Err(AppError::CsvInvalid(format!(
                "row {}: expected 2 fields, found {}",
                index + 1,
                record.len()
            )));
        }
        records.push(InputRecord {
            credit_line_id: record[0].to_string(),
            borrower_id: record[1].to_string(),
        });
    }

    Ok(records)
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Destination for result rows produced by the pipeline.
///
/// The collector treats a `write_row` failure as recoverable: it is logged and
/// the loop continues. `finish` is called only when the run completes.
pub trait ResultSink: Send {
    /// Writes one result row.
    fn write_row(&mut self, row: &ResultRow) -> Result<(), AppError>;

    /// Flushes buffered rows and finalizes the sink.
    fn finish(&mut self) -> Result<(), AppError>;
}

/// CSV result sink with atomic persistence.
///
/// Rows are written to a temporary file in the destination directory; the
/// destination is atomically replaced on `finish()`. Dropping the sink without
/// finishing deletes the temporary file.
pub struct CsvResultSink {
    writer: Option<Writer<BufWriter<NamedTempFile>>>,
    final_path: PathBuf,
}

impl CsvResultSink {
    /// Creates a sink targeting the given path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the parent directory cannot be determined or
    /// the temporary file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = final_path.parent().ok_or_else(|| {
            AppError::Io(format!(
                "cannot determine parent directory for: {}",
                final_path.display()
            ))
        })?;

        let temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| AppError::Io(format!("failed to create temporary file: {}", e)))?;

        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(temp_file));

        Ok(Self {
            writer: Some(writer),
            final_path,
        })
    }
}

impl ResultSink for CsvResultSink {
    fn write_row(&mut self, row: &ResultRow) -> Result<(), AppError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AppError::SinkWrite("sink already finished".to_string()))?;

        writer
            .write_record([row.credit_line_id.as_str(), row.borrower_id.as_str()])
            .map_err(|e| AppError::SinkWrite(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), AppError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| AppError::Internal("sink already finished".to_string()))?;

        let buf_writer = writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("failed to flush CSV writer: {}", e.error())))?;

        let temp_file = buf_writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("failed to flush buffer: {}", e.error())))?;

        temp_file.persist(&self.final_path).map_err(|e| {
            AppError::Io(format!(
                "failed to persist {}: {}",
                self.final_path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_headerless_two_column_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.csv");
        fs::write(&path, "100,B1\n200,B2\n300,B3\n").unwrap();

        let records = read_input_records(&path).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            InputRecord {
                credit_line_id: "100".into(),
                borrower_id: "B1".into(),
            }
        );
        assert_eq!(records[2].borrower_id, "B3");
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.csv");
        let body: String = (0..50).map(|i| format!("{},B{}\n", i, i)).collect();
        fs::write(&path, body).unwrap();

        let records = read_input_records(&path).await.unwrap();

        assert_eq!(records.len(), 50);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.credit_line_id, i.to_string());
        }
    }

    #[tokio::test]
    async fn empty_file_yields_no_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.csv");
        fs::write(&path, "").unwrap();

        let records = read_input_records(&path).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn short_row_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.csv");
        fs::write(&path, "100,B1\n200\n").unwrap();

        let err = read_input_records(&path).await.unwrap_err();
        match err {
            AppError::CsvInvalid(msg) => {
                assert!(msg.contains("row 2"), "should name the bad row: {}", msg)
            }
            other => panic!("expected CsvInvalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = read_input_records(Path::new("/nonexistent/input.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn sink_persists_rows_on_finish() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.csv");

        let mut sink = CsvResultSink::new(&path).unwrap();
        sink.write_row(&ResultRow {
            credit_line_id: "101".into(),
            borrower_id: "B1".into(),
        })
        .unwrap();
        sink.write_row(&ResultRow {
            credit_line_id: "102".into(),
            borrower_id: "B1".into(),
        })
        .unwrap();
        sink.finish().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "101,B1\n102,B1\n");
    }

    #[test]
    fn dropped_sink_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.csv");

        {
            let mut sink = CsvResultSink::new(&path).unwrap();
            sink.write_row(&ResultRow {
                credit_line_id: "101".into(),
                borrower_id: "B1".into(),
            })
            .unwrap();
            // dropped without finish()
        }

        assert!(!path.exists(), "aborted run must not leave partial output");
        // the temp file is cleaned up as well
        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn finish_twice_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("result.csv");

        let mut sink = CsvResultSink::new(&path).unwrap();
        sink.finish().unwrap();
        assert!(sink.finish().is_err());
    }
}
