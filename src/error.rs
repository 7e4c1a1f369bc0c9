use thiserror::Error;

/// Application-wide error type.
///
/// `Remote` and `Verification` raised inside worker logic are fatal to the
/// whole run when the pipeline is in fail-fast mode. `SinkWrite` is the only
/// error the collector recovers from locally.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Remote credit service ─────────────────────────────────────────────────
    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("cancel not confirmed for credit line {credit_line_id}: status is {actual:?}")]
    Verification {
        credit_line_id: i64,
        actual: String,
    },

    // ── File / CSV ────────────────────────────────────────────────────────────
    #[error("invalid input CSV: {0}")]
    CsvInvalid(String),

    #[error("failed to write result row: {0}")]
    SinkWrite(String),

    #[error("I/O error: {0}")]
    Io(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for errors that abort the run in fail-fast mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Remote(_) | AppError::Verification { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_and_verification_are_fatal() {
        assert!(AppError::Remote("boom".into()).is_fatal());
        assert!(AppError::Verification {
            credit_line_id: 101,
            actual: "pending_cancel".into(),
        }
        .is_fatal());
    }

    #[test]
    fn sink_write_is_not_fatal() {
        assert!(!AppError::SinkWrite("disk full".into()).is_fatal());
        assert!(!AppError::CsvInvalid("short row".into()).is_fatal());
        assert!(!AppError::Io("open failed".into()).is_fatal());
    }

    #[test]
    fn verification_message_names_line_and_status() {
        let err = AppError::Verification {
            credit_line_id: 42,
            actual: "pending_cancel".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"), "message should name the line: {}", msg);
        assert!(
            msg.contains("pending_cancel"),
            "message should name the status: {}",
            msg
        );
    }
}
