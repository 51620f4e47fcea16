use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the pure detection step.
///
/// I/O layers (source, notification log, delivery) use `anyhow` instead.
#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    /// A sample carried a reading detection cannot reason about.
    #[error("invalid input: {field} at {time}: {reason}")]
    InvalidInput {
        field: &'static str,
        time: DateTime<Utc>,
        reason: String,
    },
    /// A detection option is out of range.
    #[error("invalid detection config: {option}: {reason}")]
    InvalidConfig {
        option: &'static str,
        reason: String,
    },
}
