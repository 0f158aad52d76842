//! Repository layer for ledger persistence.
//!
//! All database access uses Diesel ORM over SQLite with compile-time query
//! checking. The ledger is the single source of truth: uniqueness of
//! (judge, problem_id) and referential integrity of watermark rows are
//! enforced by the storage engine itself, not just in application code.

mod credentials;
mod ledger;
mod pool;
mod records;

pub use credentials::CredentialRepository;
pub use ledger::LedgerRepository;
pub use pool::LedgerPool;
pub use records::{
    CredentialRecord, NewCredential, NewSubmission, NewWatermark, SubmissionRecord,
    WatermarkRecord,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying persistence failure, including unexpected constraint
    /// violations. Fatal to the current run; the store never retries.
    #[error("storage error: {0}")]
    Storage(#[from] diesel::result::Error),

    #[error("failed to open ledger database: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    /// A watermark advance referenced a submission that does not exist.
    /// Signals a bug in the calling delivery component; never swallowed.
    #[error("watermark for '{consumer}' references unknown submission sequence id {sequence_id}")]
    UnknownSequence { consumer: String, sequence_id: i32 },
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
