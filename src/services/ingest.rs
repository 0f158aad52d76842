//! Ingestion reconciler.
//!
//! Turns raw scraper output into ledger inserts: every candidate time is
//! normalized to UTC with its origin zone label kept, then the batch is
//! handed to the store's insert-or-skip path. A candidate with unusable
//! zone information rejects the whole batch before anything is written.

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Candidate, PendingSubmission, TimeError};
use crate::repository::{LedgerError, LedgerRepository};
use crate::scrapers::{ScrapeError, Scraper};

#[derive(Debug, Error)]
pub enum IngestError {
    /// A candidate carried unusable time information. Fatal to the whole
    /// batch; nothing from it is recorded.
    #[error("candidate '{problem_id}' rejected: {source}")]
    InvalidTime {
        problem_id: String,
        #[source]
        source: TimeError,
    },

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Normalize a scraped batch to UTC, preserving its order.
///
/// Duplicate collapsing and earliest-wins selection happen in the ledger
/// store, not here.
pub fn normalize_batch(
    judge: &str,
    candidates: Vec<Candidate>,
) -> Result<Vec<PendingSubmission>, IngestError> {
    candidates
        .into_iter()
        .map(|candidate| {
            let (submit_time, origin_timezone) =
                candidate
                    .submit_time
                    .resolve()
                    .map_err(|source| IngestError::InvalidTime {
                        problem_id: candidate.problem_id.clone(),
                        source,
                    })?;
            Ok(PendingSubmission {
                judge: judge.to_string(),
                problem_id: candidate.problem_id,
                title: candidate.title,
                url: candidate.url,
                submit_time,
                origin_timezone: origin_timezone.to_string(),
            })
        })
        .collect()
}

/// One sequential ingestion pass over every configured scraper.
///
/// Each scraper gets the judge's most recently stored problem id as a
/// stop hint, so it can cut its history walk short.
pub async fn run_ingest_pass(
    ledger: &LedgerRepository,
    scrapers: &[Box<dyn Scraper>],
) -> Result<(), IngestError> {
    for scraper in scrapers {
        let judge = scraper.name();
        let stop_hint = ledger.latest_problem_id(judge).await?;
        let candidates = scraper.fetch(stop_hint.as_deref()).await?;
        debug!(judge, count = candidates.len(), "fetched candidate submissions");

        let batch = normalize_batch(judge, candidates)?;
        let inserted = ledger.insert_submissions(batch).await?;
        info!(judge, inserted, "ingestion pass finished");
    }
    Ok(())
}
