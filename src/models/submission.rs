//! Submission and watermark models.
//!
//! A `Candidate` is what a scraper observes on a judge website; a
//! `PendingSubmission` is a candidate whose submit time has been normalized
//! to UTC; a `Submission` is a stored ledger row with its assigned
//! `sequence_id`. Submissions are immutable once stored.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors from time-zone handling on candidate submissions.
///
/// These are validation failures: the affected batch is rejected, never
/// silently repaired.
#[derive(Debug, Error)]
pub enum TimeError {
    #[error("unknown time zone label: {0}")]
    UnknownZone(String),

    #[error("local time {0} does not exist in zone {1}")]
    NonexistentLocalTime(NaiveDateTime, &'static str),
}

/// Submit time as observed by a scraper.
///
/// Either already zone-aware, or a naive local time paired with an explicit
/// zone. A naive time without any zone information cannot be represented.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateTime {
    /// Zone-aware instant.
    Zoned(DateTime<Tz>),
    /// Naive local time with an explicit origin zone.
    Local(NaiveDateTime, Tz),
}

impl CandidateTime {
    /// Pair a naive local time with a zone given as an IANA label.
    pub fn from_label(local: NaiveDateTime, label: &str) -> Result<Self, TimeError> {
        let tz: Tz = label
            .parse()
            .map_err(|_| TimeError::UnknownZone(label.to_string()))?;
        Ok(CandidateTime::Local(local, tz))
    }

    /// Resolve to a UTC instant plus the origin zone label.
    ///
    /// Ambiguous local times (DST fold) resolve to the earlier instant;
    /// nonexistent local times (DST gap) are rejected.
    pub fn resolve(&self) -> Result<(DateTime<Utc>, &'static str), TimeError> {
        match self {
            CandidateTime::Zoned(instant) => {
                Ok((instant.with_timezone(&Utc), instant.timezone().name()))
            }
            CandidateTime::Local(naive, tz) => match tz.from_local_datetime(naive) {
                LocalResult::Single(instant) => Ok((instant.with_timezone(&Utc), tz.name())),
                LocalResult::Ambiguous(earlier, _) => {
                    Ok((earlier.with_timezone(&Utc), tz.name()))
                }
                LocalResult::None => Err(TimeError::NonexistentLocalTime(*naive, tz.name())),
            },
        }
    }
}

/// An accepted submission as observed by a scraper, before normalization.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Judge-scoped problem identifier.
    pub problem_id: String,
    /// Problem title, already well formatted for display.
    pub title: String,
    /// Problem URL on the judge website.
    pub url: String,
    /// Observed submit time.
    pub submit_time: CandidateTime,
}

/// A normalized candidate, ready for the ledger.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub judge: String,
    pub problem_id: String,
    pub title: String,
    pub url: String,
    /// Submit time normalized to UTC.
    pub submit_time: DateTime<Utc>,
    /// IANA zone label the time was observed in.
    pub origin_timezone: String,
}

/// A stored submission row.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Store-assigned monotonic surrogate id.
    pub sequence_id: i32,
    /// Lower-cased judge identifier.
    pub judge: String,
    pub problem_id: String,
    pub title: String,
    pub url: String,
    /// Submit time, always UTC in storage.
    pub submit_time: DateTime<Utc>,
    /// IANA zone label for reconstructing the original local time.
    pub origin_timezone: String,
}

impl Submission {
    /// Reconstruct the submit time in its origin zone for display.
    ///
    /// Falls back to `None` when the stored label is not a known zone.
    pub fn local_submit_time(&self) -> Option<DateTime<Tz>> {
        let tz: Tz = self.origin_timezone.parse().ok()?;
        Some(self.submit_time.with_timezone(&tz))
    }
}

/// A consumer cursor row. Append-only; the authoritative watermark for a
/// consumer is the row with the greatest `submission_sequence_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub row_id: i32,
    pub consumer_name: String,
    pub submission_sequence_id: i32,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn labeled_local_time_resolves_to_utc() {
        let time = CandidateTime::from_label(naive(2024, 3, 1, 12, 0), "Asia/Shanghai").unwrap();
        let (utc, label) = time.resolve().unwrap();
        assert_eq!(label, "Asia/Shanghai");
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn unknown_zone_label_is_rejected() {
        let err = CandidateTime::from_label(naive(2024, 3, 1, 12, 0), "Mars/Olympus").unwrap_err();
        assert!(matches!(err, TimeError::UnknownZone(_)));
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        // DST fold: 2024-11-03 01:30 occurs twice in New York.
        let time =
            CandidateTime::from_label(naive(2024, 11, 3, 1, 30), "America/New_York").unwrap();
        let (utc, _) = time.resolve().unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // DST gap: 2024-03-10 02:30 does not exist in New York.
        let time =
            CandidateTime::from_label(naive(2024, 3, 10, 2, 30), "America/New_York").unwrap();
        assert!(matches!(
            time.resolve(),
            Err(TimeError::NonexistentLocalTime(_, _))
        ));
    }

    #[test]
    fn local_submit_time_round_trips_through_label() {
        let submission = Submission {
            sequence_id: 1,
            judge: "poj".into(),
            problem_id: "1001".into(),
            title: "A+B".into(),
            url: "http://poj.org/problem?id=1001".into(),
            submit_time: Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap(),
            origin_timezone: "Asia/Shanghai".into(),
        };
        let local = submission.local_submit_time().unwrap();
        assert_eq!(local.naive_local(), naive(2024, 3, 1, 12, 0));
    }
}
