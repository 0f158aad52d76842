//! The ledger store: durable, invariant-preserving storage for submissions
//! and consumer watermarks.
//!
//! Submissions are created only through `insert_submissions` and never
//! updated or deleted in normal operation. Watermarks are append-only; the
//! authoritative cursor for a consumer is the greatest
//! `submission_sequence_id` among its rows.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Utc;
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::models::{PendingSubmission, Submission, Watermark};
use crate::schema::{submissions, watermarks};

use super::pool::LedgerPool;
use super::records::{NewSubmission, NewWatermark, SubmissionRecord, WatermarkRecord};
use super::LedgerError;

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
    sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    judge TEXT NOT NULL,
    problem_id TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    submit_time TEXT NOT NULL,
    origin_timezone TEXT NOT NULL,
    UNIQUE (judge, problem_id)
);
CREATE TABLE IF NOT EXISTS watermarks (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    consumer_name TEXT NOT NULL,
    submission_sequence_id INTEGER NOT NULL REFERENCES submissions (sequence_id),
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS credentials (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    user_token TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite-backed ledger store.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: LedgerPool,
}

impl LedgerRepository {
    /// Open the ledger, creating tables as needed.
    pub async fn open(pool: LedgerPool) -> Result<Self, LedgerError> {
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), LedgerError> {
        use diesel_async::SimpleAsyncConnection;

        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_DDL).await?;
        Ok(())
    }

    /// Insert a batch of normalized candidates, skipping any whose
    /// (judge, problem_id) already exists.
    ///
    /// Within the batch, duplicates of the same (judge, problem_id) collapse
    /// to the copy with the earliest submit time, first occurrence winning
    /// ties. Surviving rows are inserted in ascending submit-time order
    /// inside one transaction, so assigned `sequence_id`s ascend with
    /// `submit_time` within this call. Returns the number of rows inserted.
    pub async fn insert_submissions(
        &self,
        batch: Vec<PendingSubmission>,
    ) -> Result<usize, LedgerError> {
        let mut rows: Vec<PendingSubmission> = Vec::with_capacity(batch.len());
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        for mut candidate in batch {
            candidate.judge = candidate.judge.to_lowercase();
            match seen.entry((candidate.judge.clone(), candidate.problem_id.clone())) {
                Entry::Occupied(slot) => {
                    let kept = &mut rows[*slot.get()];
                    if candidate.submit_time < kept.submit_time {
                        *kept = candidate;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(rows.len());
                    rows.push(candidate);
                }
            }
        }
        if rows.is_empty() {
            return Ok(0);
        }
        // Stable sort: equal submit times keep first-occurrence order.
        rows.sort_by_key(|row| row.submit_time);

        let mut conn = self.pool.get().await?;
        let inserted = conn
            .transaction::<usize, LedgerError, _>(|conn| {
                Box::pin(async move {
                    let mut inserted = 0;
                    for row in &rows {
                        let submit_time = row.submit_time.to_rfc3339();
                        let record = NewSubmission {
                            judge: &row.judge,
                            problem_id: &row.problem_id,
                            title: &row.title,
                            url: &row.url,
                            submit_time: &submit_time,
                            origin_timezone: &row.origin_timezone,
                        };
                        inserted += diesel::insert_or_ignore_into(submissions::table)
                            .values(&record)
                            .execute(conn)
                            .await?;
                    }
                    Ok(inserted)
                })
            })
            .await?;

        debug!(inserted, "submission batch recorded");
        Ok(inserted)
    }

    /// Latest recorded problem id for a judge (case-insensitive), by
    /// greatest `sequence_id`. Used by scrapers as an early-stop hint.
    pub async fn latest_problem_id(&self, judge: &str) -> Result<Option<String>, LedgerError> {
        let mut conn = self.pool.get().await?;

        submissions::table
            .filter(submissions::judge.eq(judge.to_lowercase()))
            .order(submissions::sequence_id.desc())
            .select(submissions::problem_id)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(Into::into)
    }

    /// Append a watermark row for a consumer.
    ///
    /// Fails with `LedgerError::UnknownSequence` when `sequence_id` does not
    /// reference a stored submission; no row is written in that case. The
    /// foreign-key constraint backs this up at the storage layer.
    pub async fn advance_watermark(
        &self,
        consumer: &str,
        sequence_id: i32,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        let consumer = consumer.to_string();

        conn.transaction::<(), LedgerError, _>(|conn| {
            Box::pin(async move {
                let known = submissions::table
                    .find(sequence_id)
                    .select(submissions::sequence_id)
                    .first::<i32>(conn)
                    .await
                    .optional()?;
                if known.is_none() {
                    return Err(LedgerError::UnknownSequence {
                        consumer,
                        sequence_id,
                    });
                }

                let updated_at = Utc::now().to_rfc3339();
                diesel::insert_into(watermarks::table)
                    .values(&NewWatermark {
                        consumer_name: &consumer,
                        submission_sequence_id: sequence_id,
                        updated_at: &updated_at,
                    })
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
    }

    /// Current cursor for a consumer: the greatest `submission_sequence_id`
    /// among its watermark rows, or `None` when it has never advanced.
    pub async fn current_watermark(&self, consumer: &str) -> Result<Option<i32>, LedgerError> {
        let mut conn = self.pool.get().await?;

        watermarks::table
            .filter(watermarks::consumer_name.eq(consumer))
            .select(max(watermarks::submission_sequence_id))
            .first::<Option<i32>>(&mut conn)
            .await
            .map_err(Into::into)
    }

    /// The authoritative watermark row for a consumer, for display.
    pub async fn latest_watermark(&self, consumer: &str) -> Result<Option<Watermark>, LedgerError> {
        let mut conn = self.pool.get().await?;

        watermarks::table
            .filter(watermarks::consumer_name.eq(consumer))
            .order(watermarks::submission_sequence_id.desc())
            .first::<WatermarkRecord>(&mut conn)
            .await
            .optional()
            .map(|record| record.map(Watermark::from))
            .map_err(Into::into)
    }

    /// All submissions a consumer has not yet processed, ordered by
    /// `sequence_id` ascending. Empty when there is nothing new.
    pub async fn submissions_since(&self, consumer: &str) -> Result<Vec<Submission>, LedgerError> {
        let cursor = self.current_watermark(consumer).await?;
        let mut conn = self.pool.get().await?;

        let mut query = submissions::table.into_boxed();
        if let Some(cursor) = cursor {
            query = query.filter(submissions::sequence_id.gt(cursor));
        }
        query
            .order(submissions::sequence_id.asc())
            .load::<SubmissionRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Submission::from).collect())
            .map_err(Into::into)
    }

    /// Stored submission count per judge.
    pub async fn submission_counts(&self) -> Result<Vec<(String, i64)>, LedgerError> {
        let mut conn = self.pool.get().await?;

        submissions::table
            .group_by(submissions::judge)
            .select((submissions::judge, count_star()))
            .order(submissions::judge.asc())
            .load::<(String, i64)>(&mut conn)
            .await
            .map_err(Into::into)
    }

    /// Destroy and recreate all tables. Operator action only; never called
    /// by the ingestion or delivery flow.
    pub async fn reset(&self) -> Result<(), LedgerError> {
        use diesel_async::SimpleAsyncConnection;

        let mut conn = self.pool.get().await?;
        // Children first so foreign keys do not object.
        conn.batch_execute(
            "DROP TABLE IF EXISTS watermarks;\n\
             DROP TABLE IF EXISTS credentials;\n\
             DROP TABLE IF EXISTS submissions;",
        )
        .await?;
        self.init_schema().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use tempfile::tempdir;

    async fn test_ledger() -> (LedgerRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = LedgerPool::from_path(&dir.path().join("ledger.db"));
        let repo = LedgerRepository::open(pool).await.unwrap();
        (repo, dir)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn pending(judge: &str, problem_id: &str, submit_time: DateTime<Utc>) -> PendingSubmission {
        PendingSubmission {
            judge: judge.into(),
            problem_id: problem_id.into(),
            title: format!("Problem {}", problem_id),
            url: format!("https://example.org/{}/{}", judge, problem_id),
            submit_time,
            origin_timezone: "UTC".into(),
        }
    }

    #[tokio::test]
    async fn sequence_ids_follow_submit_time_within_one_call() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();

        // Deliberately out of order.
        let inserted = ledger
            .insert_submissions(vec![
                pending("poj", "3", t + Duration::seconds(2)),
                pending("poj", "1", t),
                pending("poj", "2", t + Duration::seconds(1)),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let stored = ledger.submissions_since("anyone").await.unwrap();
        let ids: Vec<&str> = stored.iter().map(|s| s.problem_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        for pair in stored.windows(2) {
            assert!(pair[0].sequence_id < pair[1].sequence_id);
            assert!(pair[0].submit_time < pair[1].submit_time);
        }
    }

    #[tokio::test]
    async fn inserting_the_same_batch_twice_is_idempotent() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();
        let batch = vec![pending("poj", "1", t), pending("poj", "2", t + Duration::seconds(1))];

        assert_eq!(ledger.insert_submissions(batch.clone()).await.unwrap(), 2);
        assert_eq!(ledger.insert_submissions(batch).await.unwrap(), 0);

        let stored = ledger.submissions_since("anyone").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn earliest_copy_wins_within_a_batch() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();

        let inserted = ledger
            .insert_submissions(vec![
                pending("poj", "P", t + Duration::hours(1)), // 13:00
                pending("poj", "P", t - Duration::hours(2)), // 10:00
                pending("poj", "P", t + Duration::hours(2)), // 14:00
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let stored = ledger.submissions_since("anyone").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].submit_time, t - Duration::hours(2));
    }

    #[tokio::test]
    async fn existing_row_survives_a_later_insert() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();

        ledger
            .insert_submissions(vec![pending("poj", "P", t)])
            .await
            .unwrap();
        // A retried scrape reports an earlier time; the stored row wins.
        let inserted = ledger
            .insert_submissions(vec![pending("poj", "P", t - Duration::hours(1))])
            .await
            .unwrap();
        assert_eq!(inserted, 0);

        let stored = ledger.submissions_since("anyone").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].submit_time, t);
    }

    #[tokio::test]
    async fn judge_is_lowercased_and_unique_per_problem() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();

        let inserted = ledger
            .insert_submissions(vec![
                pending("POJ", "1", t),
                pending("poj", "1", t + Duration::seconds(5)),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let stored = ledger.submissions_since("anyone").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].judge, "poj");
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let (ledger, _dir) = test_ledger().await;
        assert_eq!(ledger.insert_submissions(Vec::new()).await.unwrap(), 0);
        assert!(ledger.submissions_since("anyone").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_problem_id_is_case_insensitive() {
        let (ledger, _dir) = test_ledger().await;
        assert_eq!(ledger.latest_problem_id("poj").await.unwrap(), None);

        let t = base_time();
        ledger
            .insert_submissions(vec![
                pending("poj", "1", t),
                pending("poj", "2", t + Duration::seconds(1)),
                pending("poj", "3", t + Duration::seconds(2)),
                pending("codeforces", "77A", t + Duration::seconds(3)),
            ])
            .await
            .unwrap();

        assert_eq!(
            ledger.latest_problem_id("POJ").await.unwrap().as_deref(),
            Some("3")
        );
        assert_eq!(
            ledger
                .latest_problem_id("CodeForces")
                .await
                .unwrap()
                .as_deref(),
            Some("77A")
        );
    }

    #[tokio::test]
    async fn advance_rejects_unknown_sequence_and_writes_nothing() {
        let (ledger, _dir) = test_ledger().await;

        let err = ledger.advance_watermark("boardbot", 999_999).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnknownSequence {
                sequence_id: 999_999,
                ..
            }
        ));
        assert!(ledger.latest_watermark("boardbot").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cursor_only_returns_rows_past_the_watermark() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();
        ledger
            .insert_submissions(vec![
                pending("poj", "1", t),
                pending("poj", "2", t + Duration::seconds(1)),
                pending("poj", "3", t + Duration::seconds(2)),
            ])
            .await
            .unwrap();

        let all = ledger.submissions_since("boardbot").await.unwrap();
        assert_eq!(all.len(), 3);

        ledger
            .advance_watermark("boardbot", all[1].sequence_id)
            .await
            .unwrap();
        let rest = ledger.submissions_since("boardbot").await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].problem_id, "3");

        ledger
            .advance_watermark("boardbot", rest[0].sequence_id)
            .await
            .unwrap();
        assert!(ledger.submissions_since("boardbot").await.unwrap().is_empty());

        // Another consumer is unaffected.
        assert_eq!(ledger.submissions_since("other").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn max_sequence_id_wins_over_a_later_lower_advance() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();
        ledger
            .insert_submissions(vec![
                pending("poj", "1", t),
                pending("poj", "2", t + Duration::seconds(1)),
                pending("poj", "3", t + Duration::seconds(2)),
            ])
            .await
            .unwrap();
        let all = ledger.submissions_since("boardbot").await.unwrap();

        // Interleaved advances: a re-delivery records a lower id afterwards.
        ledger
            .advance_watermark("boardbot", all[2].sequence_id)
            .await
            .unwrap();
        ledger
            .advance_watermark("boardbot", all[0].sequence_id)
            .await
            .unwrap();

        assert_eq!(
            ledger.current_watermark("boardbot").await.unwrap(),
            Some(all[2].sequence_id)
        );
        assert!(ledger.submissions_since("boardbot").await.unwrap().is_empty());
        assert_eq!(
            ledger
                .latest_watermark("boardbot")
                .await
                .unwrap()
                .unwrap()
                .submission_sequence_id,
            all[2].sequence_id
        );
    }

    #[tokio::test]
    async fn later_calls_may_insert_earlier_times_with_higher_sequence_ids() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();

        ledger
            .insert_submissions(vec![pending("poj", "B", t + Duration::hours(1))])
            .await
            .unwrap();
        ledger
            .insert_submissions(vec![pending("poj", "A", t)])
            .await
            .unwrap();

        // Cursor order is sequence order, not wall-clock order.
        let stored = ledger.submissions_since("anyone").await.unwrap();
        let ids: Vec<&str> = stored.iter().map(|s| s.problem_id.as_str()).collect();
        assert_eq!(ids, ["B", "A"]);
        assert!(stored[0].submit_time > stored[1].submit_time);
    }

    #[tokio::test]
    async fn reset_empties_the_store() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();
        ledger
            .insert_submissions(vec![pending("poj", "1", t)])
            .await
            .unwrap();
        let all = ledger.submissions_since("boardbot").await.unwrap();
        ledger
            .advance_watermark("boardbot", all[0].sequence_id)
            .await
            .unwrap();

        ledger.reset().await.unwrap();

        assert!(ledger.submissions_since("boardbot").await.unwrap().is_empty());
        assert_eq!(ledger.latest_problem_id("poj").await.unwrap(), None);
        assert!(ledger.latest_watermark("boardbot").await.unwrap().is_none());
        assert!(ledger.submission_counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_counts_group_by_judge() {
        let (ledger, _dir) = test_ledger().await;
        let t = base_time();
        ledger
            .insert_submissions(vec![
                pending("poj", "1", t),
                pending("poj", "2", t + Duration::seconds(1)),
                pending("LeetCode", "two-sum", t + Duration::seconds(2)),
            ])
            .await
            .unwrap();

        let counts = ledger.submission_counts().await.unwrap();
        assert_eq!(counts, vec![("leetcode".to_string(), 1), ("poj".to_string(), 2)]);
    }
}
