//! Diesel record types for the ledger tables.
//!
//! Timestamps are stored as RFC 3339 text; submit times are always UTC by
//! the time they reach the store.

use diesel::prelude::*;

use crate::models::{Submission, Watermark};
use crate::schema;

use super::parse_datetime;

/// Submission row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::submissions)]
#[diesel(primary_key(sequence_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubmissionRecord {
    pub sequence_id: i32,
    pub judge: String,
    pub problem_id: String,
    pub title: String,
    pub url: String,
    pub submit_time: String,
    pub origin_timezone: String,
}

impl From<SubmissionRecord> for Submission {
    fn from(record: SubmissionRecord) -> Self {
        Submission {
            sequence_id: record.sequence_id,
            judge: record.judge,
            problem_id: record.problem_id,
            title: record.title,
            url: record.url,
            submit_time: parse_datetime(&record.submit_time),
            origin_timezone: record.origin_timezone,
        }
    }
}

/// New submission for insertion. `sequence_id` is assigned by the store.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::submissions)]
pub struct NewSubmission<'a> {
    pub judge: &'a str,
    pub problem_id: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub submit_time: &'a str,
    pub origin_timezone: &'a str,
}

/// Watermark row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::watermarks)]
#[diesel(primary_key(row_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WatermarkRecord {
    pub row_id: i32,
    pub consumer_name: String,
    pub submission_sequence_id: i32,
    pub updated_at: String,
}

impl From<WatermarkRecord> for Watermark {
    fn from(record: WatermarkRecord) -> Self {
        Watermark {
            row_id: record.row_id,
            consumer_name: record.consumer_name,
            submission_sequence_id: record.submission_sequence_id,
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// New watermark row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::watermarks)]
pub struct NewWatermark<'a> {
    pub consumer_name: &'a str,
    pub submission_sequence_id: i32,
    pub updated_at: &'a str,
}

/// Credential row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::credentials)]
#[diesel(primary_key(row_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CredentialRecord {
    pub row_id: i32,
    pub site: String,
    pub user_token: String,
    pub updated_at: String,
}

/// New credential row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::credentials)]
pub struct NewCredential<'a> {
    pub site: &'a str,
    pub user_token: &'a str,
    pub updated_at: &'a str,
}
