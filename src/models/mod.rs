//! Data models for solvetrack.

mod submission;

pub use submission::{
    Candidate, CandidateTime, PendingSubmission, Submission, TimeError, Watermark,
};
