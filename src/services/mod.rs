//! Orchestration services.
//!
//! `ingest` reconciles scraped batches into the ledger; `deliver` drives
//! the per-consumer cursor protocol over the delivery destinations.

pub mod deliver;
pub mod ingest;
