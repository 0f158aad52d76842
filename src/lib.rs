//! solvetrack - accepted-solution tracking and republishing.
//!
//! Scrapes accepted submissions from online-judge websites into a durable
//! SQLite ledger, then republishes anything new to external destinations
//! (task boards), with an independent resume cursor per destination.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
