//! Judge scrapers.
//!
//! Scrapers are black-box collaborators from the ledger's point of view:
//! each one produces a batch of candidate submissions for a single judge.
//! They are looked up through an explicit kind → constructor mapping built
//! at startup.

mod http;
mod leetcode;

pub use http::JudgeSession;
pub use leetcode::LeetCodeScraper;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SourceConfig;
use crate::models::Candidate;

/// Errors from scraping a judge website.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("{site}: login failed: {reason}")]
    Auth { site: String, reason: String },

    #[error("missing '{0}' in source configuration")]
    MissingOption(&'static str),

    #[error("invalid '{option}' in source configuration: {value}")]
    InvalidOption { option: &'static str, value: String },

    #[error("failed to parse judge page: {0}")]
    Parse(String),

    #[error("unknown scraper kind '{0}'")]
    UnknownKind(String),
}

/// A judge scraper producing candidate submissions.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Judge tag, e.g. "leetcode". Doubles as the stored judge identifier.
    fn name(&self) -> &str;

    /// Fetch accepted submissions. `stop_hint` is the most recently stored
    /// problem id for this judge; scrapers may stop walking submission
    /// history once they see it.
    async fn fetch(&self, stop_hint: Option<&str>) -> Result<Vec<Candidate>, ScrapeError>;
}

/// Constructor for a scraper kind.
pub type ScraperCtor = fn(&SourceConfig) -> Result<Box<dyn Scraper>, ScrapeError>;

/// Explicit kind → constructor mapping, resolved once at startup.
pub fn registry() -> HashMap<&'static str, ScraperCtor> {
    let mut map: HashMap<&'static str, ScraperCtor> = HashMap::new();
    map.insert("leetcode", |config| {
        Ok(Box::new(LeetCodeScraper::from_config(config)?))
    });
    map
}

/// Build every configured scraper, in configuration order.
pub fn build_scrapers(configs: &[SourceConfig]) -> Result<Vec<Box<dyn Scraper>>, ScrapeError> {
    let registry = registry();
    configs
        .iter()
        .map(|config| {
            let ctor = registry
                .get(config.kind.as_str())
                .ok_or_else(|| ScrapeError::UnknownKind(config.kind.clone()))?;
            ctor(config)
        })
        .collect()
}
