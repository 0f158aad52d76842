//! Configuration loading.
//!
//! Settings come from a TOML file: `[[source]]` tables configure judge
//! scrapers and `[[consumer]]` tables configure delivery destinations. An
//! explicitly given path must exist; otherwise `./solvetrack.toml` is used
//! when present, falling back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "solvetrack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_time_format() -> String {
    "%b %d %H:%M %Z".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Ledger database path; defaults under the platform data directory.
    pub database: Option<String>,

    /// Default submit-time display format for deliverers.
    #[serde(default = "default_time_format")]
    pub submit_time_format: String,

    /// Judge scrapers to run, in order.
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,

    /// Delivery destinations to run, in order.
    #[serde(default, rename = "consumer")]
    pub consumers: Vec<ConsumerConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            submit_time_format: default_time_format(),
            sources: Vec::new(),
            consumers: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolved ledger database path, with `~` expansion.
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("solvetrack")
                .join("ledger.db"),
        }
    }
}

/// One `[[source]]` table: a judge to scrape.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Scraper kind, e.g. "leetcode"; also the stored judge identifier.
    pub kind: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// IANA zone label attached to this judge's submit times.
    pub timezone: Option<String>,
}

/// One `[[consumer]]` table: a destination to deliver to.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Deliverer kind, e.g. "trello".
    pub kind: String,
    /// Consumer name for the watermark cursor; defaults to the kind.
    pub name: Option<String>,
    pub board: Option<String>,
    pub list: Option<String>,
    /// API token; falls back to the credential store when omitted.
    pub token: Option<String>,
    pub app_key: Option<String>,
    /// Per-consumer override of the submit-time display format.
    pub submit_time_format: Option<String>,
}

impl ConsumerConfig {
    pub fn consumer_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}
