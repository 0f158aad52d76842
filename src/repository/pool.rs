//! Connection factory for the ledger database.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! for SQLite. Connections are lightweight and file-based, so they are
//! created per request rather than pooled. Every connection enables SQLite
//! foreign-key enforcement so watermark rows can never dangle.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::LedgerError;

/// Async SQLite connection type.
pub type LedgerConnection = SyncConnectionWrapper<SqliteConnection>;

/// Connection factory for the ledger database.
#[derive(Clone)]
pub struct LedgerPool {
    database_url: String,
}

impl LedgerPool {
    /// Create a pool from a database URL or plain file path.
    pub fn new(database_url: &str) -> Self {
        // Strip sqlite: prefix if present for diesel
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create a pool from a file path.
    pub fn from_path(db_path: &Path) -> Self {
        Self::new(&db_path.display().to_string())
    }

    /// Open a new connection with foreign keys enabled.
    pub async fn get(&self) -> Result<LedgerConnection, LedgerError> {
        let mut conn = LedgerConnection::establish(&self.database_url).await?;
        conn.batch_execute("PRAGMA foreign_keys = ON").await?;
        Ok(conn)
    }

    /// Get the database URL.
    #[allow(dead_code)]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
