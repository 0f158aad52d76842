//! Credential storage for delivery destinations.
//!
//! Append-only, like watermarks: the newest row for a site is the current
//! token.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::schema::credentials;

use super::pool::LedgerPool;
use super::records::NewCredential;
use super::LedgerError;

/// SQLite-backed credential store.
#[derive(Clone)]
pub struct CredentialRepository {
    pool: LedgerPool,
}

impl CredentialRepository {
    /// Create a credential repository over an already-initialized ledger
    /// database.
    pub fn new(pool: LedgerPool) -> Self {
        Self { pool }
    }

    /// Latest saved token for a site, or `None` when there is no record.
    pub async fn latest_token(&self, site: &str) -> Result<Option<String>, LedgerError> {
        let mut conn = self.pool.get().await?;

        credentials::table
            .filter(credentials::site.eq(site))
            .order(credentials::row_id.desc())
            .select(credentials::user_token)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(Into::into)
    }

    /// Save a token for a site.
    pub async fn save_token(&self, site: &str, token: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.get().await?;
        let updated_at = Utc::now().to_rfc3339();

        diesel::insert_into(credentials::table)
            .values(&NewCredential {
                site,
                user_token: token,
                updated_at: &updated_at,
            })
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::LedgerRepository;
    use tempfile::tempdir;

    #[tokio::test]
    async fn newest_token_wins() {
        let dir = tempdir().unwrap();
        let pool = LedgerPool::from_path(&dir.path().join("ledger.db"));
        LedgerRepository::open(pool.clone()).await.unwrap();
        let repo = CredentialRepository::new(pool);

        assert_eq!(repo.latest_token("trello").await.unwrap(), None);

        repo.save_token("trello", "first").await.unwrap();
        repo.save_token("trello", "second").await.unwrap();
        repo.save_token("github", "other").await.unwrap();

        assert_eq!(
            repo.latest_token("trello").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(
            repo.latest_token("github").await.unwrap().as_deref(),
            Some("other")
        );
    }
}
