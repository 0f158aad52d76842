//! Shared HTTP session for judge scrapers.
//!
//! Wraps a cookie-keeping reqwest client bound to a base URL, so scrapers
//! work in site-relative paths. Non-success statuses are errors.

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use super::ScrapeError;

const USER_AGENT: &str = concat!("solvetrack/", env!("CARGO_PKG_VERSION"));

/// Cookie-keeping HTTP session bound to one judge website.
pub struct JudgeSession {
    base: Url,
    client: Client,
}

impl JudgeSession {
    pub fn new(base: &str) -> Result<Self, ScrapeError> {
        let base = Url::parse(base)?;
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(base.as_str()) {
            headers.insert(REFERER, value);
        }
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { base, client })
    }

    /// Resolve a site-relative path against the base URL.
    pub fn absolute(&self, path: &str) -> Result<Url, ScrapeError> {
        Ok(self.base.join(path)?)
    }

    pub async fn get(&self, path: &str) -> Result<Response, ScrapeError> {
        let response = self.client.get(self.absolute(path)?).send().await?;
        debug!(url = %response.url(), status = %response.status(), "GET");
        Ok(response.error_for_status()?)
    }

    pub async fn get_text(&self, path: &str) -> Result<String, ScrapeError> {
        Ok(self.get(path).await?.text().await?)
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<Response, ScrapeError> {
        let response = self
            .client
            .post(self.absolute(path)?)
            .form(form)
            .send()
            .await?;
        debug!(url = %response.url(), status = %response.status(), "POST");
        Ok(response.error_for_status()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_against_the_base() {
        let session = JudgeSession::new("https://leetcode.com").unwrap();
        assert_eq!(
            session.absolute("/submissions/1/").unwrap().as_str(),
            "https://leetcode.com/submissions/1/"
        );
    }
}
