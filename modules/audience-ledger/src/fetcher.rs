use apify_client::{ApifyClient, PollSettings, ScrapeType};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Credentials;
use crate::error::FetchError;

/// Source of raw follower/following rows for one account.
#[async_trait]
pub trait AccountFetcher: Send + Sync {
    async fn fetch(
        &self,
        username: &str,
        scrape_type: ScrapeType,
        max_pages: u32,
    ) -> Result<Vec<Value>, FetchError>;
}

/// Fetches through the Apify followers actor using a logged-in cookie set.
pub struct ApifyFetcher {
    client: ApifyClient,
    cookies: Value,
}

impl ApifyFetcher {
    pub fn new(credentials: &Credentials, poll: PollSettings) -> Self {
        Self {
            client: ApifyClient::new(credentials.apify_api_token.clone()).with_poll_settings(poll),
            cookies: credentials.cookies.clone(),
        }
    }
}

#[async_trait]
impl AccountFetcher for ApifyFetcher {
    async fn fetch(
        &self,
        username: &str,
        scrape_type: ScrapeType,
        max_pages: u32,
    ) -> Result<Vec<Value>, FetchError> {
        Ok(self
            .client
            .scrape_followers(username, scrape_type, max_pages, self.cookies.clone())
            .await?)
    }
}
