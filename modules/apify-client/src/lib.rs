pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{FollowersScraperInput, ProxyConfig, RunData, ScrapeType};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for figue/instagram-followers-and-following-scrapper.
const FOLLOWERS_SCRAPER: &str = "figue~instagram-followers-and-following-scrapper";

/// Seconds the start call asks Apify to block before returning run metadata.
const START_WAIT_SECS: u32 = 300;

/// How a started run is polled until it reaches a terminal status.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    poll: PollSettings,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Start a followers/following scrape run. Apify holds the request open for
    /// up to five minutes, so short runs come back already finished.
    pub async fn start_followers_scrape(&self, input: &FollowersScraperInput) -> Result<RunData> {
        let url = format!(
            "{}/acts/{}/runs?waitForFinish={}",
            BASE_URL, FOLLOWERS_SCRAPER, START_WAIT_SECS
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Fetch current run metadata once.
    pub async fn get_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!("{}/actor-runs/{}", BASE_URL, run_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes, giving up after `max_attempts` polls.
    pub async fn wait_for_run(&self, run: RunData) -> Result<RunData> {
        let mut current = run;
        let mut attempts = 0;

        while !current.is_terminal() {
            if attempts >= self.poll.max_attempts {
                return Err(ApifyError::PollingExhausted {
                    run_id: current.id,
                    status: current.status,
                    attempts,
                });
            }
            tokio::time::sleep(self.poll.interval).await;
            attempts += 1;

            current = self.get_run(&current.id).await?;
            tracing::debug!(run_id = %current.id, status = %current.status, attempts, "Polled run");
        }

        if current.is_succeeded() {
            Ok(current)
        } else {
            Err(ApifyError::RunFailed(current.status))
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", BASE_URL, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Scrape an account's followers or following end-to-end: start run, poll, fetch results.
    ///
    /// Items come back as raw JSON so callers can decide what a usable record is.
    pub async fn scrape_followers(
        &self,
        username: &str,
        scrape_type: ScrapeType,
        max_pages: u32,
        cookies: serde_json::Value,
    ) -> Result<Vec<serde_json::Value>> {
        tracing::info!(username, %scrape_type, max_pages, "Starting Instagram followers scrape");

        let input = FollowersScraperInput::new(username, scrape_type, max_pages, cookies);
        let run = self.start_followers_scrape(&input).await?;
        tracing::info!(run_id = %run.id, status = %run.status, "Apify run started");

        let completed = self.wait_for_run(run).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let items: Vec<serde_json::Value> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(count = items.len(), "Fetched account records");

        Ok(items)
    }
}
