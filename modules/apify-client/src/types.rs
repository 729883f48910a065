use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Browser user agent sent to the followers actor.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Which side of an account's graph to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeType {
    Followers,
    Following,
}

impl ScrapeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeType::Followers => "followers",
            ScrapeType::Following => "following",
        }
    }
}

impl fmt::Display for ScrapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "followers" => Ok(ScrapeType::Followers),
            "following" => Ok(ScrapeType::Following),
            other => Err(format!("unknown scrape type: {other}")),
        }
    }
}

/// Input for the figue/instagram-followers-and-following-scrapper actor.
#[derive(Debug, Clone, Serialize)]
pub struct FollowersScraperInput {
    /// Cookie-Editor JSON export of a logged-in Instagram session, passed through untouched.
    pub cookies: serde_json::Value,
    #[serde(rename = "countPerPage")]
    pub count_per_page: u32,
    #[serde(rename = "maxPages")]
    pub max_pages: u32,
    pub username: String,
    #[serde(rename = "type")]
    pub scrape_type: ScrapeType,
    #[serde(rename = "proxyCountryCode")]
    pub proxy_country_code: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    pub proxy: ProxyConfig,
}

impl FollowersScraperInput {
    pub fn new(
        username: &str,
        scrape_type: ScrapeType,
        max_pages: u32,
        cookies: serde_json::Value,
    ) -> Self {
        Self {
            cookies,
            count_per_page: 12,
            max_pages,
            username: username.to_string(),
            scrape_type,
            proxy_country_code: "FR".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: ProxyConfig::residential(),
        }
    }
}

/// Apify proxy settings embedded in actor input.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
    #[serde(rename = "apifyProxyGroups")]
    pub apify_proxy_groups: Vec<String>,
}

impl ProxyConfig {
    pub fn residential() -> Self {
        Self {
            use_apify_proxy: true,
            apify_proxy_groups: vec!["RESIDENTIAL".to_string()],
        }
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn is_succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    /// True once the run reached a state it will never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT"
        )
    }
}
