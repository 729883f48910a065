use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use apify_client::PollSettings;
use serde::Deserialize;

use crate::classifier::{Classifier, DEFAULT_KEYWORDS};
use crate::error::ConfigError;

/// Tunables loaded from `audience.toml`. Every field has a default, so a
/// missing file is the same as an empty one. Secrets stay in the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// ICP keyword profile.
    pub keywords: Vec<String>,
    pub paths: PathsConfig,
    pub scrape: ScrapeSettings,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            paths: PathsConfig::default(),
            scrape: ScrapeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub ledger: PathBuf,
    pub prospects: PathBuf,
    pub targets: PathBuf,
    pub cookies: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            ledger: PathBuf::from("audience_tracker.json"),
            prospects: PathBuf::from("prospects.json"),
            targets: PathBuf::from("icp_target_venues.json"),
            cookies: PathBuf::from("cookies.json"),
        }
    }
}

impl PathsConfig {
    /// Anchor relative paths at `base`.
    pub fn resolve(&self, base: &Path) -> Self {
        let at = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        Self {
            data_dir: at(&self.data_dir),
            ledger: at(&self.ledger),
            prospects: at(&self.prospects),
            targets: at(&self.targets),
            cookies: at(&self.cookies),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeSettings {
    /// Minimum gap between two provider calls in a multi-target run.
    pub pacing_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    /// Page limit for multi-target runs.
    pub max_pages: u32,
    /// Page limit for a single `scrape`.
    pub single_max_pages: u32,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            pacing_secs: 60,
            poll_interval_secs: 5,
            max_poll_attempts: 60,
            max_pages: 20,
            single_max_pages: 50,
        }
    }
}

impl ScrapeSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
        }
    }
}

impl FileConfig {
    /// Load and parse a TOML config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::File {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.keywords)
    }
}

/// Provider credentials. Only needed by commands that call the scraper.
#[derive(Clone)]
pub struct Credentials {
    pub apify_api_token: String,
    /// Cookie-Editor JSON export for a logged-in Instagram session.
    pub cookies: serde_json::Value,
    pub cookies_path: PathBuf,
}

impl Credentials {
    /// Read `APIFY_API_TOKEN` (from `.env` or the environment) and the cookie
    /// file named by `INSTAGRAM_COOKIES`, else `default_cookies`.
    pub fn from_env(default_cookies: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let apify_api_token = env::var("APIFY_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("APIFY_API_TOKEN"))?;

        let cookies_path = env::var("INSTAGRAM_COOKIES")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cookies.to_path_buf());
        let cookies = load_cookies(&cookies_path)?;

        let creds = Self {
            apify_api_token,
            cookies,
            cookies_path,
        };
        creds.log_keys();
        Ok(creds)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map_or(val.len(), |(i, _)| i);
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Credentials loaded:");
        tracing::info!("  APIFY_API_TOKEN: {}", preview(&self.apify_api_token));
        tracing::info!("  INSTAGRAM_COOKIES: {}", self.cookies_path.display());
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("apify_api_token", &"<redacted>")
            .field("cookies_path", &self.cookies_path)
            .finish_non_exhaustive()
    }
}

fn load_cookies(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::CookiesMissing(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::CookiesInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    serde_json::from_str(&content).map_err(|e| ConfigError::CookiesInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load(&dir.path().join("audience.toml")).unwrap();
        assert_eq!(config.scrape.pacing(), Duration::from_secs(60));
        assert_eq!(config.scrape.poll_settings().max_attempts, 60);
        assert!(config.keywords.iter().any(|k| k == "bear"));
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audience.toml");
        std::fs::write(
            &path,
            "keywords = [\"Otter\"]\n\n[scrape]\npacing_secs = 5\n\n[paths]\nledger = \"tracker.json\"\n",
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.scrape.pacing_secs, 5);
        assert_eq!(config.scrape.max_pages, 20);
        assert_eq!(config.paths.ledger, PathBuf::from("tracker.json"));
        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
        assert!(config.classifier().is_icp_aligned("otterpup", ""));
        assert!(!config.classifier().is_icp_aligned("bearsbar", ""));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audience.toml");
        std::fs::write(&path, "[scrape]\npace = 5\n").unwrap();
        assert!(matches!(FileConfig::load(&path), Err(ConfigError::File { .. })));
    }

    #[test]
    fn paths_resolve_against_base() {
        let paths = PathsConfig::default().resolve(Path::new("/srv/audience"));
        assert_eq!(paths.ledger, PathBuf::from("/srv/audience/audience_tracker.json"));
        assert_eq!(paths.data_dir, PathBuf::from("/srv/audience/data"));
    }

    #[test]
    fn cookies_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        assert!(matches!(load_cookies(&path), Err(ConfigError::CookiesMissing(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_cookies(&path), Err(ConfigError::CookiesInvalid { .. })));

        std::fs::write(&path, r#"[{"name":"sessionid","value":"x"}]"#).unwrap();
        assert!(load_cookies(&path).unwrap().is_array());
    }
}
