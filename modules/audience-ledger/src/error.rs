use std::path::PathBuf;

use apify_client::ApifyError;
use thiserror::Error;

/// A ledger, queue, prospect or batch file could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PersistenceError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Fetching or storing one target's batch failed. Recovered per target.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Apify(#[from] ApifyError),

    #[error("Failed to store batch: {0}")]
    Store(#[from] PersistenceError),
}

/// Missing credentials or unusable configuration. Fatal before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found in .env or environment")]
    MissingEnv(&'static str),

    #[error("Cookies file not found at {}", .0.display())]
    CookiesMissing(PathBuf),

    #[error("Cookies file {} could not be loaded: {reason}", .path.display())]
    CookiesInvalid { path: PathBuf, reason: String },

    #[error("Failed to read config file {}: {reason}", .path.display())]
    File { path: PathBuf, reason: String },
}
