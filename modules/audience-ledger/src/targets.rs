use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PersistenceError;
use crate::storage;

/// Seed accounts used when no seed file can be read.
pub const FALLBACK_TARGETS: &[&str] = &[
    "bearsbarmadrid",
    "bearlinman",
    "beardazur",
    "bearstation.lyon",
    "budapest.bear.picnic",
    "djbearzone",
    "dj.bearosol",
    "iberobear",
    "queerfriendsmadrid",
    "villa_balao_gay_guesthouse",
    "remi_bear_pride",
];

/// P1 accounts carry the densest audience of interest and are listed first in the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "p1")]
    P1,
    #[serde(alias = "p2")]
    P2,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P1 => f.write_str("P1"),
            Priority::P2 => f.write_str("P2"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P1" | "p1" => Ok(Priority::P1),
            "P2" | "p2" => Ok(Priority::P2),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAccount {
    pub username: String,
    pub priority: Priority,
    #[serde(default)]
    pub scraped: bool,
}

/// Seed accounts to scrape, in seed order, with a persisted done flag.
#[derive(Debug, Clone)]
pub struct TargetQueue {
    path: PathBuf,
    targets: Vec<TargetAccount>,
    fallback: bool,
    // False when the seed file exists but could not be parsed; it is left alone
    // and done marks go to the sidecar file instead.
    writable: bool,
}

impl TargetQueue {
    /// Load the seed file. Missing or unreadable seeds fall back to
    /// [`FALLBACK_TARGETS`] so the queue is usable with no setup.
    ///
    /// An unreadable seed is never overwritten. Done marks made against it are
    /// kept in `<seed>.done.json` and re-applied here so a rerun resumes.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match storage::read_json::<Vec<TargetAccount>>(&path) {
            Ok(Some(targets)) => {
                info!(path = %path.display(), targets = targets.len(), "Loaded target seed");
                Self {
                    path,
                    targets,
                    fallback: false,
                    writable: true,
                }
            }
            Ok(None) => {
                info!(path = %path.display(), "No target seed, using built-in targets");
                Self::fallback(path)
            }
            Err(e) => {
                warn!(error = %e, "Target seed unreadable, using built-in targets");
                let mut queue = Self {
                    writable: false,
                    ..Self::fallback(path)
                };
                queue.apply_done_marks();
                queue
            }
        }
    }

    fn fallback(path: PathBuf) -> Self {
        let targets = FALLBACK_TARGETS
            .iter()
            .map(|u| TargetAccount {
                username: u.to_string(),
                priority: Priority::P1,
                scraped: false,
            })
            .collect();
        Self {
            path,
            targets,
            fallback: true,
            writable: true,
        }
    }

    fn done_path(&self) -> PathBuf {
        self.path.with_extension("done.json")
    }

    fn apply_done_marks(&mut self) {
        let done_path = self.done_path();
        let done: Vec<String> = match storage::read_json(&done_path) {
            Ok(Some(done)) => done,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Done marks unreadable, ignoring them");
                return;
            }
        };
        for t in self.targets.iter_mut() {
            if done.contains(&t.username) {
                t.scraped = true;
            }
        }
        info!(path = %done_path.display(), done = done.len(), "Applied done marks");
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the targets came from the built-in list rather than the seed file.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Targets not yet scraped, optionally limited to one priority, in seed order.
    pub fn next_batch(&self, priority: Option<Priority>) -> Vec<TargetAccount> {
        self.targets
            .iter()
            .filter(|t| !t.scraped)
            .filter(|t| priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect()
    }

    pub fn pending(&self, priority: Priority) -> usize {
        self.targets
            .iter()
            .filter(|t| !t.scraped && t.priority == priority)
            .count()
    }

    /// Mark a target scraped and write the queue straight away.
    /// Returns false when the username is not a target.
    pub fn mark_done(&mut self, username: &str) -> Result<bool, PersistenceError> {
        let mut found = false;
        for t in self.targets.iter_mut().filter(|t| t.username == username) {
            t.scraped = true;
            found = true;
        }
        if !found {
            return Ok(false);
        }
        if !self.writable {
            let done: Vec<&str> = self
                .targets
                .iter()
                .filter(|t| t.scraped)
                .map(|t| t.username.as_str())
                .collect();
            storage::write_json_atomic(&self.done_path(), &done)?;
            warn!(
                username,
                path = %self.path.display(),
                "Seed file unreadable, done mark written beside it"
            );
            return Ok(true);
        }

        storage::write_json_atomic(&self.path, &self.targets)?;
        if self.fallback {
            info!(path = %self.path.display(), "Wrote built-in targets to seed file");
            self.fallback = false;
        }
        info!(username, "Marked target scraped");
        Ok(true)
    }
}
