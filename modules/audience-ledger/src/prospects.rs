use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PersistenceError;
use crate::ledger::{Action, Relationship};
use crate::storage;

/// An account seen in scraped batches but not yet in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectEntry {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "prospect_relationship")]
    pub relationship: Relationship,
    #[serde(default)]
    pub icp_aligned: bool,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

fn prospect_relationship() -> Relationship {
    Relationship::Prospect
}

/// Prospect list on disk. Every write replaces the previous set.
#[derive(Debug, Clone)]
pub struct ProspectFile {
    path: PathBuf,
}

impl ProspectFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<ProspectEntry>, PersistenceError> {
        Ok(storage::read_json(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, prospects: &[ProspectEntry]) -> Result<(), PersistenceError> {
        storage::write_json_atomic(&self.path, prospects)?;
        info!(path = %self.path.display(), count = prospects.len(), "Saved prospects");
        Ok(())
    }
}
