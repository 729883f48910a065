use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::error::PersistenceError;
use crate::prospects::ProspectEntry;
use crate::storage;

/// How a tracked account relates to ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Relationship {
    Prospect,
    Mutual,
    Fan,
    FollowingOnly,
    #[default]
    Unknown,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Prospect => "Prospect",
            Relationship::Mutual => "Mutual",
            Relationship::Fan => "Fan",
            Relationship::FollowingOnly => "Following Only",
            Relationship::Unknown => "Unknown",
        }
    }
}

impl From<String> for Relationship {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Prospect" => Relationship::Prospect,
            "Mutual" => Relationship::Mutual,
            "Fan" => Relationship::Fan,
            "Following Only" => Relationship::FollowingOnly,
            _ => Relationship::Unknown,
        }
    }
}

impl From<Relationship> for &'static str {
    fn from(r: Relationship) -> Self {
        r.as_str()
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended next step for an account. Never executed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Action {
    Follow,
    Unfollow,
    FollowBack,
    Skip,
    #[default]
    None,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Follow => "Follow",
            Action::Unfollow => "Unfollow",
            Action::FollowBack => "Follow Back",
            Action::Skip => "Skip",
            Action::None => "None",
        }
    }

    /// Default recommendation for an account nobody has curated yet.
    pub fn for_prospect(icp_aligned: bool) -> Self {
        if icp_aligned {
            Action::Follow
        } else {
            Action::Skip
        }
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Follow" => Action::Follow,
            "Unfollow" => Action::Unfollow,
            "Follow Back" => Action::FollowBack,
            "Skip" => Action::Skip,
            _ => Action::None,
        }
    }
}

impl From<Action> for &'static str {
    fn from(a: Action) -> Self {
        a.as_str()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked account. `relationship`, `action` and `notes` belong to
/// whoever curates the ledger; this crate only ever recomputes `icp_aligned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub relationship: Relationship,
    #[serde(default)]
    pub icp_aligned: bool,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub notes: String,
}

/// Outcome of [`Ledger::merge`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub reclassified: usize,
}

/// Username-keyed set of tracked accounts, one entry per username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rows. If a username repeats, the first row is kept.
    pub fn from_entries(rows: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut ledger = Self::new();
        for row in rows {
            if ledger.entries.contains_key(&row.username) {
                warn!(username = %row.username, "Duplicate ledger row ignored");
                continue;
            }
            ledger.entries.insert(row.username.clone(), row);
        }
        ledger
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    pub fn get(&self, username: &str) -> Option<&LedgerEntry> {
        self.entries.get(username)
    }

    /// Entries in username order.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Insert an entry unless the username is already tracked.
    /// Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, entry: LedgerEntry) -> bool {
        if self.entries.contains_key(&entry.username) {
            return false;
        }
        self.entries.insert(entry.username.clone(), entry);
        true
    }

    /// Fold prospects into the ledger as `Prospect` rows and refresh the ICP
    /// flag on everything already tracked. Curated fields are never touched.
    pub fn merge(&mut self, prospects: &[ProspectEntry], classifier: &Classifier) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for entry in self.entries.values_mut() {
            let aligned = classifier.is_icp_aligned(&entry.username, &entry.full_name);
            if aligned != entry.icp_aligned {
                entry.icp_aligned = aligned;
                outcome.reclassified += 1;
            }
        }

        for p in prospects {
            let icp_aligned = classifier.is_icp_aligned(&p.username, &p.full_name);
            let entry = LedgerEntry {
                username: p.username.clone(),
                full_name: p.full_name.clone(),
                relationship: Relationship::Prospect,
                icp_aligned,
                action: Action::for_prospect(icp_aligned),
                notes: p.notes.clone(),
            };
            if self.insert_if_absent(entry) {
                outcome.added += 1;
            }
        }

        outcome
    }
}

/// The ledger's file on disk: a JSON array of [`LedgerEntry`] rows.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. No file yet means an empty ledger.
    pub fn load(&self) -> Result<Ledger, PersistenceError> {
        match storage::read_json::<Vec<LedgerEntry>>(&self.path)? {
            Some(rows) => {
                let ledger = Ledger::from_entries(rows);
                info!(path = %self.path.display(), entries = ledger.len(), "Loaded ledger");
                Ok(ledger)
            }
            None => {
                info!(path = %self.path.display(), "No ledger file, starting empty");
                Ok(Ledger::new())
            }
        }
    }

    /// Replace the ledger file with the full entry set.
    pub fn persist(&self, ledger: &Ledger) -> Result<(), PersistenceError> {
        let rows: Vec<&LedgerEntry> = ledger.entries().collect();
        storage::write_json_atomic(&self.path, &rows)?;
        info!(path = %self.path.display(), entries = rows.len(), "Persisted ledger");
        Ok(())
    }
}
