use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::batches::Batch;
use crate::classifier::Classifier;
use crate::ledger::{Action, Ledger, Relationship};
use crate::prospects::ProspectEntry;
use crate::record::{normalize_batch, AccountRecord, MalformedRecord};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Untracked accounts, sorted by username.
    pub prospects: Vec<ProspectEntry>,
    /// Unique usernames across all batches.
    pub accounts_seen: usize,
    /// Unique usernames that were already in the ledger.
    pub already_tracked: usize,
    pub malformed: Vec<MalformedRecord>,
}

impl Reconciliation {
    pub fn icp_prospects(&self) -> usize {
        self.prospects.iter().filter(|p| p.icp_aligned).count()
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icp = self.icp_prospects();
        writeln!(f, "\n=== AUDIENCE ANALYSIS ===")?;
        writeln!(f, "Total scraped accounts: {}", self.accounts_seen)?;
        writeln!(f, "Already in tracker:     {}", self.already_tracked)?;
        writeln!(f, "Malformed records:      {}", self.malformed.len())?;
        writeln!(f, "New prospects:          {}", self.prospects.len())?;
        writeln!(f, "ICP-aligned prospects:  {}", icp)?;
        write!(f, "Non-ICP prospects:      {}", self.prospects.len() - icp)
    }
}

/// Merge batches against the ledger into a fresh prospect set.
///
/// Batches are read in the order given and the first record per username
/// wins. Tracked usernames never become prospects, and the ledger is not
/// modified. Rows without a usable username are skipped and reported.
pub fn reconcile(batches: &[Batch], ledger: &Ledger, classifier: &Classifier) -> Reconciliation {
    let mut seen: BTreeMap<String, AccountRecord> = BTreeMap::new();
    let mut malformed = Vec::new();

    for batch in batches {
        let (records, rejects) = normalize_batch(&batch.records, &batch.id);
        debug!(
            batch = %batch.id,
            records = records.len(),
            malformed = rejects.len(),
            "Normalized batch"
        );
        malformed.extend(rejects);

        for record in records {
            if let Entry::Vacant(slot) = seen.entry(record.username.clone()) {
                slot.insert(record);
            }
        }
    }

    let accounts_seen = seen.len();
    let mut already_tracked = 0;
    let mut prospects = Vec::new();

    for (username, record) in seen {
        if ledger.contains(&username) {
            already_tracked += 1;
            continue;
        }
        let icp_aligned = classifier.is_icp_aligned(&username, &record.full_name);
        prospects.push(ProspectEntry {
            username,
            full_name: record.full_name,
            relationship: Relationship::Prospect,
            icp_aligned,
            action: Action::for_prospect(icp_aligned),
            notes: format!("Source: {}", record.source_batch),
            is_verified: record.is_verified,
        });
    }

    let result = Reconciliation {
        prospects,
        accounts_seen,
        already_tracked,
        malformed,
    };
    info!(
        batches = batches.len(),
        accounts = result.accounts_seen,
        tracked = result.already_tracked,
        prospects = result.prospects.len(),
        icp = result.icp_prospects(),
        malformed = result.malformed.len(),
        "Reconciled batches"
    );
    result
}
