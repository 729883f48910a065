use std::fmt;

use tracing::{info, warn};

use crate::batches::{Batch, BatchManifest};
use crate::classifier::Classifier;
use crate::error::PersistenceError;
use crate::ledger::{LedgerStore, MergeOutcome};
use crate::prospects::{ProspectEntry, ProspectFile};
use crate::reconcile::{reconcile, Reconciliation};

/// Summary of an analyze pass.
#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub batches: usize,
    /// Batch ids that could not be read and were left out.
    pub unreadable_batches: Vec<String>,
    pub reconciliation: Reconciliation,
    /// Present when prospects were folded into the ledger.
    pub merged: Option<MergeOutcome>,
}

impl fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batches read:           {}", self.batches)?;
        if !self.unreadable_batches.is_empty() {
            writeln!(f, "Batches unreadable:     {}", self.unreadable_batches.len())?;
        }
        write!(f, "{}", self.reconciliation)?;
        if let Some(m) = self.merged {
            write!(
                f,
                "\nAdded to tracker:       {}\nICP flags refreshed:    {}",
                m.added, m.reclassified
            )?;
        }
        Ok(())
    }
}

/// Reconcile every batch in the manifest against the stored ledger and
/// replace the prospect file. With `merge`, new prospects are moved into the
/// ledger instead, which is then persisted, and the prospect file only keeps
/// accounts the ledger still lacks.
///
/// Returns `Ok(None)` when the manifest holds no batches; nothing is written.
pub fn analyze<M: BatchManifest>(
    manifest: &M,
    ledger_store: &LedgerStore,
    prospect_file: &ProspectFile,
    classifier: &Classifier,
    merge: bool,
) -> Result<Option<AnalysisSummary>, PersistenceError> {
    let ids = manifest.batch_ids()?;
    if ids.is_empty() {
        info!("No scraped batches found");
        return Ok(None);
    }

    let mut batches: Vec<Batch> = Vec::with_capacity(ids.len());
    let mut unreadable = Vec::new();
    for id in &ids {
        match manifest.load(id) {
            Ok(batch) => batches.push(batch),
            Err(e) => {
                warn!(batch = %id, error = %e, "Skipping unreadable batch");
                unreadable.push(id.clone());
            }
        }
    }

    let mut ledger = ledger_store.load()?;
    let reconciliation = reconcile(&batches, &ledger, classifier);

    let merged = if merge {
        let outcome = ledger.merge(&reconciliation.prospects, classifier);
        ledger_store.persist(&ledger)?;
        info!(
            added = outcome.added,
            reclassified = outcome.reclassified,
            "Merged prospects into ledger"
        );
        Some(outcome)
    } else {
        None
    };

    let untracked: Vec<ProspectEntry> = reconciliation
        .prospects
        .iter()
        .filter(|p| !ledger.contains(&p.username))
        .cloned()
        .collect();
    prospect_file.save(&untracked)?;

    Ok(Some(AnalysisSummary {
        batches: batches.len(),
        unreadable_batches: unreadable,
        reconciliation,
        merged,
    }))
}
