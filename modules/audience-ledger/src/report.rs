use std::fmt;

use chrono::{DateTime, Local};

use crate::ledger::{Action, Ledger, LedgerEntry, Relationship};
use crate::prospects::ProspectEntry;

/// Audience health counts over the tracker and the current prospect list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceReport {
    pub generated_at: DateTime<Local>,
    pub total: usize,
    pub mutual: usize,
    pub fans: usize,
    pub following_only: usize,
    pub icp_aligned: usize,
    pub to_unfollow: usize,
    pub to_follow_back: usize,
    /// (ICP-aligned, total), when a prospect list exists.
    pub prospects: Option<(usize, usize)>,
}

impl AudienceReport {
    pub fn build(
        ledger: &Ledger,
        prospects: Option<&[ProspectEntry]>,
        generated_at: DateTime<Local>,
    ) -> Self {
        let count = |pred: fn(&LedgerEntry) -> bool| ledger.entries().filter(|e| pred(e)).count();

        Self {
            generated_at,
            total: ledger.len(),
            mutual: count(|e| e.relationship == Relationship::Mutual),
            fans: count(|e| e.relationship == Relationship::Fan),
            following_only: count(|e| e.relationship == Relationship::FollowingOnly),
            icp_aligned: count(|e| e.icp_aligned),
            to_unfollow: count(|e| e.action == Action::Unfollow),
            to_follow_back: count(|e| e.action == Action::FollowBack),
            prospects: prospects.map(|p| (p.iter().filter(|e| e.icp_aligned).count(), p.len())),
        }
    }
}

impl fmt::Display for AudienceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\n=== Audience Health Report ({}) ===",
            self.generated_at.format("%Y-%m-%d %H:%M")
        )?;
        writeln!(f, "Total tracked accounts:  {}", self.total)?;
        writeln!(f, "Mutual follows:          {}", self.mutual)?;
        writeln!(f, "Fans (follow you):       {}", self.fans)?;
        writeln!(f, "Following only:          {}", self.following_only)?;
        writeln!(f, "ICP-aligned:             {}", self.icp_aligned)?;
        writeln!(f, "\nAction items:")?;
        writeln!(f, "  Unfollow:              {}", self.to_unfollow)?;
        write!(f, "  Follow back (ICP):     {}", self.to_follow_back)?;
        if let Some((icp, total)) = self.prospects {
            write!(f, "\n\nProspects to follow: {icp} ICP-aligned / {total} total")?;
        }
        Ok(())
    }
}
